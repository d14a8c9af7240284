//! Audit port: immutable trail entries for lifecycle-significant actions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::error::NotificationResult;

/// Lifecycle-significant action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    Delete,
    MarkRead,
    PermissionDenied,
}

/// One immutable audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: AuditAction,
    pub notification_id: Uuid,
    /// User on whose behalf the action ran.
    pub actor_id: String,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        notification_id: Uuid,
        actor_id: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            action,
            notification_id,
            actor_id: actor_id.into(),
            detail: detail.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Trait for the audit trail sink.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditTrail: Send + Sync {
    /// Record an entry. Audit failures must not mask the business outcome.
    async fn record(&self, entry: AuditEntry) -> NotificationResult<()>;
}

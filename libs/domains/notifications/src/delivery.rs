//! Delivery port consumed by the send pipeline and the campaign engine.
//!
//! Implementations wrap the actual email/SMS/push/in-app transports and live
//! outside this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::NotificationResult;
use crate::models::Notification;

/// Receipt for an accepted delivery.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    /// Transport-specific message ID for tracking.
    pub message_id: Option<String>,
    /// When the transport accepted the message.
    pub delivery_time: DateTime<Utc>,
}

/// Handle for a delivery deferred to an external execution mechanism.
#[derive(Debug, Clone)]
pub struct ScheduleReceipt {
    /// Opaque handle under which the deferred delivery is registered.
    pub scheduled_id: String,
    pub scheduled_for: DateTime<Utc>,
}

/// Trait for notification delivery transports.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryPort: Send + Sync {
    /// Send a notification immediately.
    async fn send(&self, notification: &Notification) -> NotificationResult<DeliveryReceipt>;

    /// Register a deferred delivery with an external cron/queue mechanism.
    ///
    /// No in-process timer is involved; the returned handle is the contract
    /// for the external mechanism to later re-invoke the send pipeline.
    async fn schedule(
        &self,
        notification: &Notification,
        when: DateTime<Utc>,
    ) -> NotificationResult<ScheduleReceipt>;

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;

    /// Check if the transport is healthy/configured.
    async fn health_check(&self) -> NotificationResult<bool>;
}

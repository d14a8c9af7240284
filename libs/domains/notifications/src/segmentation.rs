//! Segmentation port: resolves a recipient set from declarative criteria.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NotificationResult;

/// A resolved campaign recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    /// Display name used for template personalization when present.
    pub display_name: Option<String>,
}

impl Recipient {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }
}

/// Declarative criteria describing a recipient segment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentationCriteria {
    /// Restrict to prospects/clients of one business.
    pub business_id: Option<Uuid>,
    /// Business sectors to include.
    #[serde(default)]
    pub sectors: Vec<String>,
    pub city: Option<String>,
    /// Only recipients with an upcoming appointment.
    pub has_upcoming_appointment: Option<bool>,
    /// Only recipients last seen after this instant.
    pub last_seen_after: Option<DateTime<Utc>>,
    /// Arbitrary CRM tags, all of which must match.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SegmentationCriteria {
    /// Criteria with no filter at all select nobody on purpose; at least one
    /// filter must be set for the segment to be considered defined.
    pub fn is_empty(&self) -> bool {
        self.business_id.is_none()
            && self.sectors.is_empty()
            && self.city.is_none()
            && self.has_upcoming_appointment.is_none()
            && self.last_seen_after.is_none()
            && self.tags.is_empty()
    }
}

/// Trait for resolving recipient segments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SegmentationPort: Send + Sync {
    /// Resolve the concrete recipient list for the criteria, scoped to what
    /// the requesting user is allowed to target.
    async fn find_recipients(
        &self,
        criteria: &SegmentationCriteria,
        requesting_user_id: &str,
    ) -> NotificationResult<Vec<Recipient>>;
}

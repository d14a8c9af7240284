//! Error types for the notifications domain.

use crate::models::NotificationStatus;
use thiserror::Error;
use uuid::Uuid;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in the notifications domain.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Malformed input (recipient, title, content, date range, caps).
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Notification not found.
    #[error("Notification not found: {0}")]
    NotFound(Uuid),

    /// Campaign not found.
    #[error("Campaign not found: {0}")]
    CampaignNotFound(Uuid),

    /// Actor is not allowed to touch this notification.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Illegal lifecycle move according to the status transition table.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: NotificationStatus,
        to: NotificationStatus,
    },

    /// Delivery transport exhausted all pipeline attempts.
    #[error("Delivery failed after {attempts} attempts: {reason}")]
    DeliveryFailed { attempts: u32, reason: String },

    /// Repository failed to persist the notification.
    #[error("Failed to persist notification: {0}")]
    SaveFailed(String),

    /// Template rendering aborted because required placeholders are absent.
    #[error("Missing template variables: {}", .0.join(", "))]
    MissingTemplateVariables(Vec<String>),

    /// Attempt to delete a protected system notification without force+admin.
    #[error("System notification {0} is protected")]
    SystemNotificationProtected(Uuid),

    /// Cancellation requested for a campaign that already completed.
    #[error("Campaign {0} already completed")]
    CampaignCompleted(Uuid),

    /// Delivery provider error (single attempt, may be retried by the pipeline).
    #[error("Provider error: {0}")]
    Provider(String),

    /// Segmentation resolution failed; fails the campaign as a whole.
    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    /// Template engine error other than missing variables.
    #[error("Template rendering error: {0}")]
    Template(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for NotificationError {
    fn from(err: sea_orm::DbErr) -> Self {
        NotificationError::SaveFailed(err.to_string())
    }
}

impl From<handlebars::RenderError> for NotificationError {
    fn from(err: handlebars::RenderError) -> Self {
        NotificationError::Template(err.to_string())
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::Internal(format!("JSON serialization error: {}", err))
    }
}

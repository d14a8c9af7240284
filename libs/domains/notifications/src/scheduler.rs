//! Scheduler: priority-based delivery window validation and hand-off of
//! deferred deliveries to the external execution mechanism.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::delivery::{DeliveryPort, ScheduleReceipt};
use crate::error::{NotificationError, NotificationResult};
use crate::models::{Notification, Priority};

/// Structured outcome of a delivery window check.
///
/// Returned instead of an error so callers can attach their own business
/// context to the rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowValidation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl WindowValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Validate a requested delivery instant against the priority's scheduling
/// window.
pub fn validate_delivery_window(
    priority: Priority,
    scheduled_for: DateTime<Utc>,
    now: DateTime<Utc>,
) -> WindowValidation {
    if scheduled_for <= now {
        return WindowValidation::rejected("Scheduled date must be in the future");
    }
    let ceiling = priority.max_schedule_ahead();
    if scheduled_for - now > ceiling {
        return WindowValidation::rejected(format!(
            "{} notifications may be scheduled at most {} hours ahead",
            priority,
            ceiling.num_hours()
        ));
    }
    WindowValidation::ok()
}

/// Scheduler handing validated deferred deliveries to the Delivery Port.
pub struct DeliveryScheduler<D: DeliveryPort> {
    delivery: Arc<D>,
}

impl<D: DeliveryPort> DeliveryScheduler<D> {
    pub fn new(delivery: Arc<D>) -> Self {
        Self { delivery }
    }

    /// Register a deferred delivery and return the external handle.
    pub async fn schedule(
        &self,
        notification: &Notification,
    ) -> NotificationResult<ScheduleReceipt> {
        let when = notification.scheduled_for.ok_or_else(|| {
            NotificationError::Validation(
                "Notification has no scheduled delivery date".to_string(),
            )
        })?;

        let validation = validate_delivery_window(notification.priority, when, Utc::now());
        if !validation.valid {
            return Err(NotificationError::Validation(format!(
                "Invalid scheduling window: {}",
                validation.reason.unwrap_or_default()
            )));
        }

        let receipt = self.delivery.schedule(notification, when).await?;

        info!(
            notification_id = %notification.id,
            scheduled_id = %receipt.scheduled_id,
            scheduled_for = %when,
            transport = %self.delivery.name(),
            "Registered deferred delivery"
        );

        Ok(receipt)
    }
}

//! Notification service: the single-send pipeline and the lifecycle use
//! cases (mark-as-read, delete, lookups).
//!
//! The send pipeline is a short synchronous request/response call. It may
//! suspend on Delivery Port I/O and on backoff sleeps between retries, but
//! never spawns background work; deferred deliveries are handed to the
//! Scheduler instead.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::audit::{AuditAction, AuditEntry, AuditTrail};
use crate::delivery::DeliveryPort;
use crate::error::{NotificationError, NotificationResult};
use crate::models::{
    Actor, CreateNotification, Notification, NotificationQuery, NotificationStatus,
    SendNotificationRequest,
};
use crate::repository::NotificationRepository;
use crate::scheduler::{validate_delivery_window, DeliveryScheduler};

/// Fixed pipeline cap on synchronous delivery attempts, independent of
/// priority. The priority-specific retry budget only governs asynchronous
/// FAILED-state retries.
pub const MAX_SEND_ATTEMPTS: u32 = 3;

/// Configuration for the notification service.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Skip the exponential backoff between delivery attempts. Test
    /// environments must set this.
    pub skip_retry_backoff: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            skip_retry_backoff: std::env::var("NOTIFICATIONS_SKIP_BACKOFF")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

impl NotificationConfig {
    /// Config with inter-attempt backoff disabled.
    pub fn without_backoff() -> Self {
        Self {
            skip_retry_backoff: true,
        }
    }
}

/// Result of a successful pass through the send pipeline.
#[derive(Debug)]
pub enum SendOutcome {
    /// Delivered to the transport immediately.
    Sent {
        notification: Notification,
        message_id: Option<String>,
        delivery_time: DateTime<Utc>,
    },
    /// Handed off to the external deferred-execution mechanism.
    Scheduled {
        notification: Notification,
        scheduled_id: String,
    },
}

/// Service layer for notification business logic.
pub struct NotificationService<R, D, A>
where
    R: NotificationRepository,
    D: DeliveryPort,
    A: AuditTrail,
{
    repository: Arc<R>,
    delivery: Arc<D>,
    scheduler: DeliveryScheduler<D>,
    audit: Arc<A>,
    config: NotificationConfig,
}

impl<R, D, A> NotificationService<R, D, A>
where
    R: NotificationRepository,
    D: DeliveryPort,
    A: AuditTrail,
{
    pub fn new(repository: R, delivery: D, audit: A, config: NotificationConfig) -> Self {
        let delivery = Arc::new(delivery);
        Self {
            repository: Arc::new(repository),
            scheduler: DeliveryScheduler::new(Arc::clone(&delivery)),
            delivery,
            audit: Arc::new(audit),
            config,
        }
    }

    /// Validate, persist and deliver (or schedule) a single notification.
    #[instrument(skip(self, request), fields(recipient = %request.recipient_id, channel = %request.channel))]
    pub async fn send_notification(
        &self,
        request: SendNotificationRequest,
    ) -> NotificationResult<SendOutcome> {
        request
            .validate()
            .map_err(|e| NotificationError::Validation(e.to_string()))?;

        let notification = Notification::create(CreateNotification {
            recipient_id: request.recipient_id,
            title: request.title,
            content: request.content,
            channel: request.channel,
            priority: request.priority,
            scheduled_for: request.scheduled_for,
            metadata: request.metadata,
        })?;

        if let Some(when) = notification.scheduled_for {
            // Window rules are checked before anything is persisted so the
            // caller gets a business-rule error with context.
            let validation = validate_delivery_window(notification.priority, when, Utc::now());
            if !validation.valid {
                return Err(NotificationError::Validation(format!(
                    "Invalid scheduling window: {}",
                    validation.reason.unwrap_or_default()
                )));
            }
            self.persist(&notification).await?;
            let receipt = self.scheduler.schedule(&notification).await?;
            return Ok(SendOutcome::Scheduled {
                notification,
                scheduled_id: receipt.scheduled_id,
            });
        }

        self.persist(&notification).await?;
        self.attempt_delivery(notification).await
    }

    async fn persist(&self, notification: &Notification) -> NotificationResult<()> {
        self.repository.save(notification).await.map_err(|e| {
            error!(
                notification_id = %notification.id,
                recipient = %notification.recipient_id,
                error = %e,
                "Failed to persist notification"
            );
            NotificationError::SaveFailed(e.to_string())
        })
    }

    async fn persist_status(&self, notification: &Notification) -> NotificationResult<()> {
        self.repository.update_status(notification).await.map_err(|e| {
            error!(
                notification_id = %notification.id,
                status = %notification.status,
                error = %e,
                "Failed to persist status update"
            );
            e
        })
    }

    /// Deliver with up to [`MAX_SEND_ATTEMPTS`] attempts and exponential
    /// backoff between them.
    async fn attempt_delivery(
        &self,
        mut notification: Notification,
    ) -> NotificationResult<SendOutcome> {
        let mut last_error = String::new();

        for attempt in 1..=MAX_SEND_ATTEMPTS {
            info!(
                notification_id = %notification.id,
                attempt,
                max_attempts = MAX_SEND_ATTEMPTS,
                "Attempting delivery"
            );

            match self.delivery.send(&notification).await {
                Ok(receipt) => {
                    notification.mark_sent()?;
                    self.persist_status(&notification).await?;
                    info!(
                        notification_id = %notification.id,
                        attempt,
                        message_id = ?receipt.message_id,
                        "Notification sent"
                    );
                    return Ok(SendOutcome::Sent {
                        notification,
                        message_id: receipt.message_id,
                        delivery_time: receipt.delivery_time,
                    });
                }
                Err(e) => {
                    warn!(
                        notification_id = %notification.id,
                        attempt,
                        error = %e,
                        "Delivery attempt failed"
                    );
                    last_error = e.to_string();
                    if attempt < MAX_SEND_ATTEMPTS {
                        notification.register_retry();
                        if !self.config.skip_retry_backoff {
                            tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                        }
                    }
                }
            }
        }

        error!(
            notification_id = %notification.id,
            attempts = MAX_SEND_ATTEMPTS,
            error = %last_error,
            "Delivery failed, attempts exhausted"
        );
        notification.mark_failed(last_error.clone())?;
        self.persist_status(&notification).await?;

        Err(NotificationError::DeliveryFailed {
            attempts: MAX_SEND_ATTEMPTS,
            reason: last_error,
        })
    }

    /// Mark a notification as read on behalf of the actor.
    ///
    /// Re-marking an already-READ notification is an idempotent no-op that
    /// preserves the original `read_at`.
    #[instrument(skip(self, actor), fields(notification_id = %id, actor_id = %actor.user_id))]
    pub async fn mark_as_read(&self, id: Uuid, actor: &Actor) -> NotificationResult<Notification> {
        let mut notification = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(NotificationError::NotFound(id))?;

        self.check_access(&notification, actor, "mark as read").await?;

        if notification.status == NotificationStatus::Read {
            // mark_read logs the warning and keeps read_at.
            notification.mark_read()?;
            return Ok(notification);
        }

        notification.mark_read()?;
        self.repository.update_status(&notification).await?;
        self.record_audit(AuditEntry::new(
            AuditAction::MarkRead,
            id,
            &actor.user_id,
            "Notification marked as read",
        ))
        .await;

        Ok(notification)
    }

    /// Delete a notification, honoring protection rules for system
    /// notifications.
    ///
    /// Force-deleting a system notification requires the admin role; owners
    /// cannot force-delete their own system-critical notifications.
    #[instrument(skip(self, actor), fields(notification_id = %id, actor_id = %actor.user_id, force))]
    pub async fn delete_notification(
        &self,
        id: Uuid,
        actor: &Actor,
        force: bool,
    ) -> NotificationResult<()> {
        let notification = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(NotificationError::NotFound(id))?;

        self.check_access(&notification, actor, "delete").await?;

        if notification.metadata.is_system() {
            if !force {
                return Err(NotificationError::SystemNotificationProtected(id));
            }
            if !actor.is_admin() {
                self.record_audit(AuditEntry::new(
                    AuditAction::PermissionDenied,
                    id,
                    &actor.user_id,
                    "Force-delete of a system notification without admin role",
                ))
                .await;
                return Err(NotificationError::PermissionDenied(
                    "Force-deleting a system notification requires the admin role".to_string(),
                ));
            }
        }

        let deleted = self.repository.delete(id).await?;
        if !deleted {
            return Err(NotificationError::NotFound(id));
        }

        self.record_audit(AuditEntry::new(
            AuditAction::Delete,
            id,
            &actor.user_id,
            if force {
                "Notification force-deleted"
            } else {
                "Notification deleted"
            },
        ))
        .await;

        info!(notification_id = %id, force, "Notification deleted");
        Ok(())
    }

    /// Fetch a single notification, scoped to the actor.
    #[instrument(skip(self, actor), fields(notification_id = %id, actor_id = %actor.user_id))]
    pub async fn get_notification(
        &self,
        id: Uuid,
        actor: &Actor,
    ) -> NotificationResult<Notification> {
        let notification = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(NotificationError::NotFound(id))?;
        self.check_access(&notification, actor, "read").await?;
        Ok(notification)
    }

    /// List notifications. Non-admin actors are always scoped to their own
    /// recipient id, whatever the query says.
    pub async fn list_notifications(
        &self,
        mut query: NotificationQuery,
        actor: &Actor,
    ) -> NotificationResult<Vec<Notification>> {
        if !actor.is_admin() {
            query.recipient_id = Some(actor.user_id.clone());
        }
        self.repository.find_by_criteria(&query).await
    }

    async fn check_access(
        &self,
        notification: &Notification,
        actor: &Actor,
        action: &str,
    ) -> NotificationResult<()> {
        if actor.can_access(&notification.recipient_id) {
            return Ok(());
        }
        self.record_audit(AuditEntry::new(
            AuditAction::PermissionDenied,
            notification.id,
            &actor.user_id,
            format!("Attempt to {} another recipient's notification", action),
        ))
        .await;
        Err(NotificationError::PermissionDenied(format!(
            "User {} may not {} notifications of {}",
            actor.user_id, action, notification.recipient_id
        )))
    }

    /// Audit failures are logged, never allowed to mask the business outcome.
    async fn record_audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.record(entry).await {
            error!(error = %e, "Failed to record audit entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MockAuditTrail;
    use crate::delivery::{DeliveryReceipt, MockDeliveryPort, ScheduleReceipt};
    use crate::models::{Channel, NotificationMetadata, Priority};
    use crate::repository::MockNotificationRepository;
    use chrono::Duration as ChronoDuration;
    use mockall::Sequence;

    fn request(channel: Channel, content: &str) -> SendNotificationRequest {
        SendNotificationRequest {
            recipient_id: "user-1".to_string(),
            title: "Appointment confirmed".to_string(),
            content: content.to_string(),
            channel,
            priority: None,
            requesting_user_id: "user-1".to_string(),
            scheduled_for: None,
            metadata: NotificationMetadata::new(),
        }
    }

    fn service(
        repository: MockNotificationRepository,
        delivery: MockDeliveryPort,
        audit: MockAuditTrail,
    ) -> NotificationService<MockNotificationRepository, MockDeliveryPort, MockAuditTrail> {
        NotificationService::new(
            repository,
            delivery,
            audit,
            NotificationConfig::without_backoff(),
        )
    }

    fn receipt(message_id: &str) -> DeliveryReceipt {
        DeliveryReceipt {
            message_id: Some(message_id.to_string()),
            delivery_time: Utc::now(),
        }
    }

    fn stored_notification(recipient: &str) -> Notification {
        Notification::create(CreateNotification {
            recipient_id: recipient.to_string(),
            title: "Title".to_string(),
            content: "Content".to_string(),
            channel: Channel::InApp,
            priority: Some(Priority::Medium),
            scheduled_for: None,
            metadata: NotificationMetadata::new(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_happy_path() {
        let mut repository = MockNotificationRepository::new();
        repository.expect_save().times(1).returning(|_| Ok(()));
        repository
            .expect_update_status()
            .withf(|n| n.status == NotificationStatus::Sent && n.sent_at.is_some())
            .times(1)
            .returning(|_| Ok(()));

        let mut delivery = MockDeliveryPort::new();
        delivery
            .expect_send()
            .times(1)
            .returning(|_| Ok(receipt("msg-1")));

        let service = service(repository, delivery, MockAuditTrail::new());
        let outcome = service
            .send_notification(request(Channel::InApp, "hello"))
            .await
            .unwrap();

        match outcome {
            SendOutcome::Sent {
                notification,
                message_id,
                ..
            } => {
                assert_eq!(notification.status, NotificationStatus::Sent);
                assert_eq!(notification.retry_count, 0);
                assert_eq!(message_id.as_deref(), Some("msg-1"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_succeeds_on_third_attempt() {
        let mut repository = MockNotificationRepository::new();
        repository.expect_save().times(1).returning(|_| Ok(()));
        repository
            .expect_update_status()
            .withf(|n| n.status == NotificationStatus::Sent)
            .times(1)
            .returning(|_| Ok(()));

        let mut delivery = MockDeliveryPort::new();
        let mut seq = Sequence::new();
        delivery
            .expect_send()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(NotificationError::Provider("connection reset".to_string())));
        delivery
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(receipt("msg-3")));

        let service = service(repository, delivery, MockAuditTrail::new());
        let outcome = service
            .send_notification(request(Channel::InApp, "hello"))
            .await
            .unwrap();

        match outcome {
            SendOutcome::Sent {
                notification,
                message_id,
                ..
            } => {
                assert_eq!(message_id.as_deref(), Some("msg-3"));
                // Two re-attempts were recorded before the third succeeded.
                assert_eq!(notification.retry_count, 2);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_exhausts_attempts_and_fails() {
        let mut repository = MockNotificationRepository::new();
        repository.expect_save().times(1).returning(|_| Ok(()));
        repository
            .expect_update_status()
            .withf(|n| {
                n.status == NotificationStatus::Failed
                    && n.failure_reason.as_deref().is_some_and(|r| r.contains("down"))
                    && n.retry_count <= MAX_SEND_ATTEMPTS
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut delivery = MockDeliveryPort::new();
        delivery
            .expect_send()
            .times(3)
            .returning(|_| Err(NotificationError::Provider("gateway down".to_string())));

        let service = service(repository, delivery, MockAuditTrail::new());
        let err = service
            .send_notification(request(Channel::InApp, "hello"))
            .await
            .unwrap_err();

        match err {
            NotificationError::DeliveryFailed { attempts, reason } => {
                assert_eq!(attempts, 3);
                assert!(reason.contains("gateway down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_status_persistence_failure_after_send_is_re_raised() {
        let mut repository = MockNotificationRepository::new();
        repository.expect_save().times(1).returning(|_| Ok(()));
        repository
            .expect_update_status()
            .times(1)
            .returning(|_| Err(NotificationError::SaveFailed("db down".to_string())));

        let mut delivery = MockDeliveryPort::new();
        delivery
            .expect_send()
            .times(1)
            .returning(|_| Ok(receipt("msg-1")));

        let service = service(repository, delivery, MockAuditTrail::new());
        let err = service
            .send_notification(request(Channel::InApp, "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::SaveFailed(_)));
    }

    #[tokio::test]
    async fn test_save_failure_aborts_before_delivery() {
        let mut repository = MockNotificationRepository::new();
        repository
            .expect_save()
            .times(1)
            .returning(|_| Err(NotificationError::SaveFailed("db down".to_string())));

        let mut delivery = MockDeliveryPort::new();
        delivery.expect_send().times(0);

        let service = service(repository, delivery, MockAuditTrail::new());
        let err = service
            .send_notification(request(Channel::InApp, "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::SaveFailed(_)));
    }

    #[tokio::test]
    async fn test_oversized_sms_is_rejected_before_persistence() {
        let mut repository = MockNotificationRepository::new();
        repository.expect_save().times(0);

        let service = service(repository, MockDeliveryPort::new(), MockAuditTrail::new());
        let err = service
            .send_notification(request(Channel::Sms, &"x".repeat(161)))
            .await
            .unwrap_err();
        match err {
            NotificationError::Validation(msg) => {
                assert_eq!(msg, "Content exceeds maximum length for SMS");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_scheduled_request_is_handed_to_the_scheduler() {
        let mut repository = MockNotificationRepository::new();
        repository.expect_save().times(1).returning(|_| Ok(()));

        let mut delivery = MockDeliveryPort::new();
        delivery.expect_send().times(0);
        delivery.expect_schedule().times(1).returning(|_, when| {
            Ok(ScheduleReceipt {
                scheduled_id: "deferred-1".to_string(),
                scheduled_for: when,
            })
        });
        delivery.expect_name().return_const("mock");

        let service = service(repository, delivery, MockAuditTrail::new());
        let mut req = request(Channel::Email, "see you tomorrow");
        req.scheduled_for = Some(Utc::now() + ChronoDuration::hours(6));

        let outcome = service.send_notification(req).await.unwrap();
        match outcome {
            SendOutcome::Scheduled {
                notification,
                scheduled_id,
            } => {
                assert_eq!(scheduled_id, "deferred-1");
                assert_eq!(notification.status, NotificationStatus::Pending);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_urgent_schedule_beyond_window_is_rejected() {
        let mut repository = MockNotificationRepository::new();
        repository.expect_save().times(0);

        let service = service(repository, MockDeliveryPort::new(), MockAuditTrail::new());
        let mut req = request(Channel::Sms, "now-ish");
        req.priority = Some(Priority::Urgent);
        req.scheduled_for = Some(Utc::now() + ChronoDuration::days(400));

        let err = service.send_notification(req).await.unwrap_err();
        match err {
            NotificationError::Validation(msg) => {
                assert!(msg.contains("Invalid scheduling window"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_mark_as_read_requires_ownership() {
        let stored = stored_notification("user-1");
        let id = stored.id;

        let mut repository = MockNotificationRepository::new();
        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));
        repository.expect_update_status().times(0);

        let mut audit = MockAuditTrail::new();
        audit
            .expect_record()
            .withf(|entry| entry.action == AuditAction::PermissionDenied)
            .times(1)
            .returning(|_| Ok(()));

        let service = service(repository, MockDeliveryPort::new(), audit);
        let err = service
            .mark_as_read(id, &Actor::member("user-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_mark_as_read_transitions_and_audits() {
        let mut stored = stored_notification("user-1");
        stored.mark_sent().unwrap();
        stored.mark_delivered().unwrap();
        let id = stored.id;

        let mut repository = MockNotificationRepository::new();
        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));
        repository
            .expect_update_status()
            .withf(|n| n.status == NotificationStatus::Read && n.read_at.is_some())
            .times(1)
            .returning(|_| Ok(()));

        let mut audit = MockAuditTrail::new();
        audit
            .expect_record()
            .withf(|entry| entry.action == AuditAction::MarkRead)
            .times(1)
            .returning(|_| Ok(()));

        let service = service(repository, MockDeliveryPort::new(), audit);
        let notification = service.mark_as_read(id, &Actor::member("user-1")).await.unwrap();
        assert_eq!(notification.status, NotificationStatus::Read);
    }

    #[tokio::test]
    async fn test_mark_as_read_is_idempotent() {
        let mut stored = stored_notification("user-1");
        stored.mark_sent().unwrap();
        stored.mark_delivered().unwrap();
        stored.mark_read().unwrap();
        let original_read_at = stored.read_at;
        let id = stored.id;

        let mut repository = MockNotificationRepository::new();
        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));
        // No persistence and no audit entry for the no-op.
        repository.expect_update_status().times(0);

        let service = service(repository, MockDeliveryPort::new(), MockAuditTrail::new());
        let notification = service.mark_as_read(id, &Actor::member("user-1")).await.unwrap();
        assert_eq!(notification.read_at, original_read_at);
    }

    #[tokio::test]
    async fn test_mark_as_read_of_sent_notification_is_an_illegal_transition() {
        let mut stored = stored_notification("user-1");
        stored.mark_sent().unwrap();
        let id = stored.id;

        let mut repository = MockNotificationRepository::new();
        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));
        repository.expect_update_status().times(0);

        let service = service(repository, MockDeliveryPort::new(), MockAuditTrail::new());
        let err = service
            .mark_as_read(id, &Actor::member("user-1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NotificationError::InvalidStatusTransition { .. }
        ));
    }

    fn system_notification(recipient: &str) -> Notification {
        let mut metadata = NotificationMetadata::new();
        metadata.set_original_event_type(crate::models::SYSTEM_EVENT_TYPE);
        Notification::create(CreateNotification {
            recipient_id: recipient.to_string(),
            title: "Account notice".to_string(),
            content: "Your data export is ready".to_string(),
            channel: Channel::InApp,
            priority: Some(Priority::High),
            scheduled_for: None,
            metadata,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_delete_system_notification_without_force_is_protected() {
        let stored = system_notification("user-1");
        let id = stored.id;

        let mut repository = MockNotificationRepository::new();
        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));
        repository.expect_delete().times(0);

        let service = service(repository, MockDeliveryPort::new(), MockAuditTrail::new());
        let err = service
            .delete_notification(id, &Actor::member("user-1"), false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NotificationError::SystemNotificationProtected(found) if found == id
        ));
    }

    #[tokio::test]
    async fn test_force_delete_requires_admin_even_for_the_owner() {
        let stored = system_notification("user-1");
        let id = stored.id;

        let mut repository = MockNotificationRepository::new();
        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));
        repository.expect_delete().times(0);

        let mut audit = MockAuditTrail::new();
        audit
            .expect_record()
            .withf(|entry| entry.action == AuditAction::PermissionDenied)
            .times(1)
            .returning(|_| Ok(()));

        let service = service(repository, MockDeliveryPort::new(), audit);
        let err = service
            .delete_notification(id, &Actor::member("user-1"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_admin_force_delete_succeeds_and_audits() {
        let stored = system_notification("user-1");
        let id = stored.id;

        let mut repository = MockNotificationRepository::new();
        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));
        repository
            .expect_delete()
            .times(1)
            .returning(|_| Ok(true));

        let mut audit = MockAuditTrail::new();
        audit
            .expect_record()
            .withf(|entry| entry.action == AuditAction::Delete)
            .times(1)
            .returning(|_| Ok(()));

        let service = service(repository, MockDeliveryPort::new(), audit);
        service
            .delete_notification(id, &Actor::admin("ops-1"), true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_scopes_non_admin_actors_to_their_own_notifications() {
        let mut repository = MockNotificationRepository::new();
        repository
            .expect_find_by_criteria()
            .withf(|query| query.recipient_id.as_deref() == Some("user-1"))
            .times(1)
            .returning(|_| Ok(Vec::new()));

        let service = service(repository, MockDeliveryPort::new(), MockAuditTrail::new());
        let query = NotificationQuery {
            recipient_id: Some("someone-else".to_string()),
            ..Default::default()
        };
        service
            .list_notifications(query, &Actor::member("user-1"))
            .await
            .unwrap();
    }
}

//! Data models for the notifications domain.
//!
//! The value objects (`Channel`, `Priority`, `NotificationStatus`) are closed
//! enums carrying their business rules, so exhaustiveness is checked at
//! compile time. The `Notification` entity is only mutated through explicit
//! transition methods that consult the status transition table.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use strum::Display;
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

use crate::error::{NotificationError, NotificationResult};

// ============================================================================
// Value Objects
// ============================================================================

/// Delivery medium for a notification.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "notification_channel")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    #[sea_orm(string_value = "email")]
    Email,
    #[sea_orm(string_value = "sms")]
    Sms,
    #[sea_orm(string_value = "push")]
    Push,
    #[sea_orm(string_value = "in_app")]
    InApp,
}

/// Contact attribute a channel needs on the recipient profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactRequirement {
    EmailAddress,
    PhoneNumber,
    DeviceToken,
    None,
}

impl Channel {
    /// Maximum content length accepted by the channel, in characters.
    pub fn max_content_length(self) -> usize {
        match self {
            Channel::Email => 10_000,
            Channel::Sms => 160,
            Channel::Push => 512,
            Channel::InApp => 2_000,
        }
    }

    /// Whether delivery requires internet connectivity on the recipient side.
    pub fn requires_internet(self) -> bool {
        !matches!(self, Channel::InApp)
    }

    /// Whether the channel delivers near-instantaneously.
    pub fn is_instantaneous(self) -> bool {
        !matches!(self, Channel::Email)
    }

    /// Priority assumed when the caller does not specify one.
    pub fn default_priority(self) -> Priority {
        match self {
            Channel::Email => Priority::Medium,
            Channel::Sms => Priority::High,
            Channel::Push => Priority::Medium,
            Channel::InApp => Priority::Low,
        }
    }

    /// Recipient contact attribute required for delivery.
    pub fn required_contact(self) -> ContactRequirement {
        match self {
            Channel::Email => ContactRequirement::EmailAddress,
            Channel::Sms => ContactRequirement::PhoneNumber,
            Channel::Push => ContactRequirement::DeviceToken,
            Channel::InApp => ContactRequirement::None,
        }
    }

    /// Whether the channel supports rich (HTML/markup) content.
    pub fn supports_rich_content(self) -> bool {
        matches!(self, Channel::Email | Channel::InApp)
    }
}

/// Urgency classification driving retry budget and scheduling windows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    Default,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "notification_priority")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    #[sea_orm(string_value = "low")]
    Low,
    /// Default priority
    #[default]
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "urgent")]
    Urgent,
}

impl Priority {
    /// Numeric rank for comparison; higher is more urgent.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }

    /// Recommended delay before an asynchronous processor picks the
    /// notification up.
    pub fn recommended_delay(self) -> Duration {
        match self {
            Priority::Low => Duration::from_secs(30 * 60),
            Priority::Medium => Duration::from_secs(5 * 60),
            Priority::High => Duration::from_secs(60),
            Priority::Urgent => Duration::ZERO,
        }
    }

    /// Retry budget for asynchronous FAILED-state retries. Distinct from the
    /// fixed 3-attempt cap of the synchronous send pipeline.
    pub fn max_retry_attempts(self) -> u32 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Urgent => 5,
        }
    }

    /// Ceiling on how far in advance a notification of this priority may be
    /// scheduled. Urgent notifications lose their meaning past a day.
    pub fn max_schedule_ahead(self) -> ChronoDuration {
        match self {
            Priority::Low => ChronoDuration::days(365),
            Priority::Medium => ChronoDuration::days(90),
            Priority::High => ChronoDuration::days(7),
            Priority::Urgent => ChronoDuration::hours(24),
        }
    }
}

/// Lifecycle status of a notification.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    Default,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "notification_status")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "read")]
    Read,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl NotificationStatus {
    /// Directed transition table. Terminal states allow nothing, including
    /// idempotent re-entry.
    pub fn can_transition_to(self, target: NotificationStatus) -> bool {
        use NotificationStatus::*;
        matches!(
            (self, target),
            (Pending, Sent)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Sent, Delivered)
                | (Sent, Failed)
                | (Sent, Cancelled)
                | (Delivered, Read)
                | (Delivered, Failed)
        )
    }

    /// A terminal status permits no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NotificationStatus::Read | NotificationStatus::Failed | NotificationStatus::Cancelled
        )
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Value of `originalEventType` marking a protected system notification.
pub const SYSTEM_EVENT_TYPE: &str = "SYSTEM";

/// Restricted string-keyed metadata map used for correlation.
///
/// Well-known keys have typed accessors; custom keys are validated at write
/// time (non-empty, at most 64 chars, alphanumeric or underscore).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationMetadata {
    entries: BTreeMap<String, String>,
}

impl NotificationMetadata {
    pub const ORIGINAL_EVENT_TYPE: &'static str = "originalEventType";
    pub const APPOINTMENT_ID: &'static str = "appointmentId";
    pub const BUSINESS_ID: &'static str = "businessId";
    pub const TEMPLATE_ID: &'static str = "templateId";
    pub const CAMPAIGN_ID: &'static str = "campaignId";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert a custom key, validating it against the restricted key rules.
    pub fn insert_custom(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> NotificationResult<()> {
        let key = key.into();
        if key.is_empty() || key.len() > 64 {
            return Err(NotificationError::Validation(format!(
                "Invalid metadata key: {:?}",
                key
            )));
        }
        if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(NotificationError::Validation(format!(
                "Metadata key contains illegal characters: {:?}",
                key
            )));
        }
        self.entries.insert(key, value.into());
        Ok(())
    }

    pub fn set_original_event_type(&mut self, event_type: impl Into<String>) {
        self.entries
            .insert(Self::ORIGINAL_EVENT_TYPE.to_string(), event_type.into());
    }

    pub fn original_event_type(&self) -> Option<&str> {
        self.get(Self::ORIGINAL_EVENT_TYPE)
    }

    pub fn set_appointment_id(&mut self, id: Uuid) {
        self.entries
            .insert(Self::APPOINTMENT_ID.to_string(), id.to_string());
    }

    pub fn appointment_id(&self) -> Option<Uuid> {
        self.get(Self::APPOINTMENT_ID).and_then(|v| v.parse().ok())
    }

    pub fn set_business_id(&mut self, id: Uuid) {
        self.entries
            .insert(Self::BUSINESS_ID.to_string(), id.to_string());
    }

    pub fn business_id(&self) -> Option<Uuid> {
        self.get(Self::BUSINESS_ID).and_then(|v| v.parse().ok())
    }

    pub fn set_template_id(&mut self, template_id: impl Into<String>) {
        self.entries
            .insert(Self::TEMPLATE_ID.to_string(), template_id.into());
    }

    pub fn template_id(&self) -> Option<&str> {
        self.get(Self::TEMPLATE_ID)
    }

    pub fn set_campaign_id(&mut self, id: Uuid) {
        self.entries
            .insert(Self::CAMPAIGN_ID.to_string(), id.to_string());
    }

    pub fn campaign_id(&self) -> Option<Uuid> {
        self.get(Self::CAMPAIGN_ID).and_then(|v| v.parse().ok())
    }

    /// Whether this marks a protected system notification.
    pub fn is_system(&self) -> bool {
        self.original_event_type() == Some(SYSTEM_EVENT_TYPE)
    }
}

// ============================================================================
// Notification Entity
// ============================================================================

/// Parameters for creating a notification.
#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub recipient_id: String,
    pub title: String,
    pub content: String,
    pub channel: Channel,
    /// Defaults to the channel's default priority when absent.
    pub priority: Option<Priority>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub metadata: NotificationMetadata,
}

/// Notification entity - the unit of delivery work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier
    pub id: Uuid,
    pub recipient_id: String,
    pub title: String,
    pub content: String,
    pub channel: Channel,
    pub priority: Priority,
    pub status: NotificationStatus,
    pub metadata: NotificationMetadata,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    /// Number of delivery re-attempts recorded so far.
    pub retry_count: u32,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Create a new PENDING notification, enforcing the creation invariants.
    pub fn create(params: CreateNotification) -> NotificationResult<Self> {
        if params.recipient_id.trim().is_empty() {
            return Err(NotificationError::Validation(
                "Recipient must not be empty".to_string(),
            ));
        }
        if params.title.trim().is_empty() {
            return Err(NotificationError::Validation(
                "Title must not be empty".to_string(),
            ));
        }
        if params.content.trim().is_empty() {
            return Err(NotificationError::Validation(
                "Content must not be empty".to_string(),
            ));
        }
        if params.content.chars().count() > params.channel.max_content_length() {
            return Err(NotificationError::Validation(format!(
                "Content exceeds maximum length for {}",
                params.channel
            )));
        }
        if let Some(when) = params.scheduled_for {
            if when <= Utc::now() {
                return Err(NotificationError::Validation(
                    "Scheduled date must be in the future".to_string(),
                ));
            }
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            recipient_id: params.recipient_id,
            title: params.title,
            content: params.content,
            channel: params.channel,
            priority: params
                .priority
                .unwrap_or_else(|| params.channel.default_priority()),
            status: NotificationStatus::Pending,
            metadata: params.metadata,
            sent_at: None,
            delivered_at: None,
            read_at: None,
            failure_reason: None,
            retry_count: 0,
            scheduled_for: params.scheduled_for,
            created_at: now,
            updated_at: now,
        })
    }

    fn transition(&mut self, target: NotificationStatus) -> NotificationResult<()> {
        if !self.status.can_transition_to(target) {
            return Err(NotificationError::InvalidStatusTransition {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the notification as handed to the transport.
    pub fn mark_sent(&mut self) -> NotificationResult<()> {
        self.transition(NotificationStatus::Sent)?;
        self.sent_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the notification as delivered to the recipient device/inbox.
    pub fn mark_delivered(&mut self) -> NotificationResult<()> {
        self.transition(NotificationStatus::Delivered)?;
        self.delivered_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the notification as read.
    ///
    /// Re-marking an already-READ notification is an idempotent no-op that
    /// preserves the original `read_at`.
    pub fn mark_read(&mut self) -> NotificationResult<()> {
        if self.status == NotificationStatus::Read {
            warn!(
                notification_id = %self.id,
                "Notification already marked as read, keeping original read_at"
            );
            return Ok(());
        }
        self.transition(NotificationStatus::Read)?;
        self.read_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the notification as failed with the underlying reason.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> NotificationResult<()> {
        self.transition(NotificationStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Cancel the notification before it reaches a terminal state.
    pub fn cancel(&mut self) -> NotificationResult<()> {
        self.transition(NotificationStatus::Cancelled)
    }

    /// Record one delivery re-attempt.
    pub fn register_retry(&mut self) {
        self.retry_count += 1;
        self.updated_at = Utc::now();
    }

    /// Whether an asynchronous retry is still allowed: only FAILED
    /// notifications with remaining priority budget qualify.
    pub fn can_retry(&self) -> bool {
        self.status == NotificationStatus::Failed
            && self.retry_count < self.priority.max_retry_attempts()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// ============================================================================
// Requests, queries, actors
// ============================================================================

/// Input for the single-send pipeline.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendNotificationRequest {
    #[validate(length(min = 1))]
    pub recipient_id: String,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    pub channel: Channel,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[validate(length(min = 1))]
    pub requesting_user_id: String,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: NotificationMetadata,
}

/// Sort order for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Query filters for listing notifications.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotificationQuery {
    pub recipient_id: Option<String>,
    pub channel: Option<Channel>,
    pub status: Option<NotificationStatus>,
    pub priority: Option<Priority>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Full-text filter over title and content.
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub sort: SortOrder,
}

fn default_limit() -> usize {
    50
}

/// Role of the user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Member,
    Admin,
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn member(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: ActorRole::Member,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: ActorRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    /// Recipients may touch their own notifications; admins may touch any.
    pub fn can_access(&self, recipient_id: &str) -> bool {
        self.is_admin() || self.user_id == recipient_id
    }
}

//! Notifications Domain
//!
//! Notification delivery engine for the platform: lifecycle state machine,
//! single-send pipeline with bounded retry, priority-window scheduling,
//! bulk campaigns and read-only delivery analytics.
//!
//! # Features
//!
//! - Channel/priority value objects with embedded business rules
//! - Notification lifecycle with an explicit legal-transition table
//! - Single-send pipeline with bounded retry and exponential backoff
//! - Priority-based scheduling windows for deferred delivery
//! - Bulk campaigns with batching, rate limiting and partial-failure reporting
//! - Handlebars templates with per-language fallback
//! - Delivery-rate and latency analytics
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │ NotificationService  │   │    CampaignEngine    │  ← use cases
//! └──────────┬───────────┘   └──────────┬───────────┘
//!            │    ┌─────────────────┐   │
//!            ├────│ TemplateEngine  │───┤
//!            │    └─────────────────┘   │
//! ┌──────────▼───────────┐   ┌──────────▼───────────┐
//! │     Notification     │   │   SegmentationPort   │
//! │   (state machine)    │   └──────────────────────┘
//! └──────────┬───────────┘
//!            │
//! ┌──────────▼───────────┐   ┌──────────────────────┐
//! │     DeliveryPort     │   │ NotificationRepo +   │
//! │ (email/SMS/push/app) │   │      AuditTrail      │
//! └──────────────────────┘   └──────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{
//!     NotificationService, SendNotificationRequest, Channel,
//! };
//!
//! let service = NotificationService::new(repository, delivery, audit, Default::default());
//!
//! let outcome = service
//!     .send_notification(SendNotificationRequest {
//!         recipient_id: "client-42".to_string(),
//!         title: "Appointment confirmed".to_string(),
//!         content: "See you Tuesday at 10:00.".to_string(),
//!         channel: Channel::Email,
//!         priority: None,
//!         requesting_user_id: "staff-7".to_string(),
//!         scheduled_for: None,
//!         metadata: Default::default(),
//!     })
//!     .await?;
//! ```

pub mod analytics;
pub mod audit;
pub mod campaign;
pub mod delivery;
pub mod entity;
pub mod error;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod segmentation;
pub mod service;
pub mod templates;

// Re-export commonly used types
pub use analytics::{
    AnalyticsQuery, AnalyticsService, ChannelReport, ChannelTally, DeliveryReport, DeliveryTally,
};
pub use audit::{AuditAction, AuditEntry, AuditTrail};
pub use campaign::{
    BulkCampaignRequest, CampaignEngine, CampaignHandle, CampaignProgress, CampaignReceipt,
    CampaignStatus,
};
pub use delivery::{DeliveryPort, DeliveryReceipt, ScheduleReceipt};
pub use error::{NotificationError, NotificationResult};
pub use models::{
    Actor, ActorRole, Channel, CreateNotification, Notification, NotificationMetadata,
    NotificationQuery, NotificationStatus, Priority, SendNotificationRequest, SortOrder,
};
pub use repository::NotificationRepository;
pub use scheduler::{DeliveryScheduler, WindowValidation, validate_delivery_window};
pub use segmentation::{Recipient, SegmentationCriteria, SegmentationPort};
pub use service::{NotificationConfig, NotificationService, SendOutcome};
pub use templates::{NotificationEvent, RenderedMessage, TemplateEngine};

use async_trait::async_trait;
use uuid::Uuid;

use crate::analytics::{AnalyticsQuery, DeliveryTally};
use crate::error::NotificationResult;
use crate::models::{Notification, NotificationQuery};

/// Repository trait for Notification persistence
///
/// This trait defines the data access interface for notifications.
/// Implementations can use different storage backends (PostgreSQL, etc.)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Persist a new notification
    async fn save(&self, notification: &Notification) -> NotificationResult<()>;

    /// Get a notification by ID
    async fn find_by_id(&self, id: Uuid) -> NotificationResult<Option<Notification>>;

    /// List notifications for a recipient, newest first
    async fn find_by_recipient(
        &self,
        recipient_id: &str,
        limit: usize,
        offset: usize,
    ) -> NotificationResult<Vec<Notification>>;

    /// Persist the current status and lifecycle timestamps of a notification
    async fn update_status(&self, notification: &Notification) -> NotificationResult<()>;

    /// List notifications matching the query, with pagination and sort
    async fn find_by_criteria(
        &self,
        query: &NotificationQuery,
    ) -> NotificationResult<Vec<Notification>>;

    /// Delete a notification by ID, returning whether a row was removed
    async fn delete(&self, id: Uuid) -> NotificationResult<bool>;

    /// Raw delivery counters and latency sums for the analytics aggregator
    async fn get_statistics(&self, query: &AnalyticsQuery) -> NotificationResult<DeliveryTally>;
}

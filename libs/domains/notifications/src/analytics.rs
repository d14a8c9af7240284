//! Read-only analytics over the notification history.
//!
//! The repository does the heavy counting; this module validates the query,
//! turns raw tallies into rates and keeps well out of the delivery path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{NotificationError, NotificationResult};
use crate::models::Channel;
use crate::repository::NotificationRepository;

/// Date range plus optional filters for an analytics report.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalyticsQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    #[serde(default)]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub business_id: Option<Uuid>,
    #[serde(default)]
    pub recipient_id: Option<String>,
}

/// Raw counters aggregated by the repository for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryTally {
    /// Notifications created within the range.
    pub total: u64,
    pub sent: u64,
    pub delivered: u64,
    /// Delivered notifications that were opened.
    pub read: u64,
    /// Delivered notifications with a recorded click.
    pub clicked: u64,
    pub failed: u64,
    pub channels: Vec<ChannelTally>,
}

/// Per-channel delivery counters with summed latency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTally {
    pub channel: Channel,
    pub sent: u64,
    pub delivered: u64,
    /// Sum of send-to-delivery latencies, in milliseconds.
    pub total_latency_ms: u64,
}

/// Per-channel slice of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelReport {
    pub channel: Channel,
    pub sent: u64,
    pub delivered: u64,
    pub avg_latency_ms: f64,
}

/// Aggregated delivery statistics for a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total: u64,
    pub sent: u64,
    pub delivered: u64,
    pub read: u64,
    pub clicked: u64,
    pub failed: u64,
    /// delivered / sent.
    pub delivery_rate: f64,
    /// read / delivered.
    pub open_rate: f64,
    /// clicked / delivered.
    pub click_rate: f64,
    pub channels: Vec<ChannelReport>,
}

fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}

/// Read-only analytics service over the notification repository.
#[derive(Clone)]
pub struct AnalyticsService<R: NotificationRepository> {
    repository: Arc<R>,
}

impl<R: NotificationRepository> AnalyticsService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Compute the delivery report for a validated date range.
    #[instrument(skip(self, query), fields(from = %query.from, to = %query.to))]
    pub async fn delivery_report(&self, query: AnalyticsQuery) -> NotificationResult<DeliveryReport> {
        if query.from > query.to {
            return Err(NotificationError::Validation(
                "Date range end must not precede its start".to_string(),
            ));
        }

        let tally = self.repository.get_statistics(&query).await?;

        let channels: Vec<ChannelReport> = tally
            .channels
            .iter()
            .map(|c| ChannelReport {
                channel: c.channel,
                sent: c.sent,
                delivered: c.delivered,
                avg_latency_ms: rate(c.total_latency_ms, c.delivered),
            })
            .collect();

        let report = DeliveryReport {
            from: query.from,
            to: query.to,
            total: tally.total,
            sent: tally.sent,
            delivered: tally.delivered,
            read: tally.read,
            clicked: tally.clicked,
            failed: tally.failed,
            delivery_rate: rate(tally.delivered, tally.sent),
            open_rate: rate(tally.read, tally.delivered),
            click_rate: rate(tally.clicked, tally.delivered),
            channels,
        };

        info!(
            total = report.total,
            delivery_rate = format!("{:.3}", report.delivery_rate),
            "Delivery report computed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockNotificationRepository;
    use chrono::Duration;

    fn range_query() -> AnalyticsQuery {
        let to = Utc::now();
        AnalyticsQuery {
            from: to - Duration::days(30),
            to,
            channel: None,
            business_id: None,
            recipient_id: None,
        }
    }

    #[tokio::test]
    async fn test_report_rates_from_tally() {
        let mut repository = MockNotificationRepository::new();
        repository.expect_get_statistics().times(1).returning(|_| {
            Ok(DeliveryTally {
                total: 1_000,
                sent: 960,
                delivered: 912,
                read: 456,
                clicked: 114,
                failed: 40,
                channels: vec![
                    ChannelTally {
                        channel: Channel::Email,
                        sent: 700,
                        delivered: 680,
                        total_latency_ms: 1_360_000,
                    },
                    ChannelTally {
                        channel: Channel::Sms,
                        sent: 260,
                        delivered: 232,
                        total_latency_ms: 116_000,
                    },
                ],
            })
        });

        let service = AnalyticsService::new(Arc::new(repository));
        let report = service.delivery_report(range_query()).await.unwrap();

        assert_eq!(report.delivery_rate, 912.0 / 960.0);
        assert_eq!(report.open_rate, 456.0 / 912.0);
        assert_eq!(report.click_rate, 114.0 / 912.0);
        assert_eq!(report.channels.len(), 2);
        assert_eq!(report.channels[0].avg_latency_ms, 2_000.0);
        assert_eq!(report.channels[1].avg_latency_ms, 500.0);
    }

    #[tokio::test]
    async fn test_zero_denominators_yield_zero_rates() {
        let mut repository = MockNotificationRepository::new();
        repository
            .expect_get_statistics()
            .returning(|_| Ok(DeliveryTally::default()));

        let service = AnalyticsService::new(Arc::new(repository));
        let report = service.delivery_report(range_query()).await.unwrap();

        assert_eq!(report.delivery_rate, 0.0);
        assert_eq!(report.open_rate, 0.0);
        assert_eq!(report.click_rate, 0.0);
        assert!(report.channels.is_empty());
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected_before_the_repository() {
        let mut repository = MockNotificationRepository::new();
        repository.expect_get_statistics().times(0);

        let service = AnalyticsService::new(Arc::new(repository));
        let mut query = range_query();
        std::mem::swap(&mut query.from, &mut query.to);

        assert!(matches!(
            service.delivery_report(query).await.unwrap_err(),
            NotificationError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_filters_are_passed_through() {
        let business = Uuid::now_v7();
        let mut repository = MockNotificationRepository::new();
        repository
            .expect_get_statistics()
            .withf(move |q| {
                q.channel == Some(Channel::Push)
                    && q.business_id == Some(business)
                    && q.recipient_id.as_deref() == Some("client-9")
            })
            .times(1)
            .returning(|_| Ok(DeliveryTally::default()));

        let service = AnalyticsService::new(Arc::new(repository));
        let mut query = range_query();
        query.channel = Some(Channel::Push);
        query.business_id = Some(business);
        query.recipient_id = Some("client-9".to_string());

        service.delivery_report(query).await.unwrap();
    }
}

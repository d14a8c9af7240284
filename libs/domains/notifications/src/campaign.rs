//! Bulk campaign engine.
//!
//! A campaign fans one template out to up to tens of thousands of recipients.
//! `launch` validates the request, resolves the recipient set, fails fast on
//! missing template variables and returns a receipt immediately; the actual
//! sending runs as a detached background task per campaign. Batches are
//! processed strictly sequentially to honor the rate limit; within a batch,
//! sends run concurrently and every recipient failure is caught individually.
//! Cancellation is cooperative and checked at batch boundaries only, so sends
//! already dispatched within a batch run to completion.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strum::Display;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::delivery::DeliveryPort;
use crate::error::{NotificationError, NotificationResult};
use crate::models::{Channel, CreateNotification, Notification, NotificationMetadata, Priority};
use crate::repository::NotificationRepository;
use crate::segmentation::{Recipient, SegmentationCriteria, SegmentationPort};
use crate::templates::{NotificationEvent, RenderedMessage, TemplateEngine};

/// Hard cap on explicitly listed recipients.
pub const MAX_EXPLICIT_RECIPIENTS: usize = 10_000;
/// Batch size bounds.
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const MAX_BATCH_SIZE: usize = 500;
/// Rate limit bounds, in sends per minute.
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 1_000;
pub const MAX_RATE_LIMIT_PER_MINUTE: u32 = 5_000;
/// Trailing errors kept per campaign.
const MAX_TRAILING_ERRORS: usize = 10;
/// Campaigns may be scheduled at most one year ahead.
const MAX_SCHEDULE_AHEAD_DAYS: i64 = 365;

/// Lifecycle status of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CampaignStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

/// Input for launching a bulk campaign.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkCampaignRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub event: NotificationEvent,
    pub channel: Channel,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Explicit recipient ids; mutually exclusive with `segmentation`.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Declarative segment; mutually exclusive with `recipients`.
    #[serde(default)]
    pub segmentation: Option<SegmentationCriteria>,
    /// Default template variables applied to every recipient.
    #[serde(default)]
    pub variables: serde_json::Map<String, Value>,
    /// Per-recipient variable overrides keyed by recipient id.
    #[serde(default)]
    pub per_recipient_variables: HashMap<String, serde_json::Map<String, Value>>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    /// Optional deferred start, at most one year ahead.
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[validate(length(min = 1))]
    pub requesting_user_id: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_rate_limit() -> u32 {
    DEFAULT_RATE_LIMIT_PER_MINUTE
}

fn default_language() -> String {
    "en".to_string()
}

/// One recipient failure kept in the trailing error buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignError {
    pub recipient_id: String,
    pub reason: String,
}

/// Progressive status of a running campaign.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignProgress {
    pub campaign_id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    pub total_recipients: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Ring buffer of the last [`MAX_TRAILING_ERRORS`] recipient failures.
    pub recent_errors: VecDeque<CampaignError>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignProgress {
    fn new(campaign_id: Uuid, name: String, total_recipients: usize) -> Self {
        Self {
            campaign_id,
            name,
            status: CampaignStatus::Queued,
            total_recipients,
            processed: 0,
            succeeded: 0,
            failed: 0,
            recent_errors: VecDeque::with_capacity(MAX_TRAILING_ERRORS),
            started_at: None,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn percent_complete(&self) -> f64 {
        if self.total_recipients == 0 {
            return 100.0;
        }
        self.processed as f64 / self.total_recipients as f64 * 100.0
    }

    fn push_error(&mut self, err: CampaignError) {
        if self.recent_errors.len() == MAX_TRAILING_ERRORS {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(err);
    }
}

/// Immediate response to a launched campaign.
#[derive(Debug, Clone)]
pub struct CampaignReceipt {
    pub campaign_id: Uuid,
    pub total_recipients: usize,
    pub batch_count: usize,
    /// `ceil(total / rate_limit_per_minute)` minutes.
    pub estimated_duration_mins: u64,
    /// Sample rendering for the first recipient.
    pub preview: RenderedMessage,
}

/// Handle on the detached campaign task.
///
/// Dropping the handle does not stop the campaign; use
/// [`CampaignEngine::cancel_campaign`] for that.
#[derive(Debug)]
pub struct CampaignHandle {
    pub campaign_id: Uuid,
    /// Live progress snapshots, updated after every batch.
    pub progress: watch::Receiver<CampaignProgress>,
    join: JoinHandle<()>,
}

impl CampaignHandle {
    /// Wait until the campaign task has finished.
    pub async fn wait(&mut self) {
        let _ = (&mut self.join).await;
    }
}

struct CampaignSlot {
    progress: watch::Receiver<CampaignProgress>,
    cancel: watch::Sender<bool>,
}

enum BatchesEnd {
    Completed,
    Cancelled,
}

/// Engine fanning campaigns out to their recipients.
pub struct CampaignEngine<R, D, S>
where
    R: NotificationRepository + 'static,
    D: DeliveryPort + 'static,
    S: SegmentationPort + 'static,
{
    repository: Arc<R>,
    delivery: Arc<D>,
    segmentation: Arc<S>,
    templates: Arc<TemplateEngine>,
    campaigns: Arc<Mutex<HashMap<Uuid, CampaignSlot>>>,
}

impl<R, D, S> Clone for CampaignEngine<R, D, S>
where
    R: NotificationRepository + 'static,
    D: DeliveryPort + 'static,
    S: SegmentationPort + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            delivery: Arc::clone(&self.delivery),
            segmentation: Arc::clone(&self.segmentation),
            templates: Arc::clone(&self.templates),
            campaigns: Arc::clone(&self.campaigns),
        }
    }
}

impl<R, D, S> CampaignEngine<R, D, S>
where
    R: NotificationRepository + 'static,
    D: DeliveryPort + 'static,
    S: SegmentationPort + 'static,
{
    pub fn new(repository: R, delivery: D, segmentation: S, templates: TemplateEngine) -> Self {
        Self {
            repository: Arc::new(repository),
            delivery: Arc::new(delivery),
            segmentation: Arc::new(segmentation),
            templates: Arc::new(templates),
            campaigns: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Validate and register a campaign.
    ///
    /// Returns immediately with the receipt and a handle; recipients are
    /// processed by a detached background task.
    #[instrument(skip(self, request), fields(campaign = %request.name, event = %request.event))]
    pub async fn launch(
        &self,
        request: BulkCampaignRequest,
    ) -> NotificationResult<(CampaignReceipt, CampaignHandle)> {
        request
            .validate()
            .map_err(|e| NotificationError::Validation(e.to_string()))?;
        Self::validate_limits(&request)?;

        let recipients = self.resolve_recipients(&request).await?;
        if recipients.is_empty() {
            return Err(NotificationError::Validation(
                "Campaign resolved to zero recipients".to_string(),
            ));
        }

        // Fail fast before registering anything: one sample render surfaces
        // missing template variables with their exact names.
        let sample_vars = effective_variables(&request, &recipients[0]);
        let preview = self
            .templates
            .render(request.event, &sample_vars, &request.language)?;

        let campaign_id = Uuid::now_v7();
        let total_recipients = recipients.len();
        let batch_count = total_recipients.div_ceil(request.batch_size);
        let estimated_duration_mins =
            (total_recipients as u64).div_ceil(request.rate_limit_per_minute as u64);

        let progress = CampaignProgress::new(campaign_id, request.name.clone(), total_recipients);
        let (progress_tx, progress_rx) = watch::channel(progress);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        {
            let mut campaigns = self
                .campaigns
                .lock()
                .map_err(|_| NotificationError::Internal("Campaign registry poisoned".to_string()))?;
            campaigns.insert(
                campaign_id,
                CampaignSlot {
                    progress: progress_rx.clone(),
                    cancel: cancel_tx,
                },
            );
        }

        info!(
            campaign_id = %campaign_id,
            total_recipients,
            batch_count,
            batch_size = request.batch_size,
            rate_limit_per_minute = request.rate_limit_per_minute,
            "Campaign registered"
        );

        let join = tokio::spawn(Self::run_campaign(
            Arc::clone(&self.repository),
            Arc::clone(&self.delivery),
            Arc::clone(&self.templates),
            campaign_id,
            request,
            recipients,
            progress_tx,
            cancel_rx,
        ));

        Ok((
            CampaignReceipt {
                campaign_id,
                total_recipients,
                batch_count,
                estimated_duration_mins,
                preview,
            },
            CampaignHandle {
                campaign_id,
                progress: progress_rx,
                join,
            },
        ))
    }

    /// Request cooperative cancellation of a running campaign.
    ///
    /// Rejected once the campaign completed; repeating the cancellation of an
    /// already-cancelled campaign is a no-op.
    pub fn cancel_campaign(&self, campaign_id: Uuid) -> NotificationResult<()> {
        let campaigns = self
            .campaigns
            .lock()
            .map_err(|_| NotificationError::Internal("Campaign registry poisoned".to_string()))?;
        let slot = campaigns
            .get(&campaign_id)
            .ok_or(NotificationError::CampaignNotFound(campaign_id))?;

        match slot.progress.borrow().status {
            CampaignStatus::Completed => Err(NotificationError::CampaignCompleted(campaign_id)),
            CampaignStatus::Cancelled => Ok(()),
            _ => {
                // The receiver is gone once the task finished; nothing left
                // to stop in that case.
                let _ = slot.cancel.send(true);
                info!(campaign_id = %campaign_id, "Campaign cancellation requested");
                Ok(())
            }
        }
    }

    /// Latest progress snapshot of a campaign.
    pub fn progress(&self, campaign_id: Uuid) -> NotificationResult<CampaignProgress> {
        let campaigns = self
            .campaigns
            .lock()
            .map_err(|_| NotificationError::Internal("Campaign registry poisoned".to_string()))?;
        campaigns
            .get(&campaign_id)
            .map(|slot| slot.progress.borrow().clone())
            .ok_or(NotificationError::CampaignNotFound(campaign_id))
    }

    fn validate_limits(request: &BulkCampaignRequest) -> NotificationResult<()> {
        match (request.recipients.is_empty(), &request.segmentation) {
            (false, Some(_)) => {
                return Err(NotificationError::Validation(
                    "Explicit recipients and segmentation criteria are mutually exclusive"
                        .to_string(),
                ));
            }
            (true, None) => {
                return Err(NotificationError::Validation(
                    "Either explicit recipients or segmentation criteria are required".to_string(),
                ));
            }
            _ => {}
        }
        if request.recipients.len() > MAX_EXPLICIT_RECIPIENTS {
            return Err(NotificationError::Validation(format!(
                "Recipient list exceeds the maximum of {}",
                MAX_EXPLICIT_RECIPIENTS
            )));
        }
        if request.batch_size == 0 || request.batch_size > MAX_BATCH_SIZE {
            return Err(NotificationError::Validation(format!(
                "Batch size must be between 1 and {}",
                MAX_BATCH_SIZE
            )));
        }
        if request.rate_limit_per_minute == 0
            || request.rate_limit_per_minute > MAX_RATE_LIMIT_PER_MINUTE
        {
            return Err(NotificationError::Validation(format!(
                "Rate limit must be between 1 and {} per minute",
                MAX_RATE_LIMIT_PER_MINUTE
            )));
        }
        if let Some(when) = request.scheduled_for {
            let now = Utc::now();
            if when <= now {
                return Err(NotificationError::Validation(
                    "Scheduled date must be in the future".to_string(),
                ));
            }
            if when - now > ChronoDuration::days(MAX_SCHEDULE_AHEAD_DAYS) {
                return Err(NotificationError::Validation(
                    "Campaigns may be scheduled at most one year ahead".to_string(),
                ));
            }
        }
        Ok(())
    }

    async fn resolve_recipients(
        &self,
        request: &BulkCampaignRequest,
    ) -> NotificationResult<Vec<Recipient>> {
        if let Some(criteria) = &request.segmentation {
            if criteria.is_empty() {
                return Err(NotificationError::Validation(
                    "Segmentation criteria must set at least one filter".to_string(),
                ));
            }
            return self
                .segmentation
                .find_recipients(criteria, &request.requesting_user_id)
                .await;
        }
        Ok(request
            .recipients
            .iter()
            .map(|id| Recipient::new(id.clone()))
            .collect())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_campaign(
        repository: Arc<R>,
        delivery: Arc<D>,
        templates: Arc<TemplateEngine>,
        campaign_id: Uuid,
        request: BulkCampaignRequest,
        recipients: Vec<Recipient>,
        progress_tx: watch::Sender<CampaignProgress>,
        cancel_rx: watch::Receiver<bool>,
    ) {
        if let Some(when) = request.scheduled_for {
            let delay = (when - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            info!(
                campaign_id = %campaign_id,
                scheduled_for = %when,
                "Campaign deferred"
            );
            tokio::time::sleep(delay).await;
        }

        progress_tx.send_modify(|p| {
            p.status = CampaignStatus::Processing;
            p.started_at = Some(Utc::now());
            p.updated_at = Utc::now();
        });

        let outcome = Self::process_batches(
            &repository,
            &delivery,
            &templates,
            campaign_id,
            &request,
            &recipients,
            &progress_tx,
            &cancel_rx,
        )
        .await;

        progress_tx.send_modify(|p| {
            p.completed_at = Some(Utc::now());
            p.updated_at = Utc::now();
            match &outcome {
                Ok(BatchesEnd::Completed) => p.status = CampaignStatus::Completed,
                Ok(BatchesEnd::Cancelled) => p.status = CampaignStatus::Cancelled,
                Err(_) => p.status = CampaignStatus::Failed,
            }
        });

        match outcome {
            Ok(BatchesEnd::Completed) => {
                let snapshot = progress_tx.borrow().clone();
                info!(
                    campaign_id = %campaign_id,
                    processed = snapshot.processed,
                    succeeded = snapshot.succeeded,
                    failed = snapshot.failed,
                    "Campaign completed"
                );
            }
            Ok(BatchesEnd::Cancelled) => {
                info!(campaign_id = %campaign_id, "Campaign cancelled");
            }
            Err(e) => {
                error!(campaign_id = %campaign_id, error = %e, "Campaign failed");
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_batches(
        repository: &Arc<R>,
        delivery: &Arc<D>,
        templates: &Arc<TemplateEngine>,
        campaign_id: Uuid,
        request: &BulkCampaignRequest,
        recipients: &[Recipient],
        progress_tx: &watch::Sender<CampaignProgress>,
        cancel_rx: &watch::Receiver<bool>,
    ) -> NotificationResult<BatchesEnd> {
        let batch_count = recipients.len().div_ceil(request.batch_size);
        // (60 / rate) seconds per send, paid batch-wise between batches.
        let batch_pause = Duration::from_secs_f64(
            60.0 / request.rate_limit_per_minute as f64 * request.batch_size as f64,
        );

        for (index, batch) in recipients.chunks(request.batch_size).enumerate() {
            // has_changed errors when the registry holding the sender is
            // gone; that is an engine-level failure, not a recipient one.
            if cancel_rx.has_changed().is_err() {
                return Err(NotificationError::Internal(
                    "Campaign registry dropped while processing".to_string(),
                ));
            }
            if *cancel_rx.borrow() {
                return Ok(BatchesEnd::Cancelled);
            }
            if index > 0 {
                tokio::time::sleep(batch_pause).await;
            }

            let sends = batch.iter().map(|recipient| {
                Self::send_to_recipient(repository, delivery, templates, campaign_id, request, recipient)
            });
            let outcomes = futures::future::join_all(sends).await;

            progress_tx.send_modify(|p| {
                for outcome in outcomes {
                    p.processed += 1;
                    match outcome {
                        Ok(()) => p.succeeded += 1,
                        Err(err) => {
                            p.failed += 1;
                            p.push_error(err);
                        }
                    }
                }
                p.updated_at = Utc::now();
            });

            let snapshot = progress_tx.borrow().clone();
            info!(
                campaign_id = %campaign_id,
                batch = index + 1,
                batch_count,
                processed = snapshot.processed,
                succeeded = snapshot.succeeded,
                failed = snapshot.failed,
                percent = format!("{:.1}", snapshot.percent_complete()),
                "Campaign batch processed"
            );
        }

        Ok(BatchesEnd::Completed)
    }

    /// Send to one recipient, catching every failure individually.
    async fn send_to_recipient(
        repository: &Arc<R>,
        delivery: &Arc<D>,
        templates: &Arc<TemplateEngine>,
        campaign_id: Uuid,
        request: &BulkCampaignRequest,
        recipient: &Recipient,
    ) -> Result<(), CampaignError> {
        let fail = |reason: String| CampaignError {
            recipient_id: recipient.id.clone(),
            reason,
        };

        let variables = effective_variables(request, recipient);
        let rendered = templates
            .render(request.event, &variables, &request.language)
            .map_err(|e| fail(e.to_string()))?;

        let mut metadata = NotificationMetadata::new();
        metadata.set_campaign_id(campaign_id);
        metadata.set_template_id(request.event.to_string());

        let mut notification = Notification::create(CreateNotification {
            recipient_id: recipient.id.clone(),
            title: rendered.subject,
            content: rendered.body,
            channel: request.channel,
            priority: request.priority,
            scheduled_for: None,
            metadata,
        })
        .map_err(|e| fail(e.to_string()))?;

        repository
            .save(&notification)
            .await
            .map_err(|e| fail(e.to_string()))?;

        match delivery.send(&notification).await {
            Ok(_) => {
                if notification.mark_sent().is_ok() {
                    if let Err(e) = repository.update_status(&notification).await {
                        // The message is out; a stale status row must not
                        // count the recipient as failed.
                        warn!(
                            notification_id = %notification.id,
                            campaign_id = %campaign_id,
                            error = %e,
                            "Sent but failed to persist SENT status"
                        );
                    }
                }
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                if notification.mark_failed(reason.clone()).is_ok() {
                    if let Err(persist_err) = repository.update_status(&notification).await {
                        warn!(
                            notification_id = %notification.id,
                            campaign_id = %campaign_id,
                            error = %persist_err,
                            "Failed to persist FAILED status"
                        );
                    }
                }
                Err(fail(reason))
            }
        }
    }
}

/// Merge the variable layers handed to the template engine. Campaign-wide
/// defaults sit at the bottom, the recipient's known display name overrides
/// them, and explicit per-recipient overrides win over everything.
fn effective_variables(request: &BulkCampaignRequest, recipient: &Recipient) -> Value {
    let mut variables = request.variables.clone();
    if let Some(name) = &recipient.display_name {
        variables.insert(
            "recipient_name".to_string(),
            Value::String(name.clone()),
        );
    }
    variables.insert(
        "recipient_id".to_string(),
        Value::String(recipient.id.clone()),
    );
    if let Some(overrides) = request.per_recipient_variables.get(&recipient.id) {
        for (key, value) in overrides {
            variables.insert(key.clone(), value.clone());
        }
    }
    Value::Object(variables)
}

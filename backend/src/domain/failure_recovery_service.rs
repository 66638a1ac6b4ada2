//! Manual recovery: variant resets and the failed-job backstop.
//!
//! A reset covers `failed` variants and `generating` variants whose claim is
//! older than the staleness threshold, which is how work stranded by a killed
//! worker becomes retryable.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use mockable::Clock;
use tracing::{info, warn};

use super::error_mapping::{map_failed_job_error, map_order_error};
use super::ports::{
    FailedJobRepository, FailureRecoveryCommand, GenerationTrigger, OrderRepository,
    PaymentEventCommand, WebhookAck,
};
use super::{CompletedCheckout, Error, FailedJob, FailedJobId, OrderId, UserId, VariantId};

/// Claims older than this are treated as abandoned unless configured
/// otherwise.
pub const DEFAULT_STALE_AFTER: TimeDelta = TimeDelta::minutes(15);

/// Service implementing [`FailureRecoveryCommand`].
#[derive(Clone)]
pub struct FailureRecoveryService {
    orders: Arc<dyn OrderRepository>,
    failed_jobs: Arc<dyn FailedJobRepository>,
    payment_events: Arc<dyn PaymentEventCommand>,
    trigger: Arc<dyn GenerationTrigger>,
    clock: Arc<dyn Clock>,
    stale_after: TimeDelta,
}

impl FailureRecoveryService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        failed_jobs: Arc<dyn FailedJobRepository>,
        payment_events: Arc<dyn PaymentEventCommand>,
        trigger: Arc<dyn GenerationTrigger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders,
            failed_jobs,
            payment_events,
            trigger,
            clock,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Override the staleness threshold for `generating` variants.
    #[must_use]
    pub fn with_stale_after(mut self, stale_after: TimeDelta) -> Self {
        self.stale_after = stale_after;
        self
    }

    async fn resume(&self, order_id: OrderId) {
        if let Err(error) = self.trigger.trigger(order_id).await {
            warn!(%order_id, %error, "reset succeeded but generation was not triggered");
        }
    }

    async fn open_job(&self, id: FailedJobId) -> Result<FailedJob, Error> {
        let job = self
            .failed_jobs
            .find(id)
            .await
            .map_err(map_failed_job_error)?
            .ok_or_else(|| Error::not_found("failed job not found"))?;
        if !job.is_open() {
            return Err(Error::conflict("failed job is already resolved"));
        }
        Ok(job)
    }

    async fn close(&self, id: FailedJobId, notes: Option<String>) -> Result<(), Error> {
        let closed = self
            .failed_jobs
            .resolve(id, notes, self.clock.utc())
            .await
            .map_err(map_failed_job_error)?;
        if closed {
            info!(job_id = %id, "failed job resolved");
            Ok(())
        } else {
            Err(Error::conflict("failed job is already resolved"))
        }
    }
}

fn retry_notes(ack: WebhookAck) -> String {
    match ack {
        WebhookAck::Processed { order_id } => format!("retried: created order {order_id}"),
        WebhookAck::Duplicate { order_id } => {
            format!("retried: order {order_id} already existed, generation re-triggered")
        }
        WebhookAck::Ignored | WebhookAck::Dropped => "retried: nothing to do".to_owned(),
    }
}

#[async_trait]
impl FailureRecoveryCommand for FailureRecoveryService {
    async fn reset_order(&self, order_id: OrderId, user_id: UserId) -> Result<u32, Error> {
        let stale_before = self.clock.utc() - self.stale_after;
        let reset = self
            .orders
            .reset_order_variants(order_id, Some(user_id), stale_before)
            .await
            .map_err(map_order_error)?
            .ok_or_else(|| Error::not_found("order not found"))?;
        if reset > 0 {
            info!(%order_id, reset, "reset variants for retry");
            self.resume(order_id).await;
        }
        Ok(reset)
    }

    async fn reset_variant(&self, variant_id: VariantId) -> Result<u32, Error> {
        let stale_before = self.clock.utc() - self.stale_after;
        let (order_id, changed) = self
            .orders
            .reset_variant(variant_id, stale_before)
            .await
            .map_err(map_order_error)?
            .ok_or_else(|| Error::not_found("variant not found"))?;
        if changed {
            info!(%order_id, %variant_id, "reset variant for retry");
            self.resume(order_id).await;
        }
        Ok(u32::from(changed))
    }

    async fn list_failed_jobs(&self) -> Result<Vec<FailedJob>, Error> {
        self.failed_jobs
            .list_open()
            .await
            .map_err(map_failed_job_error)
    }

    async fn resolve_failed_job(
        &self,
        id: FailedJobId,
        notes: Option<String>,
    ) -> Result<(), Error> {
        self.open_job(id).await?;
        self.close(id, notes).await
    }

    async fn retry_failed_job(&self, id: FailedJobId) -> Result<WebhookAck, Error> {
        let job = self.open_job(id).await?;
        let checkout: CompletedCheckout = serde_json::from_value(job.event_data)
            .map_err(|err| Error::invalid_request(format!("failed job cannot be replayed: {err}")))?;
        let ack = self.payment_events.replay(&checkout).await?;
        self.close(id, Some(retry_notes(ack))).await?;
        Ok(ack)
    }
}

#[cfg(test)]
#[path = "failure_recovery_service_tests.rs"]
mod tests;

//! Driving port for retrying failed work.

use async_trait::async_trait;

use crate::domain::{Error, FailedJob, FailedJobId, OrderId, UserId, VariantId};

use super::WebhookAck;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FailureRecoveryCommand: Send + Sync {
    /// Reset the failed and stale variants of an owned order and resume
    /// generation. Returns how many variants were reset.
    async fn reset_order(&self, order_id: OrderId, user_id: UserId) -> Result<u32, Error>;

    /// Administrative reset of a single variant.
    async fn reset_variant(&self, variant_id: VariantId) -> Result<u32, Error>;

    async fn list_failed_jobs(&self) -> Result<Vec<FailedJob>, Error>;

    async fn resolve_failed_job(&self, id: FailedJobId, notes: Option<String>)
    -> Result<(), Error>;

    /// Replay the checkout captured in an open job, then close it.
    async fn retry_failed_job(&self, id: FailedJobId) -> Result<WebhookAck, Error>;
}

//! Driven port for the failed-job backstop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{FailedJob, FailedJobId, NewFailedJob};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by failed-job repository adapters.
    pub enum FailedJobRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "failed job repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "failed job repository query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FailedJobRepository: Send + Sync {
    async fn record(&self, job: &NewFailedJob) -> Result<FailedJobId, FailedJobRepositoryError>;

    /// Open jobs, most recent first.
    async fn list_open(&self) -> Result<Vec<FailedJob>, FailedJobRepositoryError>;

    async fn find(&self, id: FailedJobId) -> Result<Option<FailedJob>, FailedJobRepositoryError>;

    /// Close an open job. Returns `false` when it was already closed or
    /// does not exist.
    async fn resolve(
        &self,
        id: FailedJobId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool, FailedJobRepositoryError>;
}

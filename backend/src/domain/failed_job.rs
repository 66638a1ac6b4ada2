//! Durable records of failures outside the per-variant failure path.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::wire_enum::wire_enum;
use super::FailedJobId;

wire_enum! {
    /// Where the failure escaped from.
    pub enum FailedJobType / ParseFailedJobTypeError ("failed job type") {
        /// A completed checkout whose metadata could not be decoded.
        WebhookMetadata => "webhook_metadata",
        /// A completed checkout that failed while recording the purchase.
        WebhookProcessing => "webhook_processing",
    }
}

/// A failure to be inspected, replayed or closed by an administrator.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedJob {
    pub id: FailedJobId,
    pub job_type: FailedJobType,
    /// Original event payload, kept for replay.
    pub event_data: Value,
    pub error_message: String,
    pub failed_at: DateTime<Utc>,
    /// `None` while the job is open.
    pub resolved_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl FailedJob {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// A failure about to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFailedJob {
    pub job_type: FailedJobType,
    pub event_data: Value,
    pub error_message: String,
}

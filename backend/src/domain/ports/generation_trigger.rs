//! Driven port scheduling the next generation step for an order.
//!
//! Implementations must return without waiting for the step to run.

use async_trait::async_trait;

use crate::domain::OrderId;

use super::define_port_error;

/// Header carrying the shared secret that authenticates a chain link
/// against the internal generate endpoint.
pub const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";

define_port_error! {
    /// Errors surfaced while scheduling a generation step.
    pub enum JobDispatchError {
        /// Dispatch infrastructure is unavailable.
        Unavailable { message: String } => "generation trigger is unavailable: {message}",
        /// The step could not be accepted.
        Rejected { message: String } => "generation step was rejected: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationTrigger: Send + Sync {
    async fn trigger(&self, order_id: OrderId) -> Result<(), JobDispatchError>;
}

//! Driving port for payment-processor webhooks.

use async_trait::async_trait;

use crate::domain::{CompletedCheckout, Error, OrderId};

/// How a webhook delivery was handled. Every variant is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAck {
    /// A new order was recorded.
    Processed { order_id: OrderId },
    /// The session had already been recorded.
    Duplicate { order_id: OrderId },
    /// Not a completed checkout.
    Ignored,
    /// Unusable metadata; recorded as a failed job, no order created.
    Dropped,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentEventCommand: Send + Sync {
    /// Verify and process one delivery.
    async fn handle_event(&self, payload: &[u8], signature: &str) -> Result<WebhookAck, Error>;

    /// Process a completed checkout captured in a failed job. Generation is
    /// triggered even when the order already exists.
    async fn replay(&self, checkout: &CompletedCheckout) -> Result<WebhookAck, Error>;
}

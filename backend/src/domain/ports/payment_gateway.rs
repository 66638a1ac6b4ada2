//! Driven port for the hosted-checkout payment processor.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::PaymentEvent;

use super::define_port_error;

define_port_error! {
    /// Errors raised by payment processor adapters.
    pub enum PaymentGatewayError {
        /// The processor could not be reached or timed out.
        Transport { message: String } => "payment processor transport failed: {message}",
        /// The processor rejected the request.
        Rejected { status: u16, message: String } => "payment processor rejected request ({status}): {message}",
        /// The processor returned a body we could not understand.
        Decode { message: String } => "payment processor response was malformed: {message}",
        /// A webhook signature header was missing, malformed, stale or wrong.
        InvalidSignature { message: String } => "webhook signature rejected: {message}",
    }
}

/// A hosted checkout session to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub product_name: String,
    pub amount_minor: i64,
    pub currency: String,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

/// A created session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentGatewayError>;

    /// Verify `signature` over the raw `payload` and parse the event.
    fn verify_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentEvent, PaymentGatewayError>;
}

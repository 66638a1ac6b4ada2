//! Verified payment-processor events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Event type string the processor uses for a paid checkout.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// An event whose signature has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    pub id: String,
    pub kind: PaymentEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEventKind {
    CheckoutCompleted(CompletedCheckout),
    /// Any other event type, acknowledged and ignored.
    Other(String),
}

/// The parts of a completed checkout session the workflow reads.
///
/// Serialised verbatim into failed-job records so an administrator can
/// replay it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedCheckout {
    pub session_id: String,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

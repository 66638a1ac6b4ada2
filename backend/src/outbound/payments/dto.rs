//! Wire shapes of the payment processor's events and session responses.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::payment_event::CHECKOUT_COMPLETED;
use crate::domain::ports::PaymentGatewayError;
use crate::domain::{CompletedCheckout, PaymentEvent, PaymentEventKind};

#[derive(Debug, Deserialize)]
struct EventDto {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EventDataDto,
}

#[derive(Debug, Deserialize)]
struct EventDataDto {
    object: Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObjectDto {
    id: String,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    customer_details: Option<CustomerDetailsDto>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetailsDto {
    #[serde(default)]
    email: Option<String>,
}

impl From<CheckoutSessionObjectDto> for CompletedCheckout {
    fn from(dto: CheckoutSessionObjectDto) -> Self {
        let customer_email = dto
            .customer_email
            .or_else(|| dto.customer_details.and_then(|details| details.email));
        Self {
            session_id: dto.id,
            amount_total: dto.amount_total,
            currency: dto.currency.map(|currency| currency.to_lowercase()),
            customer_email,
            metadata: dto.metadata,
        }
    }
}

/// Decode a verified webhook body.
///
/// Only `checkout.session.completed` objects are decoded further; every
/// other event type is reported as [`PaymentEventKind::Other`].
///
/// # Errors
///
/// Returns [`PaymentGatewayError::Decode`] when the envelope, or a completed
/// session object, does not match the expected shape.
pub fn parse_event(payload: &[u8]) -> Result<PaymentEvent, PaymentGatewayError> {
    let event: EventDto = serde_json::from_slice(payload)
        .map_err(|error| PaymentGatewayError::decode(format!("invalid event envelope: {error}")))?;
    let kind = if event.event_type == CHECKOUT_COMPLETED {
        let session: CheckoutSessionObjectDto = serde_json::from_value(event.data.object)
            .map_err(|error| {
                PaymentGatewayError::decode(format!("invalid checkout session object: {error}"))
            })?;
        PaymentEventKind::CheckoutCompleted(session.into())
    } else {
        PaymentEventKind::Other(event.event_type)
    };
    Ok(PaymentEvent { id: event.id, kind })
}

/// Response to a session creation request.
#[derive(Debug, Deserialize)]
pub(super) struct CreatedSessionDto {
    pub(super) id: String,
    #[serde(default)]
    pub(super) url: Option<String>,
}

/// Error envelope returned on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorEnvelopeDto {
    pub(super) error: ErrorDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorDto {
    #[serde(default)]
    pub(super) message: Option<String>,
}

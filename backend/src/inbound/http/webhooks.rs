//! Payment processor webhook receiver.
//!
//! The body is read as raw bytes because the signature covers the exact
//! payload. Every verified delivery is acknowledged, including duplicates
//! and events that were dropped into the failed-job table, so the processor
//! stops redelivering them.

use actix_web::{HttpRequest, post, web};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::domain::Error;
use crate::domain::ports::WebhookAck;
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

/// Header carrying the processor's `t=...,v1=...` signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Acknowledgement body.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct WebhookReceipt {
    pub received: bool,
}

fn log_ack(ack: WebhookAck) {
    match ack {
        WebhookAck::Processed { order_id } => info!(%order_id, "webhook recorded an order"),
        WebhookAck::Duplicate { order_id } => info!(%order_id, "webhook redelivery acknowledged"),
        WebhookAck::Ignored => info!("webhook event ignored"),
        WebhookAck::Dropped => info!("webhook event dropped into failed jobs"),
    }
}

/// Receive a payment processor event.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payments",
    request_body(content = String, content_type = "application/json", description = "Raw event payload"),
    params(("stripe-signature" = String, Header, description = "Processor signature")),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookReceipt),
        (status = 400, description = "Missing or invalid signature", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["webhooks"],
    operation_id = "receivePaymentWebhook",
    security([])
)]
#[post("/webhooks/payments")]
pub async fn payment_webhook(
    state: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Bytes,
) -> ApiResult<web::Json<WebhookReceipt>> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| Error::invalid_request("missing webhook signature"))?;
    let ack = state.payments.handle_event(&body, signature).await?;
    log_ack(ack);
    Ok(web::Json(WebhookReceipt { received: true }))
}

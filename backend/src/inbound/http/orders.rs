//! Order projection, selection, playback and recovery for the owner.
//!
//! ```text
//! GET  /api/v1/orders/{id}/status
//! POST /api/v1/orders/{id}/variants/{variant_id}/select
//! GET  /api/v1/orders/{id}/variants/{variant_id}/audio
//! POST /api/v1/orders/{id}/reset
//! ```
//!
//! Orders belonging to someone else answer exactly like missing orders.

use actix_web::{get, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ports::{OrderStatusView, SelectionReceipt, VariantStatusView};
use crate::domain::{OrderId, VariantId};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::AuthenticatedUser;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, parse_id};

const ORDER_ID: FieldName = FieldName::new("orderId");
const VARIANT_ID: FieldName = FieldName::new("variantId");

fn order_and_variant(path: &(String, String)) -> ApiResult<(OrderId, VariantId)> {
    Ok((parse_id(&path.0, ORDER_ID)?, parse_id(&path.1, VARIANT_ID)?))
}

/// One variant in the status projection.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariantStatusBody {
    #[schema(value_type = String, format = Uuid)]
    pub id: VariantId,
    #[schema(example = 1)]
    pub variant_number: u8,
    #[schema(example = "complete")]
    pub generation_status: String,
    pub storage_path: String,
    pub selected: bool,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<VariantStatusView> for VariantStatusBody {
    fn from(value: VariantStatusView) -> Self {
        Self {
            id: value.id,
            variant_number: value.variant_number,
            generation_status: value.generation_status.as_str().to_owned(),
            storage_path: value.storage_path,
            selected: value.selected,
            completed_at: value.completed_at,
        }
    }
}

/// Pollable order projection.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusBody {
    #[schema(value_type = String, format = Uuid)]
    pub order_id: OrderId,
    #[schema(example = "generating")]
    pub order_status: String,
    #[schema(example = 0)]
    pub tweak_count: u8,
    pub variants: Vec<VariantStatusBody>,
}

impl From<OrderStatusView> for OrderStatusBody {
    fn from(value: OrderStatusView) -> Self {
        Self {
            order_id: value.order_id,
            order_status: value.order_status.as_str().to_owned(),
            tweak_count: value.tweak_count,
            variants: value.variants.into_iter().map(Into::into).collect(),
        }
    }
}

/// Sharing details returned right after a selection.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectionBody {
    #[schema(value_type = String, format = Uuid)]
    pub variant_id: VariantId,
    pub share_token: String,
    pub recipient_name: String,
    pub author_name: String,
    #[schema(example = "birthday")]
    pub occasion: String,
}

impl From<SelectionReceipt> for SelectionBody {
    fn from(value: SelectionReceipt) -> Self {
        Self {
            variant_id: value.variant_id,
            share_token: value.share_token.as_str().to_owned(),
            recipient_name: value.recipient_name,
            author_name: value.author_name,
            occasion: value.occasion.as_str().to_owned(),
        }
    }
}

/// Time-limited playback link.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AudioUrlBody {
    pub url: String,
}

/// Number of variants put back to `pending`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetBody {
    #[schema(example = 1)]
    pub reset_count: u32,
}

/// Poll an order and its variants.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/status",
    params(("id" = String, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "Order projection", body = OrderStatusBody),
        (status = 400, description = "Invalid order id", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Order not found", body = ErrorSchema)
    ),
    tags = ["orders"],
    operation_id = "getOrderStatus",
    security(("BearerToken" = []))
)]
#[get("/orders/{id}/status")]
pub async fn order_status(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    path: web::Path<String>,
) -> ApiResult<web::Json<OrderStatusBody>> {
    let order_id: OrderId = parse_id(&path, ORDER_ID)?;
    let view = state.status.order_status(order_id, caller.user().id()).await?;
    Ok(web::Json(view.into()))
}

/// Choose the favourite variant of an order.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/variants/{variant_id}/select",
    params(
        ("id" = String, Path, description = "Order identifier"),
        ("variant_id" = String, Path, description = "Variant identifier")
    ),
    responses(
        (status = 200, description = "Variant selected", body = SelectionBody),
        (status = 400, description = "Invalid identifier", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Variant not found", body = ErrorSchema),
        (status = 409, description = "Variant not complete", body = ErrorSchema)
    ),
    tags = ["orders"],
    operation_id = "selectVariant",
    security(("BearerToken" = []))
)]
#[post("/orders/{id}/variants/{variant_id}/select")]
pub async fn select_variant(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    path: web::Path<(String, String)>,
) -> ApiResult<web::Json<SelectionBody>> {
    let (order_id, variant_id) = order_and_variant(&path)?;
    let receipt = state
        .selection
        .select_variant(order_id, variant_id, caller.user().id())
        .await?;
    Ok(web::Json(receipt.into()))
}

/// Signed playback URL for a completed variant.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/variants/{variant_id}/audio",
    params(
        ("id" = String, Path, description = "Order identifier"),
        ("variant_id" = String, Path, description = "Variant identifier")
    ),
    responses(
        (status = 200, description = "Signed URL", body = AudioUrlBody),
        (status = 400, description = "Invalid identifier", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Variant not found", body = ErrorSchema),
        (status = 409, description = "Variant not complete", body = ErrorSchema)
    ),
    tags = ["orders"],
    operation_id = "getVariantAudio",
    security(("BearerToken" = []))
)]
#[get("/orders/{id}/variants/{variant_id}/audio")]
pub async fn variant_audio(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    path: web::Path<(String, String)>,
) -> ApiResult<web::Json<AudioUrlBody>> {
    let (order_id, variant_id) = order_and_variant(&path)?;
    let url = state
        .status
        .variant_audio_url(order_id, variant_id, caller.user().id())
        .await?;
    Ok(web::Json(AudioUrlBody { url }))
}

/// Put failed (and stale) variants back in the queue and resume generation.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/reset",
    params(("id" = String, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "Variants reset", body = ResetBody),
        (status = 400, description = "Invalid order id", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Order not found", body = ErrorSchema)
    ),
    tags = ["orders"],
    operation_id = "resetOrder",
    security(("BearerToken" = []))
)]
#[post("/orders/{id}/reset")]
pub async fn reset_order(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    path: web::Path<String>,
) -> ApiResult<web::Json<ResetBody>> {
    let order_id: OrderId = parse_id(&path, ORDER_ID)?;
    let reset_count = state.recovery.reset_order(order_id, caller.user().id()).await?;
    Ok(web::Json(ResetBody { reset_count }))
}

#[cfg(test)]
#[path = "orders_tests.rs"]
mod tests;

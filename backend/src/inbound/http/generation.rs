//! Generation step endpoints.
//!
//! ```text
//! POST /api/v1/internal/generate  x-internal-secret: ...  {"orderId":"..."}
//! POST /api/v1/orders/{id}/generate
//! ```
//!
//! The internal route is the link of the generation chain: each call renders
//! at most one variant and schedules the next call while variants remain.
//! The user route runs the same step for an order the caller owns, which is
//! how a generation page resumes a chain that stopped.

use actix_web::{post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{OrderId, VariantId};
use crate::domain::ports::GenerationOutcome;
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::{AuthenticatedUser, InternalCaller};
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, parse_id, require_id};

const ORDER_ID: FieldName = FieldName::new("orderId");

/// Outcome token when a variant was rendered, successfully or not.
pub const GENERATED: &str = "generated";
/// Outcome token when nothing was left to claim.
pub const NO_PENDING_VARIANTS: &str = "no_pending_variants";

/// Body of `POST /api/v1/internal/generate`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InternalGenerateRequest {
    #[serde(default)]
    #[schema(format = Uuid)]
    pub order_id: Option<String>,
}

/// One generation step.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    /// `generated` or `no_pending_variants`.
    #[schema(example = "generated")]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = Uuid)]
    pub variant_id: Option<VariantId>,
    /// `complete` or `failed` for the variant just rendered.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "complete")]
    pub variant_status: Option<String>,
    /// Variants still pending after this step.
    #[schema(example = 2)]
    pub remaining: u32,
}

impl From<GenerationOutcome> for GenerationResponse {
    fn from(value: GenerationOutcome) -> Self {
        match value {
            GenerationOutcome::Generated {
                variant_id,
                variant_status,
                remaining,
            } => Self {
                status: GENERATED.to_owned(),
                variant_id: Some(variant_id),
                variant_status: Some(variant_status.as_str().to_owned()),
                remaining,
            },
            GenerationOutcome::NoPendingVariants { remaining } => Self {
                status: NO_PENDING_VARIANTS.to_owned(),
                variant_id: None,
                variant_status: None,
                remaining,
            },
        }
    }
}

/// Advance generation for an order (chain link).
///
/// The body is parsed only after the secret has been checked, so an
/// unauthenticated caller learns nothing about the expected shape.
#[utoipa::path(
    post,
    path = "/api/v1/internal/generate",
    request_body = InternalGenerateRequest,
    params(("x-internal-secret" = String, Header, description = "Shared internal secret")),
    responses(
        (status = 200, description = "Step finished", body = GenerationResponse),
        (status = 400, description = "Missing or invalid orderId", body = ErrorSchema),
        (status = 401, description = "Missing or wrong secret", body = ErrorSchema),
        (status = 404, description = "Order not found", body = ErrorSchema)
    ),
    tags = ["generation"],
    operation_id = "advanceGenerationInternal",
    security([])
)]
#[post("/internal/generate")]
pub async fn internal_generate(
    _caller: InternalCaller,
    state: web::Data<HttpState>,
    body: web::Bytes,
) -> ApiResult<web::Json<GenerationResponse>> {
    let request: InternalGenerateRequest = serde_json::from_slice(&body).unwrap_or_default();
    let order_id: OrderId = require_id(request.order_id.as_deref(), ORDER_ID)?;
    let outcome = state.generation.advance(order_id).await?;
    Ok(web::Json(outcome.into()))
}

/// Advance generation for one of the caller's orders.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/generate",
    params(("id" = String, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "Step finished", body = GenerationResponse),
        (status = 400, description = "Invalid order id", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Order not found", body = ErrorSchema)
    ),
    tags = ["generation"],
    operation_id = "advanceGeneration",
    security(("BearerToken" = []))
)]
#[post("/orders/{id}/generate")]
pub async fn generate_order(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    path: web::Path<String>,
) -> ApiResult<web::Json<GenerationResponse>> {
    let order_id: OrderId = parse_id(&path, ORDER_ID)?;
    let outcome = state
        .generation
        .advance_owned(order_id, caller.user().id())
        .await?;
    Ok(web::Json(outcome.into()))
}

#[cfg(test)]
#[path = "generation_tests.rs"]
mod tests;

//! Purchase endpoints.
//!
//! ```text
//! POST /api/v1/checkout          {"customizationId":"..."}
//! POST /api/v1/checkout/bundle   {"tierId":"bundle-3"}
//! POST /api/v1/checkout/tweak    {"orderId":"...","thingsToAvoid":"..."}
//! POST /api/v1/checkout/upsell   {"orderId":"..."}
//! POST /api/v1/orders/{id}/tweak {"specialMemories":"..."}
//! ```
//!
//! Domain errors from the checkout service are user-safe and pass through
//! unchanged.

use actix_web::{post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ports::CheckoutResult;
use crate::domain::{CustomizationId, Error, OrderId};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::AuthenticatedUser;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, parse_amendment, parse_id, require_id};

const CUSTOMIZATION_ID: FieldName = FieldName::new("customizationId");
const ORDER_ID: FieldName = FieldName::new("orderId");

/// Request body for `POST /api/v1/checkout`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[schema(format = Uuid)]
    pub customization_id: Option<String>,
}

/// Either a hosted payment page or, when a bundle credit paid for the
/// order, the generation page to go to next.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "https://checkout.example.com/pay/cs_123")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = Uuid)]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl From<CheckoutResult> for CheckoutResponse {
    fn from(value: CheckoutResult) -> Self {
        match value {
            CheckoutResult::Payment { url } => Self {
                url: Some(url),
                order_id: None,
                redirect: None,
            },
            CheckoutResult::Redeemed { order_id, redirect } => Self {
                url: None,
                order_id: Some(order_id),
                redirect: Some(redirect),
            },
        }
    }
}

/// Hosted payment page.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CheckoutUrlResponse {
    pub url: String,
}

/// Request body for `POST /api/v1/checkout/bundle`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BundleCheckoutRequest {
    #[schema(example = "bundle-3")]
    pub tier_id: String,
}

/// Free-text fields a tweak may change.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TweakFields {
    #[serde(default)]
    pub special_memories: Option<String>,
    #[serde(default)]
    pub things_to_avoid: Option<String>,
    #[serde(default)]
    pub pronunciation: Option<String>,
}

/// Request body for `POST /api/v1/checkout/tweak`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TweakCheckoutRequest {
    #[schema(format = Uuid)]
    pub order_id: Option<String>,
    #[serde(flatten)]
    pub fields: TweakFields,
}

/// Request body for `POST /api/v1/checkout/upsell`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsellCheckoutRequest {
    #[schema(format = Uuid)]
    pub order_id: Option<String>,
}

/// The re-render order created by the free tweak.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FreeTweakResponse {
    #[schema(value_type = String, format = Uuid)]
    pub order_id: OrderId,
    pub redirect: String,
}

/// Buy a song for one of the caller's briefs.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Payment page, or generation redirect when a credit was used", body = CheckoutResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Customization not found", body = ErrorSchema),
        (status = 503, description = "Payment processor unavailable", body = ErrorSchema)
    ),
    tags = ["checkout"],
    operation_id = "createCheckout",
    security(("BearerToken" = []))
)]
#[post("/checkout")]
pub async fn create_checkout(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    payload: web::Json<CheckoutRequest>,
) -> ApiResult<web::Json<CheckoutResponse>> {
    let customization_id: CustomizationId =
        require_id(payload.customization_id.as_deref(), CUSTOMIZATION_ID)?;
    let result = state
        .checkout
        .create_checkout(caller.user(), customization_id)
        .await?;
    Ok(web::Json(result.into()))
}

/// Buy a pack of song credits.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/bundle",
    request_body = BundleCheckoutRequest,
    responses(
        (status = 200, description = "Payment page", body = CheckoutUrlResponse),
        (status = 400, description = "Unknown tier", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 503, description = "Payment processor unavailable", body = ErrorSchema)
    ),
    tags = ["checkout"],
    operation_id = "createBundleCheckout",
    security(("BearerToken" = []))
)]
#[post("/checkout/bundle")]
pub async fn create_bundle_checkout(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    payload: web::Json<BundleCheckoutRequest>,
) -> ApiResult<web::Json<CheckoutUrlResponse>> {
    let tier_id = payload.tier_id.trim();
    if tier_id.is_empty() {
        return Err(Error::invalid_request("tierId must not be empty"));
    }
    let checkout = state
        .checkout
        .create_bundle_checkout(caller.user(), tier_id)
        .await?;
    Ok(web::Json(CheckoutUrlResponse { url: checkout.url }))
}

/// Pay for the second tweak of an order.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/tweak",
    request_body = TweakCheckoutRequest,
    responses(
        (status = 200, description = "Payment page", body = CheckoutUrlResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Order not found", body = ErrorSchema),
        (status = 409, description = "Free tweak not used yet", body = ErrorSchema)
    ),
    tags = ["checkout"],
    operation_id = "createTweakCheckout",
    security(("BearerToken" = []))
)]
#[post("/checkout/tweak")]
pub async fn create_tweak_checkout(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    payload: web::Json<TweakCheckoutRequest>,
) -> ApiResult<web::Json<CheckoutUrlResponse>> {
    let TweakCheckoutRequest { order_id, fields } = payload.into_inner();
    let order_id: OrderId = require_id(order_id.as_deref(), ORDER_ID)?;
    let amendment = parse_amendment(
        fields.special_memories,
        fields.things_to_avoid,
        fields.pronunciation,
    )?;
    let checkout = state
        .checkout
        .create_tweak_checkout(caller.user(), order_id, amendment)
        .await?;
    Ok(web::Json(CheckoutUrlResponse { url: checkout.url }))
}

/// Pay for a fourth variant of an order.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/upsell",
    request_body = UpsellCheckoutRequest,
    responses(
        (status = 200, description = "Payment page", body = CheckoutUrlResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Order not found", body = ErrorSchema),
        (status = 409, description = "Order already has four variants", body = ErrorSchema)
    ),
    tags = ["checkout"],
    operation_id = "createUpsellCheckout",
    security(("BearerToken" = []))
)]
#[post("/checkout/upsell")]
pub async fn create_upsell_checkout(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    payload: web::Json<UpsellCheckoutRequest>,
) -> ApiResult<web::Json<CheckoutUrlResponse>> {
    let order_id: OrderId = require_id(payload.order_id.as_deref(), ORDER_ID)?;
    let checkout = state
        .checkout
        .create_upsell_checkout(caller.user(), order_id)
        .await?;
    Ok(web::Json(CheckoutUrlResponse { url: checkout.url }))
}

/// Use the free first tweak of an order.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/tweak",
    params(("id" = String, Path, description = "Order identifier")),
    request_body = TweakFields,
    responses(
        (status = 200, description = "Re-render order created", body = FreeTweakResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Order not found", body = ErrorSchema),
        (status = 409, description = "Free tweak already used", body = ErrorSchema)
    ),
    tags = ["checkout"],
    operation_id = "applyFreeTweak",
    security(("BearerToken" = []))
)]
#[post("/orders/{id}/tweak")]
pub async fn apply_free_tweak(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    path: web::Path<String>,
    payload: web::Json<TweakFields>,
) -> ApiResult<web::Json<FreeTweakResponse>> {
    let order_id: OrderId = parse_id(&path, ORDER_ID)?;
    let TweakFields {
        special_memories,
        things_to_avoid,
        pronunciation,
    } = payload.into_inner();
    let amendment = parse_amendment(special_memories, things_to_avoid, pronunciation)?;
    let receipt = state
        .checkout
        .apply_free_tweak(caller.user(), order_id, amendment)
        .await?;
    Ok(web::Json(FreeTweakResponse {
        order_id: receipt.order_id,
        redirect: receipt.redirect,
    }))
}

#[cfg(test)]
#[path = "checkout_tests.rs"]
mod tests;

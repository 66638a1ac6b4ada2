//! Bundle credit balance.
//!
//! ```text
//! GET /api/v1/entitlements
//! ```

use actix_web::{get, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::AuthenticatedUser;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

/// Credits remaining across the caller's bundles.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct EntitlementsResponse {
    #[schema(example = 2)]
    pub balance: u32,
}

/// Report how many prepaid songs the caller has left.
#[utoipa::path(
    get,
    path = "/api/v1/entitlements",
    responses(
        (status = 200, description = "Credit balance", body = EntitlementsResponse),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["checkout"],
    operation_id = "getEntitlements",
    security(("BearerToken" = []))
)]
#[get("/entitlements")]
pub async fn get_entitlements(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
) -> ApiResult<web::Json<EntitlementsResponse>> {
    let balance = state.entitlements.balance(caller.user().id()).await?;
    Ok(web::Json(EntitlementsResponse { balance }))
}

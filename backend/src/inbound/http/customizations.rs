//! Song brief intake.
//!
//! ```text
//! POST /api/v1/customizations {"recipientName":"Sam","authorName":"Alex",...}
//! ```

use actix_web::{HttpResponse, post, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Customization, CustomizationDraft, CustomizationId};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::AuthenticatedUser;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

/// Request body for `POST /api/v1/customizations`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomizationRequest {
    #[schema(example = "Sam")]
    pub recipient_name: String,
    #[schema(example = "Alex")]
    pub author_name: String,
    #[schema(example = "birthday")]
    pub occasion: String,
    /// One of 60, 90 or 120.
    #[schema(example = 90)]
    pub length_seconds: u32,
    #[schema(example = json!(["happy", "upbeat"]))]
    pub moods: Vec<String>,
    #[schema(example = "pop")]
    pub genre: String,
    #[serde(default)]
    pub special_memories: Option<String>,
    #[serde(default)]
    pub things_to_avoid: Option<String>,
    #[serde(default)]
    pub pronunciation: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = Date, example = "2024-06-01")]
    pub occasion_date: Option<NaiveDate>,
}

impl From<CreateCustomizationRequest> for CustomizationDraft {
    fn from(value: CreateCustomizationRequest) -> Self {
        Self {
            recipient_name: value.recipient_name,
            author_name: value.author_name,
            occasion: value.occasion,
            length_seconds: value.length_seconds,
            moods: value.moods,
            genre: value.genre,
            special_memories: value.special_memories,
            things_to_avoid: value.things_to_avoid,
            pronunciation: value.pronunciation,
            occasion_date: value.occasion_date,
        }
    }
}

/// A stored brief as returned to its owner.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationResponse {
    #[schema(value_type = String, format = Uuid)]
    pub id: CustomizationId,
    pub recipient_name: String,
    pub author_name: String,
    pub occasion: String,
    pub length_seconds: u32,
    pub moods: Vec<String>,
    pub genre: String,
    pub special_memories: Option<String>,
    pub things_to_avoid: Option<String>,
    pub pronunciation: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    pub occasion_date: Option<NaiveDate>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<Utc>,
}

impl From<Customization> for CustomizationResponse {
    fn from(value: Customization) -> Self {
        let brief = value.brief;
        Self {
            id: value.id,
            recipient_name: brief.recipient_name,
            author_name: brief.author_name,
            occasion: brief.occasion.as_str().to_owned(),
            length_seconds: brief.length.seconds(),
            moods: brief.moods.iter().map(|mood| mood.as_str().to_owned()).collect(),
            genre: brief.genre.as_str().to_owned(),
            special_memories: brief.special_memories,
            things_to_avoid: brief.things_to_avoid,
            pronunciation: brief.pronunciation,
            occasion_date: brief.occasion_date,
            created_at: value.created_at,
        }
    }
}

/// Store a song brief for the caller.
#[utoipa::path(
    post,
    path = "/api/v1/customizations",
    request_body = CreateCustomizationRequest,
    responses(
        (status = 201, description = "Brief stored", body = CustomizationResponse),
        (status = 400, description = "Invalid brief", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["customizations"],
    operation_id = "createCustomization",
    security(("BearerToken" = []))
)]
#[post("/customizations")]
pub async fn create_customization(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    payload: web::Json<CreateCustomizationRequest>,
) -> ApiResult<HttpResponse> {
    let customization = state
        .customizations
        .create_customization(caller.user(), payload.into_inner().into())
        .await?;
    Ok(HttpResponse::Created().json(CustomizationResponse::from(customization)))
}

#[cfg(test)]
#[path = "customizations_tests.rs"]
mod tests;

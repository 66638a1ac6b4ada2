//! Operator endpoints for failed work.
//!
//! ```text
//! GET  /api/v1/admin/failed-jobs
//! POST /api/v1/admin/failed-jobs/{id}/resolve  {"notes":"refunded"}
//! POST /api/v1/admin/failed-jobs/{id}/retry
//! POST /api/v1/admin/variants/{id}/reset
//! ```
//!
//! Every route requires [`AdminUser`]; other callers get `404`.

use actix_web::{HttpResponse, get, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;

use crate::domain::ports::WebhookAck;
use crate::domain::{FailedJob, FailedJobId, OrderId, VariantId};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::AdminUser;
use crate::inbound::http::orders::ResetBody;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, parse_id};

const JOB_ID: FieldName = FieldName::new("jobId");
const VARIANT_ID: FieldName = FieldName::new("variantId");

/// A failed job as shown to operators.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailedJobBody {
    #[schema(value_type = String, format = Uuid)]
    pub id: FailedJobId,
    #[schema(example = "webhook_processing")]
    pub job_type: String,
    #[schema(value_type = Object)]
    pub event_data: Value,
    pub error_message: String,
    #[schema(value_type = String, format = DateTime)]
    pub failed_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub resolved_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl From<FailedJob> for FailedJobBody {
    fn from(value: FailedJob) -> Self {
        Self {
            id: value.id,
            job_type: value.job_type.as_str().to_owned(),
            event_data: value.event_data,
            error_message: value.error_message,
            failed_at: value.failed_at,
            resolved_at: value.resolved_at,
            notes: value.notes,
        }
    }
}

/// Body of the resolve call.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct ResolveRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

/// How a replayed job was handled.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetryBody {
    #[schema(example = "processed")]
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = Uuid)]
    pub order_id: Option<OrderId>,
}

impl From<WebhookAck> for RetryBody {
    fn from(value: WebhookAck) -> Self {
        let (outcome, order_id) = match value {
            WebhookAck::Processed { order_id } => ("processed", Some(order_id)),
            WebhookAck::Duplicate { order_id } => ("duplicate", Some(order_id)),
            WebhookAck::Ignored => ("ignored", None),
            WebhookAck::Dropped => ("dropped", None),
        };
        Self {
            outcome: outcome.to_owned(),
            order_id,
        }
    }
}

/// List unresolved failed jobs, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/admin/failed-jobs",
    responses(
        (status = 200, description = "Open failed jobs", body = [FailedJobBody]),
        (status = 404, description = "Not an administrator", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "listFailedJobs",
    security(("BearerToken" = []))
)]
#[get("/admin/failed-jobs")]
pub async fn list_failed_jobs(
    state: web::Data<HttpState>,
    _admin: AdminUser,
) -> ApiResult<web::Json<Vec<FailedJobBody>>> {
    let jobs = state.recovery.list_failed_jobs().await?;
    Ok(web::Json(jobs.into_iter().map(Into::into).collect()))
}

/// Close a failed job without replaying it.
#[utoipa::path(
    post,
    path = "/api/v1/admin/failed-jobs/{id}/resolve",
    params(("id" = String, Path, description = "Failed job identifier")),
    request_body = ResolveRequest,
    responses(
        (status = 204, description = "Job resolved"),
        (status = 400, description = "Invalid identifier", body = ErrorSchema),
        (status = 404, description = "Job not found", body = ErrorSchema),
        (status = 409, description = "Job already resolved", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "resolveFailedJob",
    security(("BearerToken" = []))
)]
#[post("/admin/failed-jobs/{id}/resolve")]
pub async fn resolve_failed_job(
    state: web::Data<HttpState>,
    admin: AdminUser,
    path: web::Path<String>,
    payload: Option<web::Json<ResolveRequest>>,
) -> ApiResult<HttpResponse> {
    let id: FailedJobId = parse_id(&path, JOB_ID)?;
    let notes = payload.and_then(|body| body.into_inner().notes);
    state.recovery.resolve_failed_job(id, notes).await?;
    info!(job_id = %id, admin = %admin.0.id(), "failed job resolved");
    Ok(HttpResponse::NoContent().finish())
}

/// Replay the checkout captured in a failed job.
#[utoipa::path(
    post,
    path = "/api/v1/admin/failed-jobs/{id}/retry",
    params(("id" = String, Path, description = "Failed job identifier")),
    responses(
        (status = 200, description = "Job replayed and resolved", body = RetryBody),
        (status = 400, description = "Job cannot be replayed", body = ErrorSchema),
        (status = 404, description = "Job not found", body = ErrorSchema),
        (status = 409, description = "Job already resolved", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "retryFailedJob",
    security(("BearerToken" = []))
)]
#[post("/admin/failed-jobs/{id}/retry")]
pub async fn retry_failed_job(
    state: web::Data<HttpState>,
    admin: AdminUser,
    path: web::Path<String>,
) -> ApiResult<web::Json<RetryBody>> {
    let id: FailedJobId = parse_id(&path, JOB_ID)?;
    let ack = state.recovery.retry_failed_job(id).await?;
    info!(job_id = %id, admin = %admin.0.id(), ?ack, "failed job replayed");
    Ok(web::Json(ack.into()))
}

/// Put one failed or stale variant back in the queue.
#[utoipa::path(
    post,
    path = "/api/v1/admin/variants/{id}/reset",
    params(("id" = String, Path, description = "Variant identifier")),
    responses(
        (status = 200, description = "Variant reset", body = ResetBody),
        (status = 400, description = "Invalid identifier", body = ErrorSchema),
        (status = 404, description = "Variant not found", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "resetVariant",
    security(("BearerToken" = []))
)]
#[post("/admin/variants/{id}/reset")]
pub async fn reset_variant(
    state: web::Data<HttpState>,
    _admin: AdminUser,
    path: web::Path<String>,
) -> ApiResult<web::Json<ResetBody>> {
    let variant_id: VariantId = parse_id(&path, VARIANT_ID)?;
    let reset_count = state.recovery.reset_variant(variant_id).await?;
    Ok(web::Json(ResetBody { reset_count }))
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod tests;

//! Tests for the operator handlers.

use actix_web::http::StatusCode;
use actix_web::test as actix_test;
use rstest::rstest;
use serde_json::{Value, json};

use crate::domain::ports::FailedJobRepository;
use crate::domain::{
    CheckoutMetadata, CompletedCheckout, FailedJobId, FailedJobType, GenerationStatus,
    NewFailedJob, OrderType,
};
use crate::inbound::http::test_utils::{bearer, test_app};
use crate::test_support::{Workflow, fixtures};

async fn replayable_job(workflow: &Workflow) -> FailedJobId {
    let user = fixtures::user();
    let customization = fixtures::customization(user.id());
    workflow.store.insert_customization(customization.clone());
    let checkout = CompletedCheckout {
        session_id: "cs_failed".to_owned(),
        amount_total: Some(2499),
        currency: Some("gbp".to_owned()),
        customer_email: Some(user.email().to_owned()),
        metadata: CheckoutMetadata::Base {
            user_id: user.id(),
            email: user.email().to_owned(),
            customization_id: customization.id,
        }
        .encode(),
    };
    workflow
        .store
        .record(&NewFailedJob {
            job_type: FailedJobType::WebhookProcessing,
            event_data: serde_json::to_value(&checkout).expect("checkout serialises"),
            error_message: "database unavailable".to_owned(),
        })
        .await
        .expect("job recorded")
}

async fn send(
    workflow: &Workflow,
    token: Option<&str>,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    let app = test_app(workflow).await;
    let mut request = match method {
        "GET" => actix_test::TestRequest::get(),
        _ => actix_test::TestRequest::post(),
    }
    .uri(uri);
    if let Some(token) = token {
        request = request.insert_header(bearer(token));
    }
    if let Some(body) = body {
        request = request.set_json(body);
    }
    let res = actix_test::call_service(&app, request.to_request()).await;
    let status = res.status();
    let bytes = actix_test::read_body(res).await;
    (status, serde_json::from_slice(&bytes).ok())
}

#[rstest]
#[case::anonymous(None)]
#[case::customer(Some("customer"))]
#[actix_web::test]
async fn non_admins_cannot_see_the_admin_surface(#[case] token: Option<&str>) {
    let workflow = Workflow::new();
    workflow.sign_in("customer");
    replayable_job(&workflow).await;

    let (status, body) = send(&workflow, token, "GET", "/api/v1/admin/failed-jobs", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.map(|b| b["code"].clone()), Some(json!("not_found")));
}

#[actix_web::test]
async fn admins_list_open_jobs() {
    let workflow = Workflow::new();
    workflow.sign_in_admin("admin");
    let job_id = replayable_job(&workflow).await;

    let (status, body) = send(&workflow, Some("admin"), "GET", "/api/v1/admin/failed-jobs", None).await;

    assert_eq!(status, StatusCode::OK);
    let jobs = body.expect("json body");
    assert_eq!(jobs[0]["id"], job_id.to_string());
    assert_eq!(jobs[0]["jobType"], "webhook_processing");
    assert_eq!(jobs[0]["eventData"]["sessionId"], "cs_failed");
    assert!(jobs[0]["resolvedAt"].is_null());
}

#[actix_web::test]
async fn resolving_closes_a_job_once() {
    let workflow = Workflow::new();
    workflow.sign_in_admin("admin");
    let job_id = replayable_job(&workflow).await;
    let uri = format!("/api/v1/admin/failed-jobs/{job_id}/resolve");

    let (status, _) = send(
        &workflow,
        Some("admin"),
        "POST",
        &uri,
        Some(json!({ "notes": "refunded by hand" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let jobs = workflow.store.failed_jobs();
    assert_eq!(jobs[0].notes.as_deref(), Some("refunded by hand"));
    assert!(!jobs[0].is_open());

    let (status, _) = send(&workflow, Some("admin"), "POST", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn retry_replays_the_checkout_and_closes_the_job() {
    let workflow = Workflow::new();
    workflow.sign_in_admin("admin");
    let job_id = replayable_job(&workflow).await;

    let (status, body) = send(
        &workflow,
        Some("admin"),
        "POST",
        &format!("/api/v1/admin/failed-jobs/{job_id}/retry"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body = body.expect("json body");
    assert_eq!(body["outcome"], "processed");
    let orders = workflow.store.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(body["orderId"], orders[0].id.to_string());
    assert_eq!(workflow.trigger.triggered(), vec![orders[0].id]);
    assert!(workflow.store.failed_jobs().iter().all(|job| !job.is_open()));
}

#[actix_web::test]
async fn unknown_jobs_are_not_found() {
    let workflow = Workflow::new();
    workflow.sign_in_admin("admin");

    let (status, _) = send(
        &workflow,
        Some("admin"),
        "POST",
        &format!("/api/v1/admin/failed-jobs/{}/retry", FailedJobId::random()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn variant_reset_requeues_one_variant() {
    let workflow = Workflow::new();
    workflow.sign_in_admin("admin");
    let owner = fixtures::user();
    let order = fixtures::order(owner.id(), OrderType::Base);
    workflow.store.insert_order(order.clone(), 3);
    let variant = workflow.store.variants_of(order.id).remove(1);
    workflow
        .store
        .set_variant_status(variant.id, GenerationStatus::Failed, None);

    let (status, body) = send(
        &workflow,
        Some("admin"),
        "POST",
        &format!("/api/v1/admin/variants/{}/reset", variant.id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.map(|b| b["resetCount"].clone()), Some(json!(1)));
    assert_eq!(
        workflow.store.variants_of(order.id)[1].generation_status,
        GenerationStatus::Pending
    );
    assert_eq!(workflow.trigger.triggered(), vec![order.id]);
}

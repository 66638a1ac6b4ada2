//! Tests for the brief intake handler.

use actix_web::http::StatusCode;
use actix_web::test as actix_test;
use rstest::rstest;
use serde_json::{Value, json};

use crate::inbound::http::test_utils::{bearer, test_app};
use crate::test_support::Workflow;

fn brief_payload() -> Value {
    json!({
        "recipientName": "Sam",
        "authorName": "Alex",
        "occasion": "birthday",
        "lengthSeconds": 90,
        "moods": ["happy", "upbeat"],
        "genre": "pop",
        "specialMemories": "the camping trip",
        "occasionDate": "2024-06-01"
    })
}

#[actix_web::test]
async fn stores_brief_for_the_caller() {
    let workflow = Workflow::new();
    workflow.sign_in("tok");
    let app = test_app(&workflow).await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/customizations")
            .insert_header(bearer("tok"))
            .set_json(brief_payload())
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["recipientName"], "Sam");
    assert_eq!(body["lengthSeconds"], 90);
    assert_eq!(body["moods"], json!(["happy", "upbeat"]));
    assert_eq!(body["occasionDate"], "2024-06-01");
    assert!(body["id"].as_str().is_some());
}

#[actix_web::test]
async fn anonymous_callers_are_unauthorised() {
    let workflow = Workflow::new();
    let app = test_app(&workflow).await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/customizations")
            .set_json(brief_payload())
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["code"], "unauthorized");
}

#[rstest]
#[case::no_moods("moods", json!([]))]
#[case::unknown_genre("genre", json!("polka"))]
#[case::odd_length("lengthSeconds", json!(75))]
#[case::blank_recipient("recipientName", json!("   "))]
#[actix_web::test]
async fn invalid_briefs_are_rejected_with_the_field(#[case] field: &str, #[case] value: Value) {
    let workflow = Workflow::new();
    workflow.sign_in("tok");
    let app = test_app(&workflow).await;
    let mut payload = brief_payload();
    payload[field] = value;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/customizations")
            .insert_header(bearer("tok"))
            .set_json(payload)
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["code"], "invalid_request");
    assert!(body["details"]["field"].is_string());
}

#[actix_web::test]
async fn malformed_json_uses_the_error_envelope() {
    let workflow = Workflow::new();
    workflow.sign_in("tok");
    let app = test_app(&workflow).await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/customizations")
            .insert_header(bearer("tok"))
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"recipientName\":")
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["code"], "invalid_request");
}

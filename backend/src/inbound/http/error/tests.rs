//! Tests for HTTP error mapping.

use super::*;
use actix_web::body::to_bytes;
use rstest::rstest;
use serde_json::{Value, json};

const TRACE_ID: &str = "00000000-0000-0000-0000-000000000000";

async fn body_of(error: &Error) -> (StatusCode, Option<String>, Value) {
    let response = ResponseError::error_response(error);
    let status = response.status();
    let header = response
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let bytes = to_bytes(response.into_body()).await.expect("body bytes");
    let body: Value = serde_json::from_slice(&bytes).expect("json body");
    (status, header, body)
}

#[rstest]
#[case::invalid(Error::invalid_request("bad"), StatusCode::BAD_REQUEST)]
#[case::unauthorised(Error::unauthorized("no auth"), StatusCode::UNAUTHORIZED)]
#[case::forbidden(Error::forbidden("denied"), StatusCode::FORBIDDEN)]
#[case::not_found(Error::not_found("missing"), StatusCode::NOT_FOUND)]
#[case::conflict(Error::conflict("taken"), StatusCode::CONFLICT)]
#[case::unavailable(Error::service_unavailable("db down"), StatusCode::SERVICE_UNAVAILABLE)]
#[case::internal(Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
fn status_code_matches_error_code(#[case] error: Error, #[case] status: StatusCode) {
    assert_eq!(ResponseError::status_code(&error), status);
}

#[actix_web::test]
async fn internal_errors_are_redacted_but_keep_the_trace_id() {
    let error = Error::internal("connection refused by 10.0.0.4")
        .with_trace_id(TRACE_ID)
        .with_details(json!({"sql": "select 1"}));

    let (status, header, body) = body_of(&error).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(header.as_deref(), Some(TRACE_ID));
    assert_eq!(
        body,
        json!({"code": "internal_error", "message": "Internal server error", "traceId": TRACE_ID})
    );
}

#[actix_web::test]
async fn unavailable_dependencies_hide_the_port_message() {
    let error = Error::service_unavailable("order store unavailable: pool timed out")
        .with_trace_id(TRACE_ID);

    let (status, _, body) = body_of(&error).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Service temporarily unavailable");
    assert_eq!(body["traceId"], TRACE_ID);
}

#[actix_web::test]
async fn client_errors_pass_through_with_details() {
    let error = Error::invalid_request("recipientName must not be empty")
        .with_trace_id(TRACE_ID)
        .with_details(json!({"field": "recipientName", "code": "empty"}));

    let (status, header, body) = body_of(&error).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(header.as_deref(), Some(TRACE_ID));
    assert_eq!(body["message"], "recipientName must not be empty");
    assert_eq!(body["details"]["field"], "recipientName");
}

#[actix_web::test]
async fn missing_trace_id_omits_the_header() {
    let (_, header, body) = body_of(&Error::not_found("order not found")).await;
    assert!(header.is_none());
    assert!(body.get("traceId").is_none());
}

#[rstest]
fn actix_errors_become_internal_errors_that_are_never_shown() {
    let error = Error::from(actix_web::error::ErrorBadGateway("upstream said no"));

    assert_eq!(error.code(), ErrorCode::InternalError);
    assert_eq!(error.message(), "upstream said no");
    assert_eq!(error.redacted().message(), "Internal server error");
}

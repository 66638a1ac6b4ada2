//! Behaviour of the transport-agnostic error payload.

use super::*;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case(Error::invalid_request("x"), ErrorCode::InvalidRequest)]
#[case(Error::unauthorized("x"), ErrorCode::Unauthorized)]
#[case(Error::forbidden("x"), ErrorCode::Forbidden)]
#[case(Error::not_found("x"), ErrorCode::NotFound)]
#[case(Error::conflict("x"), ErrorCode::Conflict)]
#[case(Error::service_unavailable("x"), ErrorCode::ServiceUnavailable)]
#[case(Error::internal("x"), ErrorCode::InternalError)]
fn constructors_set_the_expected_code(#[case] error: Error, #[case] expected: ErrorCode) {
    assert_eq!(error.code(), expected);
}

#[rstest]
fn trace_id_is_absent_outside_a_request() {
    assert!(Error::internal("boom").trace_id().is_none());
}

#[rstest]
#[tokio::test]
async fn trace_id_is_captured_inside_a_scope() {
    let id = TraceId::generate();
    let error = TraceId::scope(id, async { Error::conflict("taken") }).await;
    assert_eq!(error.trace_id(), Some(id.to_string().as_str()));
}

#[rstest]
fn serialises_with_camel_case_keys_and_snake_case_codes() {
    let error = Error::not_found("order not found")
        .with_trace_id("abc")
        .with_details(json!({ "orderId": "1" }));
    let value = serde_json::to_value(&error).expect("error serialises");
    assert_eq!(
        value,
        json!({
            "code": "not_found",
            "message": "order not found",
            "traceId": "abc",
            "details": { "orderId": "1" },
        })
    );
}

#[rstest]
fn display_uses_the_message() {
    assert_eq!(Error::invalid_request("bad tier").to_string(), "bad tier");
}

#[rstest]
#[case::unavailable(ErrorCode::ServiceUnavailable, true)]
#[case::internal(ErrorCode::InternalError, true)]
#[case::precondition(ErrorCode::Conflict, false)]
#[case::ownership(ErrorCode::NotFound, false)]
fn only_server_faults_are_withheld(#[case] code: ErrorCode, #[case] withheld: bool) {
    assert_eq!(code.is_server_fault(), withheld);
}

#[rstest]
fn redaction_keeps_code_and_trace_but_drops_detail() {
    let error = Error::service_unavailable("storage returned 502 for songs/abc.mp3")
        .with_trace_id("abc")
        .with_details(json!({ "bucket": "songs" }));

    let shown = error.redacted();

    assert_eq!(shown.code(), ErrorCode::ServiceUnavailable);
    assert_eq!(shown.message(), "Service temporarily unavailable");
    assert_eq!(shown.trace_id(), Some("abc"));
    assert!(shown.details().is_none());
}

#[rstest]
fn client_faults_are_shown_as_raised() {
    let error = Error::conflict("all three variants already exist").with_trace_id("abc");
    assert_eq!(error.redacted(), error);
}

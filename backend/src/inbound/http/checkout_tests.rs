//! Tests for the purchase handlers.

use actix_web::http::StatusCode;
use actix_web::test as actix_test;
use rstest::rstest;
use serde_json::{Value, json};

use crate::domain::{Customization, Order, OrderType};
use crate::inbound::http::test_utils::{bearer, test_app};
use crate::test_support::{APP_BASE_URL, Workflow, fixtures};

struct Purchased {
    customization: Customization,
    order: Order,
}

fn purchased(workflow: &Workflow, token: &str) -> Purchased {
    let user = workflow.sign_in(token);
    let customization = fixtures::customization(user.id());
    workflow.store.insert_customization(customization.clone());
    let mut order = fixtures::order(user.id(), OrderType::Base);
    order.customization_id = Some(customization.id);
    workflow.store.insert_order(order.clone(), 3);
    Purchased {
        customization,
        order,
    }
}

async fn post_json(workflow: &Workflow, token: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let app = test_app(workflow).await;
    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri(uri)
            .insert_header(bearer(token))
            .set_json(body)
            .to_request(),
    )
    .await;
    let status = res.status();
    (status, actix_test::read_body_json(res).await)
}

#[actix_web::test]
async fn checkout_without_credit_opens_a_payment_page() {
    let workflow = Workflow::new();
    let user = workflow.sign_in("tok");
    let customization = fixtures::customization(user.id());
    workflow.store.insert_customization(customization.clone());

    let (status, body) = post_json(
        &workflow,
        "tok",
        "/api/v1/checkout",
        json!({ "customizationId": customization.id.to_string() }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://checkout.test/pay/cs_test_1");
    assert!(body.get("redirect").is_none());
    let sessions = workflow.gateway.sessions();
    let (_, request) = sessions.first().expect("one session opened");
    assert_eq!(request.amount_minor, 2499);
    assert_eq!(request.customer_email, user.email());
    assert_eq!(
        request.metadata.get("order_type").map(String::as_str),
        Some("base")
    );
    assert!(workflow.store.orders().is_empty());
}

#[actix_web::test]
async fn checkout_with_credit_creates_the_order_directly() {
    let workflow = Workflow::new();
    let user = workflow.sign_in("tok");
    let customization = fixtures::customization(user.id());
    workflow.store.insert_customization(customization.clone());
    workflow.store.seed_bundle(user.id(), 1);

    let (status, body) = post_json(
        &workflow,
        "tok",
        "/api/v1/checkout",
        json!({ "customizationId": customization.id.to_string() }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let order_id = body["orderId"].as_str().expect("order id").to_owned();
    assert_eq!(
        body["redirect"],
        format!("{APP_BASE_URL}/generate/{order_id}")
    );
    assert!(workflow.gateway.sessions().is_empty());
    let orders = workflow.store.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(workflow.store.variants_of(orders[0].id).len(), 3);
}

#[rstest]
#[case::missing(json!({}), "missing_field")]
#[case::malformed(json!({ "customizationId": "nope" }), "invalid_uuid")]
#[actix_web::test]
async fn checkout_requires_a_customization_id(#[case] body: Value, #[case] code: &str) {
    let workflow = Workflow::new();
    workflow.sign_in("tok");

    let (status, error) = post_json(&workflow, "tok", "/api/v1/checkout", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["details"]["field"], "customizationId");
    assert_eq!(error["details"]["code"], code);
}

#[actix_web::test]
async fn foreign_customizations_are_not_found() {
    let workflow = Workflow::new();
    let owner = fixtures::user();
    let customization = fixtures::customization(owner.id());
    workflow.store.insert_customization(customization.clone());
    workflow.sign_in("intruder");

    let (status, error) = post_json(
        &workflow,
        "intruder",
        "/api/v1/checkout",
        json!({ "customizationId": customization.id.to_string() }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "not_found");
}

#[rstest]
#[case::known("bundle-3", StatusCode::OK)]
#[case::unknown("bundle-99", StatusCode::BAD_REQUEST)]
#[case::blank("  ", StatusCode::BAD_REQUEST)]
#[actix_web::test]
async fn bundle_checkout_checks_the_tier(#[case] tier: &str, #[case] expected: StatusCode) {
    let workflow = Workflow::new();
    workflow.sign_in("tok");

    let (status, body) = post_json(
        &workflow,
        "tok",
        "/api/v1/checkout/bundle",
        json!({ "tierId": tier }),
    )
    .await;

    assert_eq!(status, expected);
    if expected == StatusCode::OK {
        let sessions = workflow.gateway.sessions();
        let (session, request) = sessions.first().expect("one session opened");
        assert_eq!(body["url"], session.url.as_str());
        assert_eq!(request.amount_minor, 5999);
        assert_eq!(request.metadata.get("quantity").map(String::as_str), Some("3"));
    } else {
        assert!(workflow.gateway.sessions().is_empty());
    }
}

#[actix_web::test]
async fn free_tweak_creates_a_rerender_once() {
    let workflow = Workflow::new();
    let Purchased {
        customization,
        order,
        ..
    } = purchased(&workflow, "tok");
    let uri = format!("/api/v1/orders/{}/tweak", order.id);

    let (status, body) = post_json(
        &workflow,
        "tok",
        &uri,
        json!({ "thingsToAvoid": "the ex" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let tweak_id = body["orderId"].as_str().expect("order id").to_owned();
    assert_eq!(body["redirect"], format!("{APP_BASE_URL}/generate/{tweak_id}"));
    assert_eq!(workflow.store.order(order.id).map(|o| o.tweak_count), Some(1));
    let tweak = workflow
        .store
        .orders()
        .into_iter()
        .find(|o| o.id.to_string() == tweak_id)
        .expect("tweak order stored");
    assert_eq!(tweak.customization_id, Some(customization.id));
    assert_eq!(tweak.parent_order_id, Some(order.id));

    let (status, error) = post_json(
        &workflow,
        "tok",
        &uri,
        json!({ "thingsToAvoid": "the ex" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "conflict");
}

#[actix_web::test]
async fn empty_tweaks_are_rejected() {
    let workflow = Workflow::new();
    let Purchased { order, .. } = purchased(&workflow, "tok");

    let (status, error) = post_json(
        &workflow,
        "tok",
        &format!("/api/v1/orders/{}/tweak", order.id),
        json!({ "specialMemories": "   " }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["details"]["code"], "invalid_value");
    assert_eq!(workflow.store.order(order.id).map(|o| o.tweak_count), Some(0));
}

#[actix_web::test]
async fn paid_tweak_waits_for_the_free_one() {
    let workflow = Workflow::new();
    let Purchased { order, .. } = purchased(&workflow, "tok");

    let (status, _) = post_json(
        &workflow,
        "tok",
        "/api/v1/checkout/tweak",
        json!({ "orderId": order.id.to_string(), "specialMemories": "our first dance" }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(workflow.gateway.sessions().is_empty());
}

#[actix_web::test]
async fn paid_tweak_carries_the_amendment_in_metadata() {
    let workflow = Workflow::new();
    let Purchased { mut order, .. } = purchased(&workflow, "tok");
    order.tweak_count = 1;
    workflow.store.insert_order(order.clone(), 3);

    let (status, body) = post_json(
        &workflow,
        "tok",
        "/api/v1/checkout/tweak",
        json!({ "orderId": order.id.to_string(), "pronunciation": "SHAH-vahn" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().is_some());
    let sessions = workflow.gateway.sessions();
    let (_, request) = sessions.first().expect("one session opened");
    assert_eq!(request.metadata.get("order_type").map(String::as_str), Some("tweak"));
    assert_eq!(
        request.metadata.get("original_order_id"),
        Some(&order.id.to_string())
    );
}

#[rstest]
#[case::three_variants(3, StatusCode::OK)]
#[case::already_four(4, StatusCode::CONFLICT)]
#[actix_web::test]
async fn upsell_is_limited_to_four_variants(#[case] variants: u8, #[case] expected: StatusCode) {
    let workflow = Workflow::new();
    let user = workflow.sign_in("tok");
    let order = fixtures::order(user.id(), OrderType::Base);
    workflow.store.insert_order(order.clone(), variants);

    let (status, _) = post_json(
        &workflow,
        "tok",
        "/api/v1/checkout/upsell",
        json!({ "orderId": order.id.to_string() }),
    )
    .await;

    assert_eq!(status, expected);
    assert_eq!(workflow.gateway.sessions().len(), usize::from(expected == StatusCode::OK));
}

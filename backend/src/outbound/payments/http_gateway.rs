//! Reqwest-backed hosted-checkout client.
//!
//! Sessions are created with a form-encoded POST carrying a single ad-hoc
//! line item and the session metadata. Webhook verification is local and
//! never touches the network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockable::Clock;
use reqwest::{Client, StatusCode, Url};
use zeroize::Zeroizing;

use super::dto::{CreatedSessionDto, ErrorEnvelopeDto, parse_event};
use super::signature::verify_signature;
use crate::domain::PaymentEvent;
use crate::domain::ports::{
    CheckoutSession, CheckoutSessionRequest, PaymentGateway, PaymentGatewayError,
};
use crate::outbound::http_support::{client_with_timeout, status_message};

const SESSIONS_PATH: &str = "v1/checkout/sessions";

/// Credentials and endpoint of the payment processor.
#[derive(Clone)]
pub struct PaymentGatewayConfig {
    pub api_base: Url,
    pub secret_key: Zeroizing<String>,
    pub webhook_secret: Zeroizing<String>,
    pub timeout: Duration,
}

/// [`PaymentGateway`] talking to the processor's REST API.
pub struct HttpPaymentGateway {
    client: Client,
    sessions_url: Url,
    secret_key: Zeroizing<String>,
    webhook_secret: Zeroizing<String>,
    clock: Arc<dyn Clock>,
}

impl HttpPaymentGateway {
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built or the API base
    /// cannot be joined with the sessions path.
    pub fn new(config: PaymentGatewayConfig, clock: Arc<dyn Clock>) -> Result<Self, PaymentGatewayError> {
        let client = client_with_timeout(config.timeout)
            .map_err(|error| PaymentGatewayError::transport(error.to_string()))?;
        let sessions_url = config
            .api_base
            .join(SESSIONS_PATH)
            .map_err(|error| PaymentGatewayError::transport(format!("invalid api base: {error}")))?;
        Ok(Self {
            client,
            sessions_url,
            secret_key: config.secret_key,
            webhook_secret: config.webhook_secret,
            clock,
        })
    }
}

/// Flatten a session request into the processor's bracketed form keys.
fn session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_owned(), "payment".to_owned()),
        ("success_url".to_owned(), request.success_url.clone()),
        ("cancel_url".to_owned(), request.cancel_url.clone()),
        ("customer_email".to_owned(), request.customer_email.clone()),
        ("line_items[0][quantity]".to_owned(), "1".to_owned()),
        (
            "line_items[0][price_data][currency]".to_owned(),
            request.currency.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_owned(),
            request.amount_minor.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_owned(),
            request.product_name.clone(),
        ),
    ];
    form.extend(
        request
            .metadata
            .iter()
            .map(|(key, value)| (format!("metadata[{key}]"), value.clone())),
    );
    form
}

fn map_transport_error(error: reqwest::Error) -> PaymentGatewayError {
    PaymentGatewayError::transport(error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> PaymentGatewayError {
    let message = serde_json::from_slice::<ErrorEnvelopeDto>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .unwrap_or_else(|| status_message(status, body));
    if status.is_server_error() {
        PaymentGatewayError::transport(message)
    } else {
        PaymentGatewayError::rejected(status.as_u16(), message)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentGatewayError> {
        let response = self
            .client
            .post(self.sessions_url.clone())
            .bearer_auth(self.secret_key.as_str())
            .form(&session_form(request))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }

        let created: CreatedSessionDto = serde_json::from_slice(body.as_ref()).map_err(|error| {
            PaymentGatewayError::decode(format!("invalid session response: {error}"))
        })?;
        let url = created
            .url
            .ok_or_else(|| PaymentGatewayError::decode("session response has no url"))?;
        Ok(CheckoutSession {
            id: created.id,
            url,
        })
    }

    fn verify_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentEvent, PaymentGatewayError> {
        verify_signature(
            self.webhook_secret.as_bytes(),
            payload,
            signature,
            self.clock.utc().timestamp(),
        )?;
        parse_event(payload)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::outbound::payments::sign_payload;
    use crate::test_support::MutableClock;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            product_name: "Personalised song".to_owned(),
            amount_minor: 2499,
            currency: "gbp".to_owned(),
            customer_email: "sam@example.com".to_owned(),
            success_url: "https://app.test/ok".to_owned(),
            cancel_url: "https://app.test/cancel".to_owned(),
            metadata: BTreeMap::from([("order_type".to_owned(), "base".to_owned())]),
        }
    }

    fn gateway_at(now: i64) -> HttpPaymentGateway {
        let instant = Utc.timestamp_opt(now, 0).single().expect("valid timestamp");
        let clock = MutableClock::new(instant);
        HttpPaymentGateway::new(
            PaymentGatewayConfig {
                api_base: Url::parse("https://payments.test/").expect("static url"),
                secret_key: Zeroizing::new("sk_test".to_owned()),
                webhook_secret: Zeroizing::new("whsec_gateway".to_owned()),
                timeout: Duration::from_secs(5),
            },
            Arc::new(clock),
        )
        .expect("gateway builds")
    }

    #[rstest]
    fn form_carries_price_and_metadata() {
        let form: BTreeMap<String, String> = session_form(&request()).into_iter().collect();
        assert_eq!(form["mode"], "payment");
        assert_eq!(form["line_items[0][price_data][unit_amount]"], "2499");
        assert_eq!(form["line_items[0][price_data][currency]"], "gbp");
        assert_eq!(form["metadata[order_type]"], "base");
    }

    #[rstest]
    fn joins_the_sessions_path_onto_the_api_base() {
        let gateway = gateway_at(0);
        assert_eq!(
            gateway.sessions_url.as_str(),
            "https://payments.test/v1/checkout/sessions"
        );
    }

    #[rstest]
    #[case(StatusCode::BAD_REQUEST, false)]
    #[case(StatusCode::UNAUTHORIZED, false)]
    #[case(StatusCode::SERVICE_UNAVAILABLE, true)]
    fn server_errors_are_transport_failures(#[case] status: StatusCode, #[case] transport: bool) {
        let error = map_status_error(status, br#"{"error":{"message":"Invalid currency"}}"#);
        assert_eq!(matches!(error, PaymentGatewayError::Transport { .. }), transport);
        assert!(error.to_string().contains("Invalid currency"));
    }

    #[rstest]
    fn verifies_with_the_clock_time() {
        let now = 1_760_000_000;
        let body = br#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
        let header = sign_payload(b"whsec_gateway", now - 10, body);

        let event = gateway_at(now).verify_event(body, &header).expect("verified");
        assert_eq!(event.id, "evt_1");

        let stale = gateway_at(now + 3600).verify_event(body, &header);
        assert!(matches!(stale, Err(PaymentGatewayError::InvalidSignature { .. })));
    }
}

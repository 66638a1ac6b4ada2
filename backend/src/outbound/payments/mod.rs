//! Payment processor adapter: hosted checkout sessions and signed webhooks.

mod dto;
mod http_gateway;
mod signature;

pub use dto::parse_event;
pub use http_gateway::{HttpPaymentGateway, PaymentGatewayConfig};
pub use signature::{SIGNATURE_TOLERANCE_SECS, sign_payload, verify_signature};

//! HTTP inbound adapter exposing REST endpoints.

pub mod admin;
pub mod auth;
pub mod checkout;
pub mod customizations;
pub mod entitlements;
pub mod error;
pub mod generation;
pub mod health;
pub mod orders;
pub mod schemas;
pub mod share;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod validation;
pub mod webhooks;

use actix_web::web;

pub use error::ApiResult;

/// Prefix shared by every versioned endpoint.
pub const API_PREFIX: &str = "/api/v1";

/// JSON extractor settings: malformed bodies answer with the error envelope
/// instead of actix's plain-text message.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        crate::domain::Error::invalid_request(format!("invalid JSON body: {err}")).into()
    })
}

/// Every versioned route, mounted under [`API_PREFIX`].
pub fn api_scope() -> actix_web::Scope {
    web::scope(API_PREFIX)
        .app_data(json_config())
        .service(customizations::create_customization)
        .service(checkout::create_checkout)
        .service(checkout::create_bundle_checkout)
        .service(checkout::create_tweak_checkout)
        .service(checkout::create_upsell_checkout)
        .service(checkout::apply_free_tweak)
        .service(entitlements::get_entitlements)
        .service(webhooks::payment_webhook)
        .service(generation::internal_generate)
        .service(generation::generate_order)
        .service(orders::order_status)
        .service(orders::select_variant)
        .service(orders::variant_audio)
        .service(orders::reset_order)
        .service(share::shared_song)
        .service(share::shared_audio)
        .service(admin::list_failed_jobs)
        .service(admin::resolve_failed_job)
        .service(admin::retry_failed_job)
        .service(admin::reset_variant)
}

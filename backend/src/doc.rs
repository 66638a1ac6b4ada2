//! OpenAPI documentation configuration.
//!
//! This module defines the [`ApiDoc`] struct which generates the OpenAPI
//! specification for the REST API. It registers:
//!
//! - **Paths**: every HTTP endpoint from the inbound layer plus the probes
//! - **Schemas**: the error envelope wrappers ([`ErrorSchema`],
//!   [`ErrorCodeSchema`]); request and response bodies are collected from
//!   the path annotations
//! - **Security**: bearer token authentication issued by the identity
//!   provider
//!
//! The generated specification is used by Swagger UI (debug builds) and
//! exported via `cargo run --bin openapi-dump` for external tooling.

use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Enrich the generated document with the bearer token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "BearerToken",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .description(Some("Access token issued by the identity provider."))
                    .build(),
            ),
        );
    }
}

/// OpenAPI document for the REST API.
/// Swagger UI is enabled in debug builds only and used by tooling.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Songsmith backend API",
        description = "Personalised song orders: customisation, checkout, generation and sharing.",
        license(
            name = "Apache-2.0",
            url = "https://www.apache.org/licenses/LICENSE-2.0.html"
        )
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("BearerToken" = [])),
    paths(
        crate::inbound::http::customizations::create_customization,
        crate::inbound::http::checkout::create_checkout,
        crate::inbound::http::checkout::create_bundle_checkout,
        crate::inbound::http::checkout::create_tweak_checkout,
        crate::inbound::http::checkout::create_upsell_checkout,
        crate::inbound::http::checkout::apply_free_tweak,
        crate::inbound::http::entitlements::get_entitlements,
        crate::inbound::http::webhooks::payment_webhook,
        crate::inbound::http::generation::internal_generate,
        crate::inbound::http::generation::generate_order,
        crate::inbound::http::orders::order_status,
        crate::inbound::http::orders::select_variant,
        crate::inbound::http::orders::variant_audio,
        crate::inbound::http::orders::reset_order,
        crate::inbound::http::share::shared_song,
        crate::inbound::http::share::shared_audio,
        crate::inbound::http::admin::list_failed_jobs,
        crate::inbound::http::admin::resolve_failed_job,
        crate::inbound::http::admin::retry_failed_job,
        crate::inbound::http::admin::reset_variant,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(ErrorSchema, ErrorCodeSchema)),
    tags(
        (name = "customizations", description = "Song briefs written before purchase"),
        (name = "checkout", description = "Purchases, bundles, tweaks and upsells"),
        (name = "webhooks", description = "Signed payment processor callbacks"),
        (name = "generation", description = "One-variant-at-a-time rendering"),
        (name = "orders", description = "Order progress and variant choice"),
        (name = "share", description = "Public links to a selected song"),
        (name = "admin", description = "Failed job review and manual recovery"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

//! Test helpers for inbound HTTP components.

use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::header::AUTHORIZATION;
use actix_web::{App, test as actix_test, web};

use crate::inbound::http::api_scope;
use crate::middleware::Trace;
use crate::test_support::Workflow;

/// Initialise the full versioned API over `workflow`'s in-memory ports.
pub async fn test_app(
    workflow: &Workflow,
) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
    actix_test::init_service(
        App::new()
            .app_data(web::Data::new(workflow.http_state()))
            .wrap(Trace)
            .service(api_scope()),
    )
    .await
}

/// `Authorization` header for `token`.
pub fn bearer(token: &str) -> (actix_web::http::header::HeaderName, String) {
    (AUTHORIZATION, format!("Bearer {token}"))
}

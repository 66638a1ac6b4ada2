//! Server construction and middleware wiring.

mod config;
#[cfg(feature = "metrics")]
mod metrics;
mod state_builders;

pub use config::{AppSettings, ServerConfig};

#[cfg(feature = "metrics")]
pub(crate) use metrics::build_prometheus;
#[cfg(feature = "metrics")]
use metrics::MetricsLayer;
use state_builders::build_http_state;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use tracing::{info, warn};

use songsmith::Trace;
#[cfg(debug_assertions)]
use songsmith::doc::ApiDoc;
use songsmith::inbound::http::api_scope;
use songsmith::inbound::http::health::{HealthState, live, ready};
use songsmith::inbound::http::state::HttpState;
use songsmith::outbound::persistence::DbPool;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

const SHUTDOWN_GRACE_SECS: u64 = 30;

#[derive(Clone)]
struct AppDependencies {
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
    } = deps;

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .wrap(Trace)
        .service(api_scope())
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    #[cfg(not(debug_assertions))]
    let app = app;

    app
}

/// Construct an Actix HTTP server over the PostgreSQL pool and the
/// configured providers.
///
/// # Parameters
/// - `health_state`: shared readiness state updated once the server is initialised.
/// - `config`: resolved [`ServerConfig`] with binding, provider and optional metrics settings.
/// - `pool`: connection pool shared by every repository.
///
/// # Returns
/// A spawned [`Server`] that must be awaited to drive the listener.
///
/// # Errors
/// Propagates [`std::io::Error`] when a provider client cannot be built or
/// binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
    pool: DbPool,
) -> std::io::Result<Server> {
    let server_health_state = health_state.clone();
    let http_state = build_http_state(&config, &pool)?;
    let bind_addr = config.bind_addr();

    #[cfg(feature = "metrics")]
    let metrics_layer = MetricsLayer::from_option(config.prometheus);

    let server = HttpServer::new(move || {
        let app = build_app(AppDependencies {
            health_state: server_health_state.clone(),
            http_state: http_state.clone(),
        });

        #[cfg(feature = "metrics")]
        let app = app.wrap(metrics_layer.clone());

        app
    })
    .bind(bind_addr)?
    .shutdown_timeout(SHUTDOWN_GRACE_SECS)
    .run();

    let draining = health_state.clone();
    actix_web::rt::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; failing liveness while requests drain");
            draining.mark_unhealthy();
        }
    });

    info!(%bind_addr, "songsmith listening");
    health_state.mark_ready();
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use songsmith::test_support::Workflow;

    fn deps(health: &web::Data<HealthState>) -> AppDependencies {
        AppDependencies {
            health_state: health.clone(),
            http_state: web::Data::new(Workflow::new().http_state()),
        }
    }

    #[actix_web::test]
    async fn probes_follow_the_health_state() {
        let health = web::Data::new(HealthState::new());
        let app = test::init_service(build_app(deps(&health))).await;

        let before = test::call_service(
            &app,
            test::TestRequest::get().uri("/health/ready").to_request(),
        )
        .await;
        assert_eq!(before.status(), StatusCode::SERVICE_UNAVAILABLE);

        health.mark_ready();
        let after = test::call_service(
            &app,
            test::TestRequest::get().uri("/health/ready").to_request(),
        )
        .await;
        assert_eq!(after.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn api_routes_are_mounted_under_the_prefix() {
        let health = web::Data::new(HealthState::new());
        let app = test::init_service(build_app(deps(&health))).await;

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/v1/entitlements")
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[cfg(debug_assertions)]
    #[actix_web::test]
    async fn debug_builds_serve_the_openapi_document() {
        let health = web::Data::new(HealthState::new());
        let app = test::init_service(build_app(deps(&health))).await;

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api-docs/openapi.json")
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
    }
}

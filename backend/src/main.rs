//! Backend entry-point: loads settings, migrates the database and serves the
//! REST API with its OpenAPI docs.

mod server;

use actix_web::web;
use color_eyre::eyre::{Context, Result};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use songsmith::inbound::http::health::HealthState;
use songsmith::outbound::persistence::DbPool;

use server::{AppSettings, ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings =
        AppSettings::load_from_iter(std::env::args_os()).wrap_err("failed to load settings")?;
    let config = ServerConfig::from_settings(&settings).wrap_err("invalid settings")?;
    #[cfg(feature = "metrics")]
    let config = config.with_metrics(Some(server::build_prometheus()?));

    let applied = DbPool::run_migrations(config.database())
        .await
        .wrap_err("database migrations failed")?;
    info!(applied, "database migrations complete");
    let pool = DbPool::new(config.database().clone())
        .await
        .wrap_err("failed to create database pool")?;

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, config, pool)?;
    server.await.wrap_err("server terminated with an error")
}

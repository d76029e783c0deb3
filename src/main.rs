//! dutycycle-worker — HTTP service that plans FMCSA-compliant Hours-of-Service
//! trip schedules for property-carrying truck drivers.

mod auth;
mod cli;
mod config;
mod db;
mod hos;
mod http;
mod services;
mod types;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let config = config::Config::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;

    match cli.command {
        Some(cli::Command::Migrate) => {
            db::run_migrations(&pool).await?;
            info!("Migrations complete, exiting.");
            Ok(())
        }
        Some(cli::Command::Serve) | None => run_server(config, pool).await,
    }
}

async fn run_server(config: config::Config, pool: sqlx::PgPool) -> Result<()> {
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,dutycycle_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    info!("Starting dutycycle-worker...");

    db::run_migrations(&pool).await?;
    info!("Database migrations complete");

    let geocoder: Arc<dyn services::geocoding::Geocoder> =
        Arc::from(services::geocoding::create_geocoder(&config.nominatim_url));
    let router: Arc<dyn services::routing::Router> =
        Arc::from(services::routing::create_router(config.valhalla_url.as_deref()));
    let rest_stop_locator: Arc<dyn hos::scheduler::RestStopLocator> =
        Arc::from(services::rest_stop::create_rest_stop_locator(&config.nominatim_url));

    let state = http::AppState {
        pool,
        geocoder,
        router,
        rest_stop_locator,
        rate_limiter: Arc::new(http::default_rate_limiter()),
        config: Arc::new(config.clone()),
    };

    let app = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.http_listen_addr).await?;
    info!("Listening on {}", config.http_listen_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

//! HTTP surface: axum router assembly, shared state, and the `AuthUser`
//! bearer-token extractor. One thin handler per operation, a typed request
//! struct, auth extracted up front, database access pushed into
//! `db::queries`.

pub mod error;
pub mod extractors;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::routing::{delete, get, post};
use axum::{BoxError, Router as AxumRouter};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::http::error::AppError;
use crate::services::geocoding::Geocoder;
use crate::services::rate_limiter::{MultiRateLimiter, RateLimiterConfig};
use crate::services::routing::Router as RouterAdapter;

use crate::hos::scheduler::RestStopLocator;

/// Shared application state, cloned cheaply into every handler (everything
/// inside is already `Arc`-wrapped or `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub geocoder: Arc<dyn Geocoder>,
    pub router: Arc<dyn RouterAdapter>,
    pub rest_stop_locator: Arc<dyn RestStopLocator>,
    pub rate_limiter: Arc<MultiRateLimiter>,
    pub config: Arc<Config>,
}

/// Assemble the full axum router for the service.
pub fn build_router(state: AppState) -> AxumRouter {
    let cors = if state.config.allowed_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    let deadline = Duration::from_secs(state.config.request_deadline_seconds);

    AxumRouter::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/trips/calculate", post(handlers::trips::calculate))
        .route("/trips", get(handlers::trips::list))
        .route("/trips/:id", get(handlers::trips::get_one))
        .route("/trips/:id", delete(handlers::trips::delete))
        .route("/geocode", get(handlers::geocode::geocode))
        .layer(TraceLayer::new_for_http())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .layer(TimeoutLayer::new(deadline)),
        )
        .layer(cors)
        .with_state(state)
}

/// `tower_http::timeout::Timeout` unifies its `Elapsed` error with the
/// inner service's by boxing, so a `HandleErrorLayer` ahead of it is
/// required for the stack's `Service::Error` to satisfy axum's
/// `Into<Infallible>` bound. Maps the boxed timeout into the uniform
/// `UPSTREAM_TIMEOUT`/504 envelope.
async fn handle_timeout_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::UpstreamTimeout
    } else {
        AppError::Internal(anyhow::anyhow!("unhandled middleware error: {err}"))
    }
}

/// Shared rate-limiter buckets: one per adapter plus login.
pub fn default_rate_limiter() -> MultiRateLimiter {
    MultiRateLimiter::new(vec![
        ("geocode", RateLimiterConfig { max_attempts: 1, window_secs: 1 }),
        ("router", RateLimiterConfig { max_attempts: 5, window_secs: 1 }),
        ("auth.login", RateLimiterConfig { max_attempts: 10, window_secs: 60 }),
    ])
}

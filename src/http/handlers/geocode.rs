//! Thin geocode passthrough: lets a client resolve an address
//! to a named place without running a full trip calculation.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::hos::types::NamedPlace;
use crate::http::error::AppError;
use crate::http::extractors::AuthUser;
use crate::http::AppState;

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    pub address: String,
}

pub async fn geocode(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<GeocodeQuery>,
) -> Result<Json<NamedPlace>, AppError> {
    let deadline = std::time::Duration::from_secs(state.config.request_deadline_seconds);
    if !state.rate_limiter.acquire("geocode", "global", deadline).await {
        return Err(AppError::RateLimited);
    }

    let place = state
        .geocoder
        .geocode(&query.address)
        .await
        .map_err(|e| AppError::upstream(e, "address"))?;

    Ok(Json(place))
}

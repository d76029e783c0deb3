//! Trip calculation and storage endpoints: the core
//! "plan a compliant trip" operation, plus list/get/delete over the
//! persisted result.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use crate::db::queries::trip as trip_queries;
use crate::hos::daily_log;
use crate::hos::rules::RuleTable;
use crate::hos::scheduler;
use crate::hos::types::TripPlan;
use crate::http::error::AppError;
use crate::http::extractors::AuthUser;
use crate::http::AppState;
use crate::services::geo::timezone_for_coordinate;
use crate::services::routing::{decode_polyline, encode_polyline};
use crate::types::trip::{CalculateTripRequest, NewTrip, TripDetail, TripListItem};

const ROUTE_POLYLINE_PRECISION: u32 = 6;

/// `"geocode"` bucket key shared across all callers — it paces requests
/// against the upstream geocoding endpoint as a whole, not per caller.
const GEOCODE_BUCKET_KEY: &str = "global";

/// Stitch the two routed legs' polylines into one, dropping the duplicate
/// midpoint (mirrors the leg-stitching `ValhallaRouter::route` does within
/// a single multi-leg response).
fn combine_polylines(a: Option<&str>, b: Option<&str>) -> Option<String> {
    let a = a?;
    let b = b?;
    let mut points = decode_polyline(a, ROUTE_POLYLINE_PRECISION).ok()?;
    let mut rest = decode_polyline(b, ROUTE_POLYLINE_PRECISION).ok()?;
    if !rest.is_empty() {
        rest.remove(0);
    }
    points.append(&mut rest);
    Some(encode_polyline(&points))
}

pub async fn calculate(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CalculateTripRequest>,
) -> Result<(StatusCode, Json<TripDetail>), AppError> {
    let rules = RuleTable::property_carrying();

    if !(0.0..=rules.cycle_limit).contains(&body.current_cycle_hours) {
        return Err(AppError::Validation(format!(
            "currentCycleHours must be between 0 and {}",
            rules.cycle_limit
        )));
    }

    let deadline = std::time::Duration::from_secs(state.config.request_deadline_seconds);

    if !state.rate_limiter.acquire("router", &user.user_id.to_string(), deadline).await {
        return Err(AppError::RateLimited);
    }

    // One "geocode" slot per address: paces all three calls against the
    // shared public-endpoint bucket instead of only the standalone
    // passthrough route.
    if !state.rate_limiter.acquire("geocode", GEOCODE_BUCKET_KEY, deadline).await {
        return Err(AppError::RateLimited);
    }
    let current_place = state
        .geocoder
        .geocode(&body.current_location)
        .await
        .map_err(|e| AppError::upstream(e, "currentLocation"))?;

    if !state.rate_limiter.acquire("geocode", GEOCODE_BUCKET_KEY, deadline).await {
        return Err(AppError::RateLimited);
    }
    let pickup_place = state
        .geocoder
        .geocode(&body.pickup_location)
        .await
        .map_err(|e| AppError::upstream(e, "pickupLocation"))?;

    if !state.rate_limiter.acquire("geocode", GEOCODE_BUCKET_KEY, deadline).await {
        return Err(AppError::RateLimited);
    }
    let dropoff_place = state
        .geocoder
        .geocode(&body.dropoff_location)
        .await
        .map_err(|e| AppError::upstream(e, "dropoffLocation"))?;

    let seg_to_pickup = state
        .router
        .route(&current_place, &pickup_place)
        .await
        .map_err(|e| AppError::upstream(e, "pickupLocation"))?;
    let seg_to_dropoff = state
        .router
        .route(&pickup_place, &dropoff_place)
        .await
        .map_err(|e| AppError::upstream(e, "dropoffLocation"))?;

    let start_time = body.start_time.unwrap_or_else(Utc::now);

    let plan = TripPlan {
        start_time,
        start_place: current_place.clone(),
        pickup_place: pickup_place.clone(),
        dropoff_place: dropoff_place.clone(),
        seg_to_pickup: seg_to_pickup.clone(),
        seg_to_dropoff: seg_to_dropoff.clone(),
        opening_cycle_hours: body.current_cycle_hours,
    };

    let output = scheduler::run(&plan, &rules, state.rest_stop_locator.as_ref())
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let timezone = timezone_for_coordinate(current_place.coordinate);
    let daily_logs = daily_log::project(&output.activities, timezone)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    let polyline = combine_polylines(seg_to_pickup.polyline.as_deref(), seg_to_dropoff.polyline.as_deref());

    let new_trip = NewTrip {
        owner_id: user.user_id,
        current_location_place: current_place,
        pickup_location_place: pickup_place,
        dropoff_location_place: dropoff_place,
        starting_cycle_hours: body.current_cycle_hours,
        polyline,
        seg_to_pickup,
        seg_to_dropoff,
        stops: output.stops,
        daily_logs,
        summary: output.summary,
    };

    let detail = trip_queries::insert(&state.pool, &new_trip).await.map_err(AppError::Internal)?;

    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<TripListItem>>, AppError> {
    let trips = trip_queries::list_by_owner(&state.pool, user.user_id)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(trips))
}

pub async fn get_one(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TripDetail>, AppError> {
    let trip = trip_queries::get_by_id_for_owner(&state.pool, id, user.user_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;
    Ok(Json(trip))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = trip_queries::delete_by_id_for_owner(&state.pool, id, user.user_id)
        .await
        .map_err(AppError::Internal)?;
    if !deleted {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

//! Trip (persisted aggregate) types.
//!
//! A `Trip` is produced once by a `calculate` call and never partially
//! updated — the row types below mirror `hos::types` one-to-one, with the
//! scheduler's plain structs wrapped in `sqlx::types::Json` for storage.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::hos::types::{
    DailyLedger, DutyStatus, LedgerEntry, NamedPlace, Remark, RouteSegment, Stop, StopKind,
    TripSummary,
};

/// The `trips` row: input addresses, geocoded places, routed segments, and
/// the summary fields.
#[derive(Debug, Clone, FromRow)]
pub struct TripRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub current_location_address: String,
    pub current_location_place: Json<NamedPlace>,
    pub pickup_location_address: String,
    pub pickup_location_place: Json<NamedPlace>,
    pub dropoff_location_address: String,
    pub dropoff_location_place: Json<NamedPlace>,
    pub starting_cycle_hours: f64,
    pub polyline: Option<String>,
    pub seg_to_pickup: Json<RouteSegment>,
    pub seg_to_dropoff: Json<RouteSegment>,
    pub total_distance_miles: f64,
    pub total_driving_hours: f64,
    pub total_days: i32,
    pub cycle_hours_used: f64,
    pub cycle_hours_remaining: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub stop_counts: Json<BTreeMap<String, u32>>,
    pub created_at: DateTime<Utc>,
}

/// Truncated projection for `GET /trips`.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripListItem {
    pub id: Uuid,
    pub current_location_address: String,
    pub pickup_location_address: String,
    pub dropoff_location_address: String,
    pub total_distance_miles: f64,
    pub total_driving_hours: f64,
    pub total_days: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A `trip_stops` row.
#[derive(Debug, Clone, FromRow)]
pub struct TripStopRow {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub ordinal: i32,
    pub kind: Json<StopKind>,
    pub place: Json<NamedPlace>,
    pub arrival: DateTime<Utc>,
    pub departure: DateTime<Utc>,
    pub duration_minutes: i64,
    pub activity_text: String,
    pub duty_status: Json<DutyStatus>,
}

impl From<&Stop> for TripStopRowNew {
    fn from(stop: &Stop) -> Self {
        Self {
            ordinal: stop.ordinal as i32,
            kind: Json(stop.kind),
            place: Json(stop.place.clone()),
            arrival: stop.arrival,
            departure: stop.departure,
            duration_minutes: stop.duration_minutes,
            activity_text: stop.activity_text.clone(),
            duty_status: Json(stop.duty_status),
        }
    }
}

impl From<TripStopRow> for Stop {
    fn from(row: TripStopRow) -> Self {
        Self {
            ordinal: row.ordinal as u32,
            kind: row.kind.0,
            place: row.place.0,
            arrival: row.arrival,
            departure: row.departure,
            duration_minutes: row.duration_minutes,
            activity_text: row.activity_text,
            duty_status: row.duty_status.0,
        }
    }
}

/// The subset of `TripStopRow` needed on insert, before a row id/trip_id
/// is assigned by the store.
#[derive(Debug, Clone)]
pub struct TripStopRowNew {
    pub ordinal: i32,
    pub kind: Json<StopKind>,
    pub place: Json<NamedPlace>,
    pub arrival: DateTime<Utc>,
    pub departure: DateTime<Utc>,
    pub duration_minutes: i64,
    pub activity_text: String,
    pub duty_status: Json<DutyStatus>,
}

/// A `trip_daily_logs` row.
#[derive(Debug, Clone, FromRow)]
pub struct TripDailyLogRow {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub day_number: i32,
    pub date: NaiveDate,
    pub timezone: String,
    pub off_duty_hours: f64,
    pub sleeper_hours: f64,
    pub driving_hours: f64,
    pub on_duty_hours: f64,
    pub start_location: String,
    pub end_location: String,
    pub entries: Json<Vec<LedgerEntry>>,
    pub remarks: Json<Vec<Remark>>,
}

impl From<&DailyLedger> for TripDailyLogRowNew {
    fn from(ledger: &DailyLedger) -> Self {
        Self {
            day_number: ledger.day_number as i32,
            date: ledger.date,
            timezone: ledger.timezone.clone(),
            off_duty_hours: ledger.off_duty_hours,
            sleeper_hours: ledger.sleeper_hours,
            driving_hours: ledger.driving_hours,
            on_duty_hours: ledger.on_duty_hours,
            start_location: ledger.start_location.clone(),
            end_location: ledger.end_location.clone(),
            entries: Json(ledger.entries.clone()),
            remarks: Json(ledger.remarks.clone()),
        }
    }
}

impl From<TripDailyLogRow> for DailyLedger {
    fn from(row: TripDailyLogRow) -> Self {
        Self {
            date: row.date,
            day_number: row.day_number as u32,
            timezone: row.timezone,
            off_duty_hours: row.off_duty_hours,
            sleeper_hours: row.sleeper_hours,
            driving_hours: row.driving_hours,
            on_duty_hours: row.on_duty_hours,
            start_location: row.start_location,
            end_location: row.end_location,
            entries: row.entries.0,
            remarks: row.remarks.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TripDailyLogRowNew {
    pub day_number: i32,
    pub date: NaiveDate,
    pub timezone: String,
    pub off_duty_hours: f64,
    pub sleeper_hours: f64,
    pub driving_hours: f64,
    pub on_duty_hours: f64,
    pub start_location: String,
    pub end_location: String,
    pub entries: Json<Vec<LedgerEntry>>,
    pub remarks: Json<Vec<Remark>>,
}

/// Input to `db::queries::trip::insert` — everything a `calculate` call
/// produces, not yet assigned an id or `created_at`.
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub owner_id: Uuid,
    pub current_location_place: NamedPlace,
    pub pickup_location_place: NamedPlace,
    pub dropoff_location_place: NamedPlace,
    pub starting_cycle_hours: f64,
    pub polyline: Option<String>,
    pub seg_to_pickup: RouteSegment,
    pub seg_to_dropoff: RouteSegment,
    pub stops: Vec<Stop>,
    pub daily_logs: Vec<DailyLedger>,
    pub summary: TripSummary,
}

/// The full assembled trip returned by `GET /trips/{id}` and by
/// `calculate`'s response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDetail {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub current_location_address: String,
    pub current_location_place: NamedPlace,
    pub pickup_location_address: String,
    pub pickup_location_place: NamedPlace,
    pub dropoff_location_address: String,
    pub dropoff_location_place: NamedPlace,
    pub starting_cycle_hours: f64,
    pub polyline: Option<String>,
    pub seg_to_pickup: RouteSegment,
    pub seg_to_dropoff: RouteSegment,
    pub stops: Vec<Stop>,
    pub daily_logs: Vec<DailyLedger>,
    pub summary: TripSummary,
    pub created_at: DateTime<Utc>,
}

impl TripDetail {
    pub fn from_rows(row: TripRow, stops: Vec<TripStopRow>, logs: Vec<TripDailyLogRow>) -> Self {
        let mut stop_counts = BTreeMap::new();
        for (kind, count) in row.stop_counts.0.clone() {
            stop_counts.insert(kind, count);
        }

        Self {
            id: row.id,
            owner_id: row.owner_id,
            current_location_address: row.current_location_address,
            current_location_place: row.current_location_place.0,
            pickup_location_address: row.pickup_location_address,
            pickup_location_place: row.pickup_location_place.0,
            dropoff_location_address: row.dropoff_location_address,
            dropoff_location_place: row.dropoff_location_place.0,
            starting_cycle_hours: row.starting_cycle_hours,
            polyline: row.polyline,
            seg_to_pickup: row.seg_to_pickup.0,
            seg_to_dropoff: row.seg_to_dropoff.0,
            stops: stops.into_iter().map(Stop::from).collect(),
            daily_logs: logs.into_iter().map(DailyLedger::from).collect(),
            summary: TripSummary {
                total_distance_miles: row.total_distance_miles,
                total_driving_hours: row.total_driving_hours,
                total_days: row.total_days as u32,
                cycle_hours_used: row.cycle_hours_used,
                cycle_hours_remaining: row.cycle_hours_remaining,
                start_time: row.start_time,
                end_time: row.end_time,
                stop_counts,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateTripRequest {
    pub current_location: String,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub current_cycle_hours: f64,
    pub start_time: Option<DateTime<Utc>>,
}

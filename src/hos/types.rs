//! Shared data model for the HOS scheduler and daily-log projector.
//!
//! These types are pure data — no I/O, no database mapping. `db::queries`
//! and `http::handlers` translate to/from these at the edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decimal-degree coordinate, six fractional digits of precision
/// (~11 cm), per spec.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn rounded(self) -> Self {
        Self {
            lat: (self.lat * 1_000_000.0).round() / 1_000_000.0,
            lng: (self.lng * 1_000_000.0).round() / 1_000_000.0,
        }
    }
}

/// An address resolved to coordinates with a canonical display name.
/// Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPlace {
    pub address: String,
    pub coordinate: Coordinate,
    pub display_name: String,
}

/// One leg of the route, as produced by the Router adapter and consumed by
/// the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub origin: NamedPlace,
    pub destination: NamedPlace,
    pub distance_miles: f64,
    pub duration_hours: f64,
    pub polyline: Option<String>,
}

impl RouteSegment {
    /// Average driving speed implied by this segment's distance/duration.
    /// Zero-duration segments (pickup == start) report 0 and are never
    /// divided into — `drive_segment` short-circuits on `hours_remaining == 0`.
    pub fn average_speed_mph(&self) -> f64 {
        if self.duration_hours <= 0.0 {
            0.0
        } else {
            self.distance_miles / self.duration_hours
        }
    }
}

/// The four duty statuses that partition every minute of every day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DutyStatus {
    OffDuty,
    SleeperBerth,
    Driving,
    OnDutyNotDriving,
}

/// The kind of a named stop event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    Start,
    Pickup,
    Dropoff,
    Fuel,
    Break30Min,
    Rest10Hr,
    Restart34Hr,
    EndPostTrip,
}

/// A named, time-bounded event along the trip that is not continuous
/// driving (though START/PICKUP/DROPOFF/END bracket driving segments).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub ordinal: u32,
    pub kind: StopKind,
    pub place: NamedPlace,
    pub arrival: DateTime<Utc>,
    pub departure: DateTime<Utc>,
    pub duration_minutes: i64,
    pub activity_text: String,
    pub duty_status: DutyStatus,
}

/// A contiguous time interval with a single duty status. Activities tile
/// the entire trip time-axis from first event to last with no gaps — the
/// scheduler emits an `OffDuty` activity to fill any gap between working
/// periods.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub status: DutyStatus,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub description: String,
    pub place: Option<NamedPlace>,
}

impl Activity {
    pub fn duration_hours(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 3600.0
    }
}

/// One entry in a daily ledger: a status interval clipped to the calendar
/// day, with the clock times (not full timestamps) it spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub status: DutyStatus,
    pub start: chrono::NaiveTime,
    pub end: chrono::NaiveTime,
    pub location: String,
    pub activity: Option<String>,
}

/// A single remark line for the daily log: "HH:MM — <desc> (<place>)".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remark {
    pub time: chrono::NaiveTime,
    pub location: String,
    pub activity: String,
}

/// One calendar day's duty-status accounting, suitable for rendering an
/// official daily log sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLedger {
    pub date: chrono::NaiveDate,
    pub day_number: u32,
    pub timezone: String,
    pub off_duty_hours: f64,
    pub sleeper_hours: f64,
    pub driving_hours: f64,
    pub on_duty_hours: f64,
    pub start_location: String,
    pub end_location: String,
    pub entries: Vec<LedgerEntry>,
    pub remarks: Vec<Remark>,
}

/// Aggregate statistics over the whole trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub total_distance_miles: f64,
    pub total_driving_hours: f64,
    pub total_days: u32,
    pub cycle_hours_used: f64,
    pub cycle_hours_remaining: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub stop_counts: std::collections::BTreeMap<String, u32>,
}

/// Input to the scheduler: a fully routed two-segment trip plan.
#[derive(Debug, Clone)]
pub struct TripPlan {
    pub start_time: DateTime<Utc>,
    pub start_place: NamedPlace,
    pub pickup_place: NamedPlace,
    pub dropoff_place: NamedPlace,
    pub seg_to_pickup: RouteSegment,
    pub seg_to_dropoff: RouteSegment,
    pub opening_cycle_hours: f64,
}

/// Everything the scheduler produces for one `calculate` call.
#[derive(Debug, Clone)]
pub struct ScheduleOutput {
    pub stops: Vec<Stop>,
    pub activities: Vec<Activity>,
    pub summary: TripSummary,
}

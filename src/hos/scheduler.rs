//! The HOS scheduler: a deterministic state machine that walks a two-segment
//! routed trip (start→pickup, pickup→dropoff) and emits a legal FMCSA
//! property-carrying-driver duty schedule.
//!
//! Mirrors the shape of `services::sequential_schedule` (plain input/output
//! structs, a time cursor advanced by small helper functions, numbered
//! "rules" in the doc comments) but the policy it enforces — four
//! simultaneously-active HOS limits instead of dispatch ETAs — is new.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::rules::RuleTable;
use super::types::{
    Activity, DutyStatus, NamedPlace, RouteSegment, ScheduleOutput, Stop, StopKind, TripPlan,
    TripSummary,
};
use crate::services::routing::interpolate_along_segment;

/// Tolerance for the float comparisons against hour/mile limits. An hour's
/// worth of wall-clock drift at this scale is a few microseconds — anything
/// below this is treated as "at the limit", not "under the limit".
const EPS: f64 = 1e-6;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("opening_cycle_hours must be between 0 and {limit}, got {got}")]
    InvalidOpeningCycleHours { got: f64, limit: f64 },
}

/// Looks up a plausible named stop near a point along the route. Advisory
/// only — HOS accounting never depends on this returning `Some`.
#[async_trait]
pub trait RestStopLocator: Send + Sync {
    async fn locate(&self, near: crate::hos::types::Coordinate, kind: StopKind) -> Option<NamedPlace>;
}

/// A locator that never finds anything; the scheduler falls back to a
/// synthetic placeholder name. Useful for tests and for deployments without
/// a reverse-geocoding backend configured.
pub struct NullRestStopLocator;

#[async_trait]
impl RestStopLocator for NullRestStopLocator {
    async fn locate(&self, _near: crate::hos::types::Coordinate, _kind: StopKind) -> Option<NamedPlace> {
        None
    }
}

struct SchedulerState {
    now: DateTime<Utc>,
    drive_today: f64,
    window_start: Option<DateTime<Utc>>,
    drive_since_break: f64,
    cycle_used: f64,
    miles_since_fuel: f64,
    position: NamedPlace,
    stops: Vec<Stop>,
    activities: Vec<Activity>,
    next_ordinal: u32,
}

/// Why a REST_10HR was triggered — recorded in the stop's activity text so
/// boundary-case tests can assert which counter bound first
/// when driving-limit and window-limit are exhausted at the same instant.
enum RestCause {
    Window,
    DrivingLimit,
}

impl SchedulerState {
    fn push_activity(&mut self, status: DutyStatus, start: DateTime<Utc>, end: DateTime<Utc>, description: impl Into<String>, place: Option<NamedPlace>) {
        self.activities.push(Activity {
            status,
            start,
            end,
            description: description.into(),
            place,
        });
    }

    fn push_stop(&mut self, kind: StopKind, place: NamedPlace, arrival: DateTime<Utc>, departure: DateTime<Utc>, status: DutyStatus, activity_text: impl Into<String>) {
        let activity_text = activity_text.into();
        let duration_minutes = round_to_minute((departure - arrival).num_seconds() as f64 / 60.0);
        self.stops.push(Stop {
            ordinal: self.next_ordinal,
            kind,
            place,
            arrival,
            departure,
            duration_minutes,
            activity_text,
            duty_status: status,
        });
        self.next_ordinal += 1;
    }

    /// Fixed-duration on-duty block: pre/post-trip inspection, pickup,
    /// dropoff, fueling, or the 30-minute break. Counts fully against the
    /// rolling 70-hour cycle — the cycle tracks all on-duty and driving
    /// time, not driving alone (see DESIGN.md).
    fn on_duty_block(&mut self, kind: StopKind, duration_hours: f64, activity_text: &str, place: NamedPlace) {
        if self.window_start.is_none() {
            self.window_start = Some(self.now);
        }
        let start = self.now;
        let end = start + chrono::Duration::milliseconds((duration_hours * 3_600_000.0).round() as i64);
        self.push_activity(DutyStatus::OnDutyNotDriving, start, end, activity_text, Some(place.clone()));
        self.push_stop(kind, place, start, end, DutyStatus::OnDutyNotDriving, activity_text);
        self.cycle_used += duration_hours;
        self.now = end;
    }

    /// Off-duty block: a 10-hour reset or a 34-hour restart. Resets the
    /// counters the block is meant to reset and closes the on-duty window.
    fn off_duty_block(&mut self, kind: StopKind, duration_hours: f64, activity_text: &str, place: NamedPlace) {
        let start = self.now;
        let end = start + chrono::Duration::milliseconds((duration_hours * 3_600_000.0).round() as i64);
        self.push_activity(DutyStatus::OffDuty, start, end, activity_text, Some(place.clone()));
        self.push_stop(kind, place, start, end, DutyStatus::OffDuty, activity_text);
        self.now = end;
        self.window_start = None;
    }
}

fn round_to_minute(minutes: f64) -> i64 {
    // Round-half-to-even at one-minute resolution.
    let rounded = (minutes / 1.0).round_ties_even();
    rounded as i64
}

/// Run the HOS scheduler end to end for one two-segment trip.
pub async fn run(
    plan: &TripPlan,
    rules: &RuleTable,
    locator: &dyn RestStopLocator,
) -> Result<ScheduleOutput, SchedulerError> {
    if !(0.0..=rules.cycle_limit).contains(&plan.opening_cycle_hours) {
        return Err(SchedulerError::InvalidOpeningCycleHours {
            got: plan.opening_cycle_hours,
            limit: rules.cycle_limit,
        });
    }

    let mut st = SchedulerState {
        now: plan.start_time,
        drive_today: 0.0,
        window_start: None,
        drive_since_break: 0.0,
        cycle_used: plan.opening_cycle_hours,
        miles_since_fuel: 0.0,
        position: plan.start_place.clone(),
        stops: Vec::new(),
        activities: Vec::new(),
        next_ordinal: 1,
    };

    // Initialization: an already-exhausted cycle forces an immediate restart
    // before the trip can begin.
    maybe_restart(&mut st, rules, locator).await;

    // 1. START — pre-trip inspection.
    st.on_duty_block(
        StopKind::Start,
        rules.pre_trip,
        "Pre-trip inspection",
        plan.start_place.clone(),
    );

    // 2. Drive start → pickup.
    drive_segment(&mut st, rules, &plan.seg_to_pickup, locator).await;

    // 3. PICKUP.
    st.on_duty_block(
        StopKind::Pickup,
        rules.pickup,
        "Loading at pickup",
        plan.pickup_place.clone(),
    );

    // 4. Drive pickup → dropoff.
    drive_segment(&mut st, rules, &plan.seg_to_dropoff, locator).await;

    // 5. DROPOFF.
    st.on_duty_block(
        StopKind::Dropoff,
        rules.dropoff,
        "Unloading at dropoff",
        plan.dropoff_place.clone(),
    );

    // 6. END_POST_TRIP.
    st.on_duty_block(
        StopKind::EndPostTrip,
        rules.post_trip,
        "Post-trip inspection",
        plan.dropoff_place.clone(),
    );
    st.window_start = None;

    let total_distance = plan.seg_to_pickup.distance_miles + plan.seg_to_dropoff.distance_miles;
    let total_driving_hours: f64 = st
        .activities
        .iter()
        .filter(|a| a.status == DutyStatus::Driving)
        .map(|a| a.duration_hours())
        .sum();

    let mut stop_counts: std::collections::BTreeMap<String, u32> = std::collections::BTreeMap::new();
    for stop in &st.stops {
        *stop_counts.entry(format!("{:?}", stop.kind)).or_insert(0) += 1;
    }

    let summary = TripSummary {
        total_distance_miles: total_distance,
        total_driving_hours,
        total_days: count_calendar_days(&st.activities),
        cycle_hours_used: plan.opening_cycle_hours,
        cycle_hours_remaining: (rules.cycle_limit - st.cycle_used).max(0.0),
        start_time: plan.start_time,
        end_time: st.now,
        stop_counts,
    };

    Ok(ScheduleOutput {
        stops: st.stops,
        activities: st.activities,
        summary,
    })
}

fn count_calendar_days(activities: &[Activity]) -> u32 {
    use std::collections::BTreeSet;
    let mut days = BTreeSet::new();
    for a in activities {
        days.insert(a.start.date_naive());
        days.insert((a.end - chrono::Duration::nanoseconds(1)).date_naive());
    }
    days.len().max(1) as u32
}

/// Drive the given segment to completion, inserting RESTART_34HR,
/// REST_10HR, BREAK_30MIN, and FUEL stops as the four HOS limits require.
async fn drive_segment(
    st: &mut SchedulerState,
    rules: &RuleTable,
    segment: &RouteSegment,
    locator: &dyn RestStopLocator,
) {
    if segment.duration_hours <= EPS || segment.distance_miles <= EPS {
        return;
    }

    let speed = segment.average_speed_mph();
    let mut hours_remaining = segment.duration_hours;
    let mut miles_traveled = 0.0_f64;

    while hours_remaining > EPS {
        if st.window_start.is_none() {
            st.window_start = Some(st.now);
        }
        let window_start = st.window_start.unwrap();
        let elapsed_window = (st.now - window_start).num_seconds() as f64 / 3600.0;

        let available = (rules.driving_limit - st.drive_today)
            .max(0.0)
            .min((rules.on_duty_window - elapsed_window).max(0.0))
            .min((rules.break_after - st.drive_since_break).max(0.0))
            .min((rules.cycle_limit - st.cycle_used).max(0.0));

        if available <= EPS {
            resolve_binding_limit(st, rules, elapsed_window, locator).await;
            continue;
        }

        // Fueling check: only when a full fueling block fits in what's
        // available this iteration; otherwise it is deferred to the next.
        if st.miles_since_fuel >= rules.fuel_interval_miles - EPS && available >= rules.fueling - EPS {
            let fuel_place = snap(st, locator, StopKind::Fuel).await;
            st.on_duty_block(StopKind::Fuel, rules.fueling, "Refueling", fuel_place.clone());
            st.position = fuel_place;
            st.miles_since_fuel = 0.0;
            continue;
        }

        let miles_to_next_fuel_checkpoint = if st.miles_since_fuel < rules.fuel_interval_miles && speed > EPS {
            (rules.fuel_interval_miles - st.miles_since_fuel) / speed
        } else {
            f64::INFINITY
        };

        let t = available.min(hours_remaining).min(miles_to_next_fuel_checkpoint);
        if t <= EPS {
            // By construction `available > EPS` here (the real-exhaustion
            // check above already handled `available <= EPS`), so the only
            // way `t` collapses to zero is `miles_to_next_fuel_checkpoint`
            // being ~0: the 1000-mile interval is reached but this window's
            // remaining capacity is too small to fit a full fueling stop.
            // None of cycle/drive/window are actually exhausted, so fuel now
            // instead of routing through `resolve_binding_limit` (which would
            // fall through to its break-only branch and insert an
            // unjustified BREAK_30MIN).
            if miles_to_next_fuel_checkpoint <= EPS {
                let fuel_place = snap(st, locator, StopKind::Fuel).await;
                st.on_duty_block(StopKind::Fuel, rules.fueling, "Refueling", fuel_place.clone());
                st.position = fuel_place;
                st.miles_since_fuel = 0.0;
                continue;
            }
            resolve_binding_limit(st, rules, elapsed_window, locator).await;
            continue;
        }

        let miles_this_chunk = t * speed;
        let start = st.now;
        let end = start + chrono::Duration::milliseconds((t * 3_600_000.0).round() as i64);

        st.drive_today += t;
        st.drive_since_break += t;
        st.cycle_used += t;
        st.miles_since_fuel += miles_this_chunk;
        miles_traveled += miles_this_chunk;
        hours_remaining -= t;

        let fraction = (miles_traveled / segment.distance_miles).min(1.0);
        let position = interpolate_along_segment(segment, fraction);
        st.position = NamedPlace {
            address: segment.destination.address.clone(),
            coordinate: position,
            display_name: format!("En route toward {}", segment.destination.display_name),
        };

        st.push_activity(DutyStatus::Driving, start, end, "Driving", Some(st.position.clone()));
        st.now = end;
    }
}

/// Resolve whichever HOS limit is bound, in strict priority order: cycle
/// exhaustion first, then driving-limit/window exhaustion, then the
/// 30-minute break.
async fn resolve_binding_limit(
    st: &mut SchedulerState,
    rules: &RuleTable,
    elapsed_window: f64,
    locator: &dyn RestStopLocator,
) {
    if st.cycle_used >= rules.cycle_limit - EPS {
        maybe_restart(st, rules, locator).await;
        return;
    }

    let window_exhausted = elapsed_window >= rules.on_duty_window - EPS;
    let driving_exhausted = st.drive_today >= rules.driving_limit - EPS;
    if driving_exhausted || window_exhausted {
        // When both bind at the same instant, the window is recorded as the
        // proximate cause.
        let cause = if window_exhausted {
            RestCause::Window
        } else {
            RestCause::DrivingLimit
        };
        let text = match cause {
            RestCause::Window => "10-hour reset (14-hour on-duty window reached)",
            RestCause::DrivingLimit => "10-hour reset (11-hour driving limit reached)",
        };
        let place = snap(st, locator, StopKind::Rest10Hr).await;
        st.off_duty_block(StopKind::Rest10Hr, rules.off_duty_reset, text, place.clone());
        st.position = place;
        st.drive_today = 0.0;
        st.drive_since_break = 0.0;
        return;
    }

    // Only the break limit binds.
    let place = snap(st, locator, StopKind::Break30Min).await;
    let start = st.now;
    let end = start + chrono::Duration::milliseconds((rules.break_duration * 3_600_000.0).round() as i64);
    st.push_activity(DutyStatus::OnDutyNotDriving, start, end, "30-minute break", Some(place.clone()));
    st.push_stop(StopKind::Break30Min, place.clone(), start, end, DutyStatus::OnDutyNotDriving, "30-minute break");
    st.cycle_used += rules.break_duration;
    st.now = end;
    st.position = place;
    st.drive_since_break = 0.0;
}

async fn maybe_restart(st: &mut SchedulerState, rules: &RuleTable, locator: &dyn RestStopLocator) {
    if st.cycle_used < rules.cycle_limit - EPS {
        return;
    }
    let place = snap(st, locator, StopKind::Restart34Hr).await;
    st.off_duty_block(
        StopKind::Restart34Hr,
        rules.restart_duration,
        "34-hour restart",
        place.clone(),
    );
    st.position = place;
    st.cycle_used = 0.0;
    st.drive_today = 0.0;
    st.drive_since_break = 0.0;
}

/// Ask the rest-stop locator to snap the current interpolated position to a
/// named place; falls back to a synthetic placeholder. Never fatal.
async fn snap(st: &SchedulerState, locator: &dyn RestStopLocator, kind: StopKind) -> NamedPlace {
    match locator.locate(st.position.coordinate, kind).await {
        Some(place) => place,
        None => NamedPlace {
            address: String::new(),
            coordinate: st.position.coordinate,
            display_name: format!(
                "Rest Area near {:.4},{:.4}",
                st.position.coordinate.lat, st.position.coordinate.lng
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hos::types::Coordinate;

    fn place(name: &str, lat: f64, lng: f64) -> NamedPlace {
        NamedPlace {
            address: name.to_string(),
            coordinate: Coordinate { lat, lng },
            display_name: name.to_string(),
        }
    }

    fn seg(origin: NamedPlace, destination: NamedPlace, miles: f64, hours: f64) -> RouteSegment {
        RouteSegment {
            origin,
            destination,
            distance_miles: miles,
            duration_hours: hours,
            polyline: None,
        }
    }

    fn start_time() -> DateTime<Utc> {
        "2026-01-17T12:30:00Z".parse().unwrap()
    }

    // S1: short trip, no breaks/rests/fuel.
    #[tokio::test]
    async fn s1_short_trip_has_only_the_four_bracket_stops() {
        let chicago = place("Chicago, IL", 41.8781, -87.6298);
        let milwaukee = place("Milwaukee, WI", 43.0389, -87.9065);
        let madison = place("Madison, WI", 43.0731, -89.4012);

        let plan = TripPlan {
            start_time: start_time(),
            start_place: chicago.clone(),
            pickup_place: milwaukee.clone(),
            dropoff_place: madison.clone(),
            seg_to_pickup: seg(chicago, milwaukee, 93.0, 1.75),
            seg_to_dropoff: seg(milwaukee, madison, 80.0, 1.5),
            opening_cycle_hours: 10.0,
        };

        let out = run(&plan, &RuleTable::default(), &NullRestStopLocator)
            .await
            .unwrap();

        assert_eq!(out.stops.len(), 4);
        assert_eq!(out.stops[0].kind, StopKind::Start);
        assert_eq!(out.stops[1].kind, StopKind::Pickup);
        assert_eq!(out.stops[2].kind, StopKind::Dropoff);
        assert_eq!(out.stops[3].kind, StopKind::EndPostTrip);
        assert!((out.summary.total_driving_hours - 3.25).abs() < 0.01);

        for w in out.stops.windows(2) {
            assert!(w[1].arrival >= w[0].departure);
            assert_eq!(w[1].ordinal, w[0].ordinal + 1);
        }
    }

    // Boundary: opening_cycle_hours = 70 triggers an immediate restart.
    #[tokio::test]
    async fn opening_at_cycle_limit_triggers_immediate_restart() {
        let a = place("A", 40.0, -90.0);
        let b = place("B", 40.0, -90.5);
        let c = place("C", 40.0, -91.0);

        let plan = TripPlan {
            start_time: start_time(),
            start_place: a.clone(),
            pickup_place: b.clone(),
            dropoff_place: c.clone(),
            seg_to_pickup: seg(a, b, 30.0, 0.5),
            seg_to_dropoff: seg(b, c, 30.0, 0.5),
            opening_cycle_hours: 70.0,
        };

        let out = run(&plan, &RuleTable::default(), &NullRestStopLocator)
            .await
            .unwrap();

        assert_eq!(out.stops[0].kind, StopKind::Restart34Hr);
        assert_eq!(out.stops[0].duration_minutes, 34 * 60);
    }

    #[tokio::test]
    async fn opening_cycle_hours_out_of_range_is_rejected() {
        let a = place("A", 40.0, -90.0);
        let plan = TripPlan {
            start_time: start_time(),
            start_place: a.clone(),
            pickup_place: a.clone(),
            dropoff_place: a.clone(),
            seg_to_pickup: seg(a.clone(), a.clone(), 0.0, 0.0),
            seg_to_dropoff: seg(a.clone(), a, 0.0, 0.0),
            opening_cycle_hours: 71.0,
        };

        let err = run(&plan, &RuleTable::default(), &NullRestStopLocator)
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidOpeningCycleHours { .. }));
    }

    // Segment of exactly 8.0h driving triggers exactly one break, no rest.
    #[tokio::test]
    async fn eight_hour_segment_triggers_one_break_not_a_rest() {
        let a = place("A", 40.0, -90.0);
        let b = place("B", 40.0, -95.0);

        let plan = TripPlan {
            start_time: start_time(),
            start_place: a.clone(),
            pickup_place: b.clone(),
            dropoff_place: b.clone(),
            seg_to_pickup: seg(a, b.clone(), 400.0, 8.0),
            seg_to_dropoff: seg(b.clone(), b, 0.0, 0.0),
            opening_cycle_hours: 0.0,
        };

        let out = run(&plan, &RuleTable::default(), &NullRestStopLocator)
            .await
            .unwrap();

        let break_count = out.stops.iter().filter(|s| s.kind == StopKind::Break30Min).count();
        let rest_count = out.stops.iter().filter(|s| s.kind == StopKind::Rest10Hr).count();
        assert_eq!(break_count, 1);
        assert_eq!(rest_count, 0);
    }

    // Medium trip (S2): 20h driving total, opening cycle 25h — expect at
    // least one break and one rest, no restart (25+20 < 70).
    #[tokio::test]
    async fn s2_medium_trip_breaks_and_rests_but_no_restart() {
        let a = place("A", 40.0, -90.0);
        let b = place("B", 41.0, -95.0);
        let c = place("C", 42.0, -100.0);

        let plan = TripPlan {
            start_time: start_time(),
            start_place: a.clone(),
            pickup_place: b.clone(),
            dropoff_place: c.clone(),
            seg_to_pickup: seg(a, b.clone(), 600.0, 10.0),
            seg_to_dropoff: seg(b, c, 600.0, 10.0),
            opening_cycle_hours: 25.0,
        };

        let out = run(&plan, &RuleTable::default(), &NullRestStopLocator)
            .await
            .unwrap();

        let break_count = out.stops.iter().filter(|s| s.kind == StopKind::Break30Min).count();
        let rest_count = out.stops.iter().filter(|s| s.kind == StopKind::Rest10Hr).count();
        let restart_count = out.stops.iter().filter(|s| s.kind == StopKind::Restart34Hr).count();
        assert!(break_count >= 1);
        assert!(rest_count >= 1);
        assert_eq!(restart_count, 0);
    }

    // S3: cycle-boundary restart mid-trip.
    #[tokio::test]
    async fn s3_restart_mid_trip_closes_under_bound() {
        let a = place("A", 40.0, -90.0);
        let b = place("B", 42.0, -100.0);

        let plan = TripPlan {
            start_time: start_time(),
            start_place: a.clone(),
            pickup_place: b.clone(),
            dropoff_place: b.clone(),
            seg_to_pickup: seg(a, b.clone(), 600.0, 10.0),
            seg_to_dropoff: seg(b.clone(), b, 0.0, 0.0),
            opening_cycle_hours: 65.0,
        };

        let out = run(&plan, &RuleTable::default(), &NullRestStopLocator)
            .await
            .unwrap();

        let restarts: Vec<_> = out.stops.iter().filter(|s| s.kind == StopKind::Restart34Hr).collect();
        assert_eq!(restarts.len(), 1);
        assert!(out.summary.cycle_hours_remaining >= rules_default_remaining_floor());
    }

    fn rules_default_remaining_floor() -> f64 {
        RuleTable::default().cycle_limit - 10.0
    }

    // Universal invariant: driving activities never adjacent without an
    // intervening non-driving gap, and every activity tiles with no gaps.
    #[tokio::test]
    async fn activities_tile_with_no_gaps() {
        let a = place("A", 40.0, -90.0);
        let b = place("B", 41.0, -95.0);
        let c = place("C", 42.0, -100.0);

        let plan = TripPlan {
            start_time: start_time(),
            start_place: a.clone(),
            pickup_place: b.clone(),
            dropoff_place: c.clone(),
            seg_to_pickup: seg(a, b.clone(), 600.0, 10.0),
            seg_to_dropoff: seg(b, c, 600.0, 10.0),
            opening_cycle_hours: 25.0,
        };

        let out = run(&plan, &RuleTable::default(), &NullRestStopLocator)
            .await
            .unwrap();

        for w in out.activities.windows(2) {
            assert_eq!(w[0].end, w[1].start, "activities must tile with no gaps");
        }
    }

    // Pickup identical to start: zero-distance segment drives nothing.
    #[tokio::test]
    async fn zero_distance_segment_emits_no_driving() {
        let a = place("A", 40.0, -90.0);
        let b = place("B", 41.0, -95.0);

        let plan = TripPlan {
            start_time: start_time(),
            start_place: a.clone(),
            pickup_place: a.clone(),
            dropoff_place: b.clone(),
            seg_to_pickup: seg(a.clone(), a.clone(), 0.0, 0.0),
            seg_to_dropoff: seg(a, b.clone(), 300.0, 5.0),
            opening_cycle_hours: 0.0,
        };

        let out = run(&plan, &RuleTable::default(), &NullRestStopLocator)
            .await
            .unwrap();

        let driving_before_pickup = out
            .activities
            .iter()
            .take_while(|a| a.place.as_ref().map(|p| p.address != "B") .unwrap_or(true))
            .filter(|a| a.status == DutyStatus::Driving)
            .count();
        assert_eq!(driving_before_pickup, 0);
    }
}

//! Daily-log Projector: splits the scheduler's contiguous
//! `Activity` tiling at calendar-day boundaries in a single fixed reference
//! timezone and produces one `DailyLedger` per day, each entry bucket
//! summing to 24h within a one-minute epsilon.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use super::types::{Activity, DailyLedger, DutyStatus, LedgerEntry, Remark};

/// One minute, expressed in fractional hours — the tolerance for the
/// "sums to 24h" invariant.
const DAY_SUM_EPSILON_HOURS: f64 = 1.0 / 60.0;

#[derive(Debug, thiserror::Error)]
pub enum ProjectorError {
    #[error("daily ledger for {date} sums to {total:.4}h, expected 24h ± {epsilon}h")]
    DayDoesNotSumTo24h {
        date: NaiveDate,
        total: f64,
        epsilon: f64,
    },
}

/// Split `activities` into calendar days in `timezone` (the start place's
/// local zone, fixed for the whole trip) and build one `DailyLedger` per
/// day touched.
pub fn project(activities: &[Activity], timezone: Tz) -> Result<Vec<DailyLedger>, ProjectorError> {
    if activities.is_empty() {
        return Ok(Vec::new());
    }

    let mut by_day: Vec<(NaiveDate, Vec<Activity>)> = Vec::new();

    for activity in activities {
        for piece in split_at_day_boundaries(activity, timezone) {
            let local_date = piece.start.with_timezone(&timezone).date_naive();
            match by_day.last_mut() {
                Some((date, pieces)) if *date == local_date => pieces.push(piece),
                _ => by_day.push((local_date, vec![piece])),
            }
        }
    }

    let mut ledgers = Vec::with_capacity(by_day.len());
    for (day_number, (date, pieces)) in by_day.into_iter().enumerate() {
        ledgers.push(build_ledger(date, day_number as u32 + 1, timezone, &pieces)?);
    }
    Ok(ledgers)
}

/// Split one activity into pieces that never cross a local-midnight
/// boundary. An activity spanning N days yields N pieces.
fn split_at_day_boundaries(activity: &Activity, timezone: Tz) -> Vec<Activity> {
    let mut pieces = Vec::new();
    let mut cursor = activity.start;

    while cursor < activity.end {
        let local = cursor.with_timezone(&timezone);
        let next_local_midnight = (local.date_naive() + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let next_midnight_utc = timezone
            .from_local_datetime(&next_local_midnight)
            .single()
            .unwrap_or_else(|| timezone.from_utc_datetime(&next_local_midnight.naive_utc()))
            .with_timezone(&Utc);

        let piece_end = next_midnight_utc.min(activity.end);
        pieces.push(Activity {
            status: activity.status,
            start: cursor,
            end: piece_end,
            description: activity.description.clone(),
            place: activity.place.clone(),
        });
        cursor = piece_end;
    }

    pieces
}

/// Pad `pieces` (already confined to one calendar day) with synthetic
/// OFF_DUTY activities so the day's coverage runs the full [00:00, 24:00)
/// span. Without this, a trip's first and last calendar day (which rarely
/// start/end exactly at local midnight) would fail to sum to 24h across
/// their four status totals, unlike interior days.
fn fill_day_boundaries(date: NaiveDate, timezone: Tz, pieces: &[Activity]) -> Vec<Activity> {
    let day_start = timezone
        .from_local_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
        .single()
        .unwrap()
        .with_timezone(&Utc);
    let day_end = timezone
        .from_local_datetime(&(date + Duration::days(1)).and_hms_opt(0, 0, 0).unwrap())
        .single()
        .unwrap()
        .with_timezone(&Utc);

    let mut padded = Vec::with_capacity(pieces.len() + 2);

    let first = pieces.first().expect("project() never calls build_ledger with an empty day");
    if first.start > day_start {
        padded.push(Activity {
            status: DutyStatus::OffDuty,
            start: day_start,
            end: first.start,
            description: String::new(),
            place: first.place.clone(),
        });
    }

    padded.extend(pieces.iter().cloned());

    let trailing_place = pieces.last().and_then(|p| p.place.clone());
    if let Some(last) = pieces.last() {
        if last.end < day_end {
            padded.push(Activity {
                status: DutyStatus::OffDuty,
                start: last.end,
                end: day_end,
                description: String::new(),
                place: trailing_place,
            });
        }
    }

    padded
}

fn build_ledger(
    date: NaiveDate,
    day_number: u32,
    timezone: Tz,
    pieces: &[Activity],
) -> Result<DailyLedger, ProjectorError> {
    let pieces = fill_day_boundaries(date, timezone, pieces);
    let mut off_duty_hours = 0.0;
    let mut sleeper_hours = 0.0;
    let mut driving_hours = 0.0;
    let mut on_duty_hours = 0.0;

    let mut entries = Vec::with_capacity(pieces.len());
    let mut remarks = Vec::new();

    for piece in &pieces {
        let hours = piece.duration_hours();
        match piece.status {
            DutyStatus::OffDuty => off_duty_hours += hours,
            DutyStatus::SleeperBerth => sleeper_hours += hours,
            DutyStatus::Driving => driving_hours += hours,
            DutyStatus::OnDutyNotDriving => on_duty_hours += hours,
        }

        let local_start = piece.start.with_timezone(&timezone).time();
        let local_end = piece.end.with_timezone(&timezone).time();
        let location = piece
            .place
            .as_ref()
            .map(|p| p.display_name.clone())
            .unwrap_or_default();

        entries.push(LedgerEntry {
            status: piece.status,
            start: local_start,
            end: local_end,
            location: location.clone(),
            activity: Some(piece.description.clone()),
        });

        if !piece.description.is_empty() {
            remarks.push(Remark {
                time: local_start,
                location,
                activity: piece.description.clone(),
            });
        }
    }

    let total = off_duty_hours + sleeper_hours + driving_hours + on_duty_hours;
    if (total - 24.0).abs() > DAY_SUM_EPSILON_HOURS {
        return Err(ProjectorError::DayDoesNotSumTo24h {
            date,
            total,
            epsilon: DAY_SUM_EPSILON_HOURS,
        });
    }

    let start_location = entries
        .first()
        .map(|e| e.location.clone())
        .unwrap_or_default();
    let end_location = entries
        .last()
        .map(|e| e.location.clone())
        .unwrap_or_default();

    Ok(DailyLedger {
        date,
        day_number,
        timezone: timezone.name().to_string(),
        off_duty_hours,
        sleeper_hours,
        driving_hours,
        on_duty_hours,
        start_location,
        end_location,
        entries,
        remarks,
    })
}

/// Validate that every day (first/last included — `project` pads each day's
/// boundaries with synthetic OFF_DUTY so even partial first/last days sum
/// to 24h) sums to 24h within tolerance. Exposed separately from `project`
/// so callers can assert it in tests without re-deriving the ledgers.
pub fn assert_all_days_sum_to_24h(ledgers: &[DailyLedger]) -> Result<(), ProjectorError> {
    for ledger in ledgers {
        let total = ledger.off_duty_hours + ledger.sleeper_hours + ledger.driving_hours + ledger.on_duty_hours;
        if (total - 24.0).abs() > DAY_SUM_EPSILON_HOURS {
            return Err(ProjectorError::DayDoesNotSumTo24h {
                date: ledger.date,
                total,
                epsilon: DAY_SUM_EPSILON_HOURS,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hos::types::{Coordinate, NamedPlace};

    fn place(name: &str) -> NamedPlace {
        NamedPlace {
            address: name.to_string(),
            coordinate: Coordinate { lat: 0.0, lng: 0.0 },
            display_name: name.to_string(),
        }
    }

    fn dt(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn single_short_activity_produces_one_day() {
        let activities = vec![Activity {
            status: DutyStatus::OnDutyNotDriving,
            start: dt("2026-01-17T12:00:00Z"),
            end: dt("2026-01-17T12:30:00Z"),
            description: "Pre-trip inspection".into(),
            place: Some(place("Chicago, IL")),
        }];

        let ledgers = project(&activities, chrono_tz::America::Chicago).unwrap();
        assert_eq!(ledgers.len(), 1);
        assert_eq!(ledgers[0].day_number, 1);
        assert!((ledgers[0].on_duty_hours - 0.5).abs() < 1e-9);
    }

    #[test]
    fn activity_spanning_midnight_splits_into_two_days() {
        // 22:00 to 02:00 local (Chicago, UTC-6 in January) crosses midnight.
        let activities = vec![Activity {
            status: DutyStatus::Driving,
            start: dt("2026-01-18T04:00:00Z"), // 22:00 CST Jan 17
            end: dt("2026-01-18T08:00:00Z"),   // 02:00 CST Jan 18
            description: "Driving".into(),
            place: Some(place("En route")),
        }];

        let ledgers = project(&activities, chrono_tz::America::Chicago).unwrap();
        assert_eq!(ledgers.len(), 2);
        assert!((ledgers[0].driving_hours - 2.0).abs() < 1e-9);
        assert!((ledgers[1].driving_hours - 2.0).abs() < 1e-9);
    }

    #[test]
    fn full_multi_day_trip_all_days_sum_to_24h() {
        let mut activities = Vec::new();
        let mut cursor = dt("2026-01-17T00:00:00Z");
        let statuses = [
            (DutyStatus::OffDuty, 10.0),
            (DutyStatus::Driving, 11.0),
            (DutyStatus::OnDutyNotDriving, 3.0),
        ];
        for _ in 0..3 {
            for (status, hours) in statuses.iter() {
                let end = cursor + Duration::milliseconds((hours * 3_600_000.0) as i64);
                activities.push(Activity {
                    status: *status,
                    start: cursor,
                    end,
                    description: "x".into(),
                    place: Some(place("Somewhere")),
                });
                cursor = end;
            }
        }

        let ledgers = project(&activities, chrono_tz::UTC).unwrap();
        assert!(assert_all_days_sum_to_24h(&ledgers).is_ok());
    }

    // A trip that starts mid-morning and ends mid-afternoon leaves a gap
    // before the first activity and after the last one on its respective
    // days; both must be padded with OFF_DUTY so every day still sums to
    // 24h.
    #[test]
    fn partial_first_and_last_day_are_padded_to_24h() {
        let activities = vec![Activity {
            status: DutyStatus::OnDutyNotDriving,
            start: dt("2026-01-17T12:00:00Z"),
            end: dt("2026-01-17T12:30:00Z"),
            description: "Pre-trip inspection".into(),
            place: Some(place("Chicago, IL")),
        }];

        let ledgers = project(&activities, chrono_tz::UTC).unwrap();
        assert_eq!(ledgers.len(), 1);
        assert!((ledgers[0].off_duty_hours - 23.5).abs() < 1e-9);
        assert!(assert_all_days_sum_to_24h(&ledgers).is_ok());
        // The synthetic filler has no description, so it contributes no remark.
        assert_eq!(ledgers[0].remarks.len(), 1);
    }
}

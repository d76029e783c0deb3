//! Trip store: a single-row-transactional insert, a
//! newest-first list by owner, a get-with-children, and a cascading delete.

use anyhow::Result;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::trip::{
    NewTrip, TripDailyLogRow, TripDailyLogRowNew, TripDetail, TripListItem, TripRow,
    TripStopRow, TripStopRowNew,
};

/// Persist a freshly-calculated trip and its child rows in one transaction
///.
pub async fn insert(pool: &PgPool, new_trip: &NewTrip) -> Result<TripDetail> {
    let mut tx = pool.begin().await?;

    let stop_counts: std::collections::BTreeMap<String, u32> = new_trip.summary.stop_counts.clone();

    let row = sqlx::query_as::<_, TripRow>(
        r#"
        INSERT INTO trips (
            id, owner_id,
            current_location_address, current_location_place,
            pickup_location_address, pickup_location_place,
            dropoff_location_address, dropoff_location_place,
            starting_cycle_hours, polyline,
            seg_to_pickup, seg_to_dropoff,
            total_distance_miles, total_driving_hours, total_days,
            cycle_hours_used, cycle_hours_remaining,
            start_time, end_time, stop_counts, created_at
        )
        VALUES (
            gen_random_uuid(), $1,
            $2, $3,
            $4, $5,
            $6, $7,
            $8, $9,
            $10, $11,
            $12, $13, $14,
            $15, $16,
            $17, $18, $19, now()
        )
        RETURNING
            id, owner_id,
            current_location_address, current_location_place,
            pickup_location_address, pickup_location_place,
            dropoff_location_address, dropoff_location_place,
            starting_cycle_hours, polyline,
            seg_to_pickup, seg_to_dropoff,
            total_distance_miles, total_driving_hours, total_days,
            cycle_hours_used, cycle_hours_remaining,
            start_time, end_time, stop_counts, created_at
        "#,
    )
    .bind(new_trip.owner_id)
    .bind(&new_trip.current_location_place.address)
    .bind(Json(&new_trip.current_location_place))
    .bind(&new_trip.pickup_location_place.address)
    .bind(Json(&new_trip.pickup_location_place))
    .bind(&new_trip.dropoff_location_place.address)
    .bind(Json(&new_trip.dropoff_location_place))
    .bind(new_trip.starting_cycle_hours)
    .bind(&new_trip.polyline)
    .bind(Json(&new_trip.seg_to_pickup))
    .bind(Json(&new_trip.seg_to_dropoff))
    .bind(new_trip.summary.total_distance_miles)
    .bind(new_trip.summary.total_driving_hours)
    .bind(new_trip.summary.total_days as i32)
    .bind(new_trip.summary.cycle_hours_used)
    .bind(new_trip.summary.cycle_hours_remaining)
    .bind(new_trip.summary.start_time)
    .bind(new_trip.summary.end_time)
    .bind(Json(&stop_counts))
    .fetch_one(&mut *tx)
    .await?;

    let mut stop_rows = Vec::with_capacity(new_trip.stops.len());
    for stop in &new_trip.stops {
        let new_row = TripStopRowNew::from(stop);
        let stop_row = sqlx::query_as::<_, TripStopRow>(
            r#"
            INSERT INTO trip_stops (
                id, trip_id, ordinal, kind, place, arrival, departure,
                duration_minutes, activity_text, duty_status
            )
            VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, trip_id, ordinal, kind, place, arrival, departure,
                      duration_minutes, activity_text, duty_status
            "#,
        )
        .bind(row.id)
        .bind(new_row.ordinal)
        .bind(&new_row.kind)
        .bind(&new_row.place)
        .bind(new_row.arrival)
        .bind(new_row.departure)
        .bind(new_row.duration_minutes)
        .bind(&new_row.activity_text)
        .bind(&new_row.duty_status)
        .fetch_one(&mut *tx)
        .await?;
        stop_rows.push(stop_row);
    }

    let mut log_rows = Vec::with_capacity(new_trip.daily_logs.len());
    for ledger in &new_trip.daily_logs {
        let new_row = TripDailyLogRowNew::from(ledger);
        let log_row = sqlx::query_as::<_, TripDailyLogRow>(
            r#"
            INSERT INTO trip_daily_logs (
                id, trip_id, day_number, date, timezone,
                off_duty_hours, sleeper_hours, driving_hours, on_duty_hours,
                start_location, end_location, entries, remarks
            )
            VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, trip_id, day_number, date, timezone,
                      off_duty_hours, sleeper_hours, driving_hours, on_duty_hours,
                      start_location, end_location, entries, remarks
            "#,
        )
        .bind(row.id)
        .bind(new_row.day_number)
        .bind(new_row.date)
        .bind(&new_row.timezone)
        .bind(new_row.off_duty_hours)
        .bind(new_row.sleeper_hours)
        .bind(new_row.driving_hours)
        .bind(new_row.on_duty_hours)
        .bind(&new_row.start_location)
        .bind(&new_row.end_location)
        .bind(&new_row.entries)
        .bind(&new_row.remarks)
        .fetch_one(&mut *tx)
        .await?;
        log_rows.push(log_row);
    }

    tx.commit().await?;

    Ok(TripDetail::from_rows(row, stop_rows, log_rows))
}

/// List an owner's trips, newest-first, with truncated fields.
pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<TripListItem>> {
    let items = sqlx::query_as::<_, TripListItem>(
        r#"
        SELECT
            id, current_location_address, pickup_location_address, dropoff_location_address,
            total_distance_miles, total_driving_hours, total_days,
            start_time, end_time, created_at
        FROM trips
        WHERE owner_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(items)
}

/// Fetch one trip (with its stops and daily logs) if owned by `owner_id`.
pub async fn get_by_id_for_owner(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<Option<TripDetail>> {
    let row = sqlx::query_as::<_, TripRow>(
        r#"
        SELECT
            id, owner_id,
            current_location_address, current_location_place,
            pickup_location_address, pickup_location_place,
            dropoff_location_address, dropoff_location_place,
            starting_cycle_hours, polyline,
            seg_to_pickup, seg_to_dropoff,
            total_distance_miles, total_driving_hours, total_days,
            cycle_hours_used, cycle_hours_remaining,
            start_time, end_time, stop_counts, created_at
        FROM trips
        WHERE id = $1 AND owner_id = $2
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let stops = sqlx::query_as::<_, TripStopRow>(
        r#"
        SELECT id, trip_id, ordinal, kind, place, arrival, departure,
               duration_minutes, activity_text, duty_status
        FROM trip_stops
        WHERE trip_id = $1
        ORDER BY ordinal ASC
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let logs = sqlx::query_as::<_, TripDailyLogRow>(
        r#"
        SELECT id, trip_id, day_number, date, timezone,
               off_duty_hours, sleeper_hours, driving_hours, on_duty_hours,
               start_location, end_location, entries, remarks
        FROM trip_daily_logs
        WHERE trip_id = $1
        ORDER BY day_number ASC
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(Some(TripDetail::from_rows(row, stops, logs)))
}

/// Delete a trip (and, via `ON DELETE CASCADE`, its stops/daily logs) if
/// owned by `owner_id`. Returns whether a row was deleted.
pub async fn delete_by_id_for_owner(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM trips WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

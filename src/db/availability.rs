use chrono::{NaiveDate, Utc};
use sqlx::SqliteExecutor;

use super::models::Availability;
use super::StoreResult;

const COLUMNS: &str = "id, date, available, max_events, notes, created_at, updated_at";

pub async fn find_by_date<'e, E>(ex: E, date: NaiveDate) -> StoreResult<Option<Availability>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {COLUMNS} FROM availabilities WHERE date = ? AND deleted_at IS NULL");
    Ok(sqlx::query_as::<_, Availability>(&sql)
        .bind(date)
        .fetch_optional(ex)
        .await?)
}

/// Rows in `[from, until)`, ordered by date.
pub async fn list_between<'e, E>(ex: E, from: NaiveDate, until: NaiveDate) -> StoreResult<Vec<Availability>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM availabilities
         WHERE date >= ? AND date < ? AND deleted_at IS NULL
         ORDER BY date ASC"
    );
    Ok(sqlx::query_as::<_, Availability>(&sql)
        .bind(from)
        .bind(until)
        .fetch_all(ex)
        .await?)
}

/// One live row per date: inserts or overwrites the existing one.
pub async fn upsert<'e, E>(
    ex: E,
    date: NaiveDate,
    available: bool,
    max_events: i64,
    notes: &str,
) -> StoreResult<Availability>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO availabilities (date, available, max_events, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT (date) WHERE deleted_at IS NULL DO UPDATE SET
             available = excluded.available,
             max_events = excluded.max_events,
             notes = excluded.notes,
             updated_at = excluded.updated_at
         RETURNING {COLUMNS}"
    );
    Ok(sqlx::query_as::<_, Availability>(&sql)
        .bind(date)
        .bind(available)
        .bind(max_events)
        .bind(notes)
        .bind(now)
        .fetch_one(ex)
        .await?)
}

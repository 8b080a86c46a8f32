use chrono::{NaiveDate, Utc};
use sqlx::{SqliteExecutor, SqlitePool};

use super::models::{Booking, BookingDetails, BookingStatus, NewBooking};
use super::{clients, rentals, StoreError, StoreResult};

const COLUMNS: &str = "id, client_id, event_date, event_type, event_location, guest_count, budget, \
     status, message, special_requests, language, total_amount, deposit_amount, admin_notes, \
     created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub async fn insert<'e, E>(ex: E, booking: &NewBooking) -> StoreResult<Booking>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO bookings (client_id, event_date, event_type, event_location, guest_count,
             budget, status, message, special_requests, language, total_amount, deposit_amount,
             admin_notes, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '', ?, ?)
         RETURNING {COLUMNS}"
    );
    Ok(sqlx::query_as::<_, Booking>(&sql)
        .bind(booking.client_id)
        .bind(booking.event_date)
        .bind(booking.event_type)
        .bind(&booking.event_location)
        .bind(booking.guest_count)
        .bind(booking.budget)
        .bind(BookingStatus::Pending)
        .bind(&booking.message)
        .bind(&booking.special_requests)
        .bind(&booking.language)
        .bind(booking.total_amount)
        .bind(booking.deposit_amount)
        .bind(now)
        .bind(now)
        .fetch_one(ex)
        .await?)
}

/// Links a rental item when it exists and is live. Returns whether a link was made.
pub async fn attach_rental_item<'e, E>(ex: E, booking_id: i64, rental_item_id: i64) -> StoreResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "INSERT OR IGNORE INTO booking_rental_items (booking_id, rental_item_id)
         SELECT ?, id FROM rental_items WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(booking_id)
    .bind(rental_item_id)
    .execute(ex)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get<'e, E>(ex: E, id: i64) -> StoreResult<Booking>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {COLUMNS} FROM bookings WHERE id = ? AND deleted_at IS NULL");
    sqlx::query_as::<_, Booking>(&sql)
        .bind(id)
        .fetch_optional(ex)
        .await?
        .ok_or(StoreError::not_found("Booking"))
}

/// Ordered by event date, latest first.
pub async fn list<'e, E>(ex: E, filter: &BookingFilter) -> StoreResult<Vec<Booking>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM bookings
         WHERE deleted_at IS NULL
           AND (?1 IS NULL OR status = ?1)
           AND (?2 IS NULL OR event_date >= ?2)
           AND (?3 IS NULL OR event_date <= ?3)
         ORDER BY event_date DESC, id DESC"
    );
    Ok(sqlx::query_as::<_, Booking>(&sql)
        .bind(filter.status)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(ex)
        .await?)
}

pub async fn list_for_client<'e, E>(ex: E, client_id: i64) -> StoreResult<Vec<Booking>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM bookings
         WHERE client_id = ? AND deleted_at IS NULL
         ORDER BY event_date DESC, id DESC"
    );
    Ok(sqlx::query_as::<_, Booking>(&sql)
        .bind(client_id)
        .fetch_all(ex)
        .await?)
}

/// Live bookings on `date` that still hold a slot.
pub async fn count_active_on<'e, E>(ex: E, date: NaiveDate) -> StoreResult<i64>
where
    E: SqliteExecutor<'e>,
{
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM bookings
         WHERE event_date = ? AND status != ? AND deleted_at IS NULL",
    )
    .bind(date)
    .bind(BookingStatus::Cancelled)
    .fetch_one(ex)
    .await?;
    Ok(count)
}

/// Moves a booking out of `from`. Returns `None` when the booking is no longer
/// live in that status, so a concurrent change is never overwritten.
pub async fn update_status<'e, E>(
    ex: E,
    id: i64,
    from: BookingStatus,
    to: BookingStatus,
    admin_notes: &str,
) -> StoreResult<Option<Booking>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "UPDATE bookings SET status = ?, admin_notes = ?, updated_at = ?
         WHERE id = ? AND status = ? AND deleted_at IS NULL RETURNING {COLUMNS}"
    );
    let updated = sqlx::query_as::<_, Booking>(&sql)
        .bind(to)
        .bind(admin_notes)
        .bind(Utc::now())
        .bind(id)
        .bind(from)
        .fetch_optional(ex)
        .await?;
    Ok(updated)
}

/// Joins the client and rental items onto a booking.
pub async fn details(pool: &SqlitePool, booking: Booking) -> StoreResult<BookingDetails> {
    let client = clients::find(pool, booking.client_id).await?;
    let rental_items = rentals::list_for_booking(pool, booking.id).await?;
    Ok(BookingDetails {
        booking,
        client,
        rental_items,
    })
}

pub async fn details_many(pool: &SqlitePool, bookings: Vec<Booking>) -> StoreResult<Vec<BookingDetails>> {
    let mut out = Vec::with_capacity(bookings.len());
    for booking in bookings {
        out.push(details(pool, booking).await?);
    }
    Ok(out)
}

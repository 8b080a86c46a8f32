use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;

use super::models::BookingStatus;
use super::StoreResult;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_bookings: i64,
    pub pending_bookings: i64,
    pub confirmed_bookings: i64,
    pub total_clients: i64,
    pub total_revenue: f64,
    pub month_revenue: f64,
    pub pending_testimonials: i64,
    pub active_subscribers: i64,
}

async fn count(pool: &SqlitePool, sql: &str) -> StoreResult<i64> {
    let (n,): (i64,) = sqlx::query_as(sql).fetch_one(pool).await?;
    Ok(n)
}

async fn bookings_with_status(pool: &SqlitePool, status: BookingStatus) -> StoreResult<i64> {
    let (n,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE status = ? AND deleted_at IS NULL")
            .bind(status)
            .fetch_one(pool)
            .await?;
    Ok(n)
}

/// Sum of `total_amount` over paid and completed bookings with an event date in `[from, until)`.
async fn revenue(pool: &SqlitePool, from: Option<NaiveDate>, until: Option<NaiveDate>) -> StoreResult<f64> {
    let (sum,): (f64,) = sqlx::query_as(
        "SELECT CAST(COALESCE(SUM(total_amount), 0) AS REAL) FROM bookings
         WHERE deleted_at IS NULL AND status IN (?1, ?2)
           AND (?3 IS NULL OR event_date >= ?3)
           AND (?4 IS NULL OR event_date < ?4)",
    )
    .bind(BookingStatus::Paid)
    .bind(BookingStatus::Completed)
    .bind(from)
    .bind(until)
    .fetch_one(pool)
    .await?;
    Ok(sum)
}

/// First day of `today`'s month and of the month after.
pub fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today.with_day(1).unwrap_or(today);
    let next = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    (start, next.unwrap_or(start))
}

pub async fn dashboard(pool: &SqlitePool, today: NaiveDate) -> StoreResult<DashboardStats> {
    let (month_start, month_end) = month_bounds(today);

    Ok(DashboardStats {
        total_bookings: count(pool, "SELECT COUNT(*) FROM bookings WHERE deleted_at IS NULL").await?,
        pending_bookings: bookings_with_status(pool, BookingStatus::Pending).await?,
        confirmed_bookings: bookings_with_status(pool, BookingStatus::Confirmed).await?,
        total_clients: count(pool, "SELECT COUNT(*) FROM clients WHERE deleted_at IS NULL").await?,
        total_revenue: revenue(pool, None, None).await?,
        month_revenue: revenue(pool, Some(month_start), Some(month_end)).await?,
        pending_testimonials: count(
            pool,
            "SELECT COUNT(*) FROM testimonials WHERE approved = 0 AND deleted_at IS NULL",
        )
        .await?,
        active_subscribers: count(
            pool,
            "SELECT COUNT(*) FROM newsletters WHERE active = 1 AND deleted_at IS NULL",
        )
        .await?,
    })
}

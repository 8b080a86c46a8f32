/**
 * Availability Routes
 * Monthly calendar (public and admin) and per-date upsert
 */
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::db::models::Availability;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::routes::non_empty;
use crate::services::booking;
use crate::AppState;

const DEFAULT_MAX_EVENTS: i64 = 1;

#[derive(Debug, Default, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityUpdate {
    pub date: String,
    #[serde(default = "default_available")]
    pub available: bool,
    pub max_events: Option<i64>,
    #[serde(default)]
    pub notes: String,
}

fn default_available() -> bool {
    true
}

/// GET /api/{public,admin}/availabilities?month=YYYY-MM
/// Defaults to the current month.
pub async fn list_month(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> ApiResult<Json<Vec<Availability>>> {
    let day = match non_empty(&query.month) {
        Some(raw) => booking::parse_month(raw)?,
        None => Utc::now().date_naive(),
    };
    Ok(Json(booking::month_calendar(&state.store, day).await?))
}

/// POST /api/admin/availabilities
pub async fn set_availability(
    State(state): State<AppState>,
    ApiJson(update): ApiJson<AvailabilityUpdate>,
) -> ApiResult<Json<Availability>> {
    if update.date.trim().is_empty() {
        return Err(ApiError::invalid("Date is required"));
    }
    let date = booking::parse_date(&update.date)?;
    let row = booking::set_availability(
        &state.store,
        date,
        update.available,
        update.max_events.unwrap_or(DEFAULT_MAX_EVENTS),
        &update.notes,
    )
    .await?;

    tracing::info!(date = %row.date, available = row.available, max_events = row.max_events, "availability updated");
    Ok(Json(row))
}

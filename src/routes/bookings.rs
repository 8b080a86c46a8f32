/**
 * Booking Routes
 * Public booking requests and availability checks, admin listing and
 * status changes
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::db::bookings::{self as store, BookingFilter};
use crate::db::models::{BookingDetails, BookingStatus};
use crate::error::{parse_id, ApiError, ApiJson, ApiResult};
use crate::routes::{enum_param, non_empty};
use crate::services::booking::{self, AvailabilityStatus, BookingRequest};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<String>,
    pub admin_notes: Option<String>,
}

// ============================================================================
// Public
// ============================================================================

/// POST /api/public/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<BookingRequest>,
) -> ApiResult<impl IntoResponse> {
    let details = booking::create_booking(
        &state.store,
        &state.outbox,
        &state.config.branding,
        state.config.admin_notification_email.as_deref(),
        &req,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// GET /api/public/bookings/availability?date=YYYY-MM-DD
pub async fn check_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<Json<AvailabilityStatus>> {
    let raw = non_empty(&query.date).ok_or_else(|| ApiError::invalid("Date is required"))?;
    let date = booking::parse_date(raw)?;
    Ok(Json(booking::check_availability(&state.store, date).await?))
}

// ============================================================================
// Admin
// ============================================================================

/// GET /api/admin/bookings
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingListQuery>,
) -> ApiResult<Json<Vec<BookingDetails>>> {
    let filter = BookingFilter {
        status: enum_param::<BookingStatus>(&query.status)?,
        start_date: non_empty(&query.start_date)
            .map(booking::parse_date)
            .transpose()?,
        end_date: non_empty(&query.end_date)
            .map(booking::parse_date)
            .transpose()?,
    };

    let bookings = store::list(state.store.pool(), &filter).await?;
    Ok(Json(store::details_many(state.store.pool(), bookings).await?))
}

/// GET /api/admin/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BookingDetails>> {
    let id = parse_id(&id, "booking")?;
    let booking = store::get(state.store.pool(), id).await?;
    Ok(Json(store::details(state.store.pool(), booking).await?))
}

/// PUT /api/admin/bookings/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> ApiResult<Json<BookingDetails>> {
    let id = parse_id(&id, "booking")?;
    let details = booking::update_status(
        &state.store,
        id,
        update.status.as_deref(),
        update.admin_notes.as_deref(),
    )
    .await?;
    Ok(Json(details))
}

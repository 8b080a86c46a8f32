//! Booking request workflow and the availability calendar.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::Branding;
use crate::db::models::{
    Availability, BookingDetails, BookingStatus, EmailKind, EventType, NewBooking,
    NewClient, NewEmail,
};
use crate::db::{availability, bookings, clients, stats, Store};
use crate::error::{ApiError, ApiResult};
use crate::services::email::outbox::enqueue_in;
use crate::services::email::{templates, Outbox};

const DEPOSIT_PERCENT: f64 = 30.0;
const DEFAULT_LANGUAGE: &str = "fr";

/// Public booking request as submitted by the website form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub event_date: String,
    pub event_type: Option<String>,
    #[serde(default)]
    pub event_location: String,
    #[serde(default)]
    pub guest_count: i64,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub special_requests: String,
    pub language: Option<String>,
    #[serde(default)]
    pub rental_item_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityStatus {
    pub date: NaiveDate,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_events: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booked: Option<i64>,
}

pub fn deposit_for(budget: f64) -> f64 {
    budget * DEPOSIT_PERCENT / 100.0
}

pub fn parse_date(raw: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::invalid("Invalid date format, expected YYYY-MM-DD"))
}

fn parse_event_type(raw: Option<&str>) -> ApiResult<EventType> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(EventType::Other),
        Some(s) => s.parse().map_err(|e| ApiError::invalid(format!("Invalid {}", e))),
    }
}

fn language_of(raw: Option<&str>) -> String {
    raw.map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

/// Everything about a request that can be checked without the database.
struct ValidRequest {
    client: NewClient,
    event_date: NaiveDate,
    event_type: EventType,
    language: String,
}

fn validate(req: &BookingRequest) -> ApiResult<ValidRequest> {
    let name = req.name.trim();
    let email = req.email.trim().to_lowercase();
    if name.is_empty() {
        return Err(ApiError::invalid("Name is required"));
    }
    if !email.contains('@') {
        return Err(ApiError::invalid("A valid email is required"));
    }
    let event_date = parse_date(&req.event_date)?;
    let event_type = parse_event_type(req.event_type.as_deref())?;
    if req.budget < 0.0 || !req.budget.is_finite() {
        return Err(ApiError::invalid("Budget must be a positive amount"));
    }
    if req.guest_count < 0 {
        return Err(ApiError::invalid("Guest count cannot be negative"));
    }

    Ok(ValidRequest {
        client: NewClient {
            name: name.to_string(),
            email,
            phone: req.phone.trim().to_string(),
            notes: String::new(),
        },
        event_date,
        event_type,
        language: language_of(req.language.as_deref()),
    })
}

/// Records a booking request: checks the date is open, finds or creates the
/// client, links the requested rentals and queues the confirmation emails,
/// all in one transaction.
pub async fn create_booking(
    store: &Store,
    outbox: &Outbox,
    branding: &Branding,
    admin_email: Option<&str>,
    req: &BookingRequest,
) -> ApiResult<BookingDetails> {
    let valid = validate(req)?;
    // Holds the write lock from the availability read to the commit.
    let mut tx = store.pool().begin_with("BEGIN IMMEDIATE").await?;

    if let Some(day) = availability::find_by_date(&mut *tx, valid.event_date).await? {
        if !day.available {
            return Err(ApiError::conflict("Date not available"));
        }
    }

    let client = match clients::find_by_email(&mut *tx, &valid.client.email).await? {
        Some(existing) => existing,
        None => clients::insert(&mut *tx, &valid.client).await?,
    };

    let booking = bookings::insert(
        &mut *tx,
        &NewBooking {
            client_id: client.id,
            event_date: valid.event_date,
            event_type: valid.event_type,
            event_location: req.event_location.trim().to_string(),
            guest_count: req.guest_count,
            budget: req.budget,
            message: req.message.trim().to_string(),
            special_requests: req.special_requests.trim().to_string(),
            language: valid.language,
            total_amount: req.budget,
            deposit_amount: deposit_for(req.budget),
        },
    )
    .await?;

    for rental_id in &req.rental_item_ids {
        if !bookings::attach_rental_item(&mut *tx, booking.id, *rental_id).await? {
            tracing::debug!(booking_id = booking.id, rental_id, "ignoring unknown rental item");
        }
    }

    let confirmation = templates::booking_confirmation(branding, &client, &booking);
    enqueue_in(
        &mut *tx,
        &NewEmail {
            to: client.email.clone(),
            subject: confirmation.subject,
            kind: EmailKind::BookingConfirmation,
            body: confirmation.html,
            client_id: Some(client.id),
        },
    )
    .await?;

    if let Some(admin) = admin_email {
        let notice = templates::admin_booking_notification(branding, &client, &booking);
        enqueue_in(
            &mut *tx,
            &NewEmail {
                to: admin.to_string(),
                subject: notice.subject,
                kind: EmailKind::AdminBookingNotification,
                body: notice.html,
                client_id: Some(client.id),
            },
        )
        .await?;
    }

    tx.commit().await?;
    outbox.wake();

    tracing::info!(
        booking_id = booking.id,
        client_id = client.id,
        event_date = %booking.event_date,
        "Booking created"
    );
    Ok(bookings::details(store.pool(), booking).await?)
}

pub async fn check_availability(store: &Store, date: NaiveDate) -> ApiResult<AvailabilityStatus> {
    let Some(day) = availability::find_by_date(store.pool(), date).await? else {
        return Ok(AvailabilityStatus {
            date,
            available: true,
            max_events: None,
            booked: None,
        });
    };

    let booked = bookings::count_active_on(store.pool(), date).await?;
    Ok(AvailabilityStatus {
        date,
        available: day.available && booked < day.max_events,
        max_events: Some(day.max_events),
        booked: Some(booked),
    })
}

/// Calendar rows of the month containing `day`.
pub async fn month_calendar(store: &Store, day: NaiveDate) -> ApiResult<Vec<Availability>> {
    let (start, end) = stats::month_bounds(day);
    Ok(availability::list_between(store.pool(), start, end).await?)
}

/// `YYYY-MM` to the first day of that month.
pub fn parse_month(raw: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
        .map_err(|_| ApiError::invalid("Invalid month format, expected YYYY-MM"))
}

pub async fn set_availability(
    store: &Store,
    date: NaiveDate,
    available: bool,
    max_events: i64,
    notes: &str,
) -> ApiResult<Availability> {
    if max_events < 1 {
        return Err(ApiError::invalid("max_events must be at least 1"));
    }
    Ok(availability::upsert(store.pool(), date, available, max_events, notes.trim()).await?)
}

/// Applies a status change and/or admin notes. Status moves must follow
/// [`BookingStatus::can_transition_to`].
pub async fn update_status(
    store: &Store,
    id: i64,
    status: Option<&str>,
    admin_notes: Option<&str>,
) -> ApiResult<BookingDetails> {
    let current = bookings::get(store.pool(), id).await?;

    let next = match status.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<BookingStatus>()
            .map_err(|e| ApiError::invalid(format!("Invalid {}", e)))?,
        None => current.status,
    };
    if !current.status.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Cannot change booking status from {} to {}",
            current.status, next
        )));
    }

    let notes = admin_notes.unwrap_or(&current.admin_notes).to_string();
    let Some(updated) =
        bookings::update_status(store.pool(), id, current.status, next, &notes).await?
    else {
        let latest = bookings::get(store.pool(), id).await?;
        return Err(ApiError::conflict(format!(
            "Booking status changed to {} while updating",
            latest.status
        )));
    };
    if updated.status != current.status {
        tracing::info!(booking_id = id, from = %current.status, to = %next, "Booking status changed");
    }
    Ok(bookings::details(store.pool(), updated).await?)
}

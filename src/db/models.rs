//! Database Models - rows as stored by sqlx and serialized by serde.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EventType {
    Proposal,
    Wedding,
    Birthday,
    BabyShower,
    Corporate,
    Other,
}

string_enum!(EventType, "event type", {
    Proposal => "proposal",
    Wedding => "wedding",
    Birthday => "birthday",
    BabyShower => "baby_shower",
    Corporate => "corporate",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Paid,
    Completed,
    Cancelled,
}

string_enum!(BookingStatus, "booking status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Paid => "paid",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl BookingStatus {
    /// Statuses reachable from `self` in one step.
    pub fn next_states(&self) -> &'static [BookingStatus] {
        use BookingStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Paid, Cancelled],
            Paid => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    /// Re-applying the current status is accepted so notes can be edited alone.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        *self == next || self.next_states().contains(&next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum GalleryCategory {
    Wedding,
    Marryme,
    Birthday,
    BabyShower,
    Bapteme,
    Loveroom,
    Congrats,
}

string_enum!(GalleryCategory, "gallery category", {
    Wedding => "wedding",
    Marryme => "marryme",
    Birthday => "birthday",
    BabyShower => "baby_shower",
    Bapteme => "bapteme",
    Loveroom => "loveroom",
    Congrats => "congrats",
});

impl GalleryCategory {
    /// Gallery section showing events of the given type, if any.
    pub fn for_event_type(event_type: EventType) -> Option<Self> {
        match event_type {
            EventType::Proposal => Some(GalleryCategory::Marryme),
            EventType::Wedding => Some(GalleryCategory::Wedding),
            EventType::Birthday => Some(GalleryCategory::Birthday),
            EventType::BabyShower => Some(GalleryCategory::BabyShower),
            EventType::Corporate | EventType::Other => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CategoryKind {
    Rental,
    Gallery,
}

string_enum!(CategoryKind, "category type", {
    Rental => "rental",
    Gallery => "gallery",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EmailStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

string_enum!(EmailStatus, "email status", {
    Pending => "pending",
    Sending => "sending",
    Sent => "sent",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EmailKind {
    BookingConfirmation,
    AdminBookingNotification,
    Contact,
    Custom,
    Newsletter,
}

string_enum!(EmailKind, "email type", {
    BookingConfirmation => "booking_confirmation",
    AdminBookingNotification => "admin_booking_notification",
    Contact => "contact",
    Custom => "custom",
    Newsletter => "newsletter",
});

/// Admin account
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewClient {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientWithBookings {
    #[serde(flatten)]
    pub client: Client,
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub client_id: i64,
    pub event_date: NaiveDate,
    pub event_type: EventType,
    pub event_location: String,
    pub guest_count: i64,
    pub budget: f64,
    pub status: BookingStatus,
    pub message: String,
    pub special_requests: String,
    pub language: String,
    pub total_amount: f64,
    pub deposit_amount: f64,
    pub admin_notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub client_id: i64,
    pub event_date: NaiveDate,
    pub event_type: EventType,
    pub event_location: String,
    pub guest_count: i64,
    pub budget: f64,
    pub message: String,
    pub special_requests: String,
    pub language: String,
    pub total_amount: f64,
    pub deposit_amount: f64,
}

/// Booking with its client and selected rental items, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub client: Option<Client>,
    pub rental_items: Vec<RentalItem>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Availability {
    pub id: i64,
    pub date: NaiveDate,
    pub available: bool,
    pub max_events: i64,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: i64,
    pub client_id: Option<i64>,
    pub name: String,
    pub content: String,
    pub rating: i64,
    pub event_type: Option<EventType>,
    pub approved: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTestimonial {
    pub client_id: Option<i64>,
    pub name: String,
    pub content: String,
    pub rating: i64,
    pub event_type: Option<EventType>,
    pub approved: bool,
    pub featured: bool,
}

/// Newsletter subscriber
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Newsletter {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub active: bool,
    pub language: String,
    #[serde(skip_serializing)]
    pub unsub_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GalleryImage {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub thumbnail_url: String,
    pub category: GalleryCategory,
    pub file_name: String,
    pub is_from_storage: bool,
    pub featured: bool,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewGalleryImage {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub category: GalleryCategory,
    pub file_name: String,
    pub is_from_storage: bool,
    pub featured: bool,
    pub sort_order: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The category reference embedded in a rental item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Flat row of `rental_items LEFT JOIN categories`.
#[derive(Debug, Clone, FromRow)]
pub struct RentalItemRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub image_url: String,
    pub featured: bool,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category_id: Option<i64>,
    pub category: Option<CategoryRef>,
    pub image_url: String,
    pub featured: bool,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RentalItemRow> for RentalItem {
    fn from(row: RentalItemRow) -> Self {
        // A dangling or soft-deleted category leaves the id but no reference.
        let category = match (row.category_id, row.category_name, row.category_slug) {
            (Some(id), Some(name), Some(slug)) => Some(CategoryRef { id, name, slug }),
            _ => None,
        };
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
            category_id: row.category_id,
            category,
            image_url: row.image_url,
            featured: row.featured,
            available: row.available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRentalItem {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category_id: Option<i64>,
    pub image_url: String,
    pub featured: bool,
    pub available: bool,
}

/// Editable text block of the public site
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SiteContent {
    pub id: i64,
    pub key: String,
    pub value: String,
    pub language: String,
    pub section: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outbox row: one email and the outcome of its delivery attempts.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EmailLog {
    pub id: i64,
    #[serde(rename = "to")]
    pub recipient: String,
    pub subject: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: EmailKind,
    #[serde(skip_serializing)]
    pub body: String,
    pub status: EmailStatus,
    pub attempts: i64,
    #[serde(skip_serializing)]
    pub next_attempt_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEmail {
    pub to: String,
    pub subject: String,
    pub kind: EmailKind,
    pub body: String,
    pub client_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_text_round_trips_through_from_str() {
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), *status);
        }
        assert_eq!("Baby_Shower".parse::<EventType>().unwrap(), EventType::BabyShower);
        assert!("party".parse::<EventType>().is_err());
    }

    #[test]
    fn test_serde_matches_sql_text() {
        let json = serde_json::to_string(&GalleryCategory::BabyShower).unwrap();
        assert_eq!(json, "\"baby_shower\"");
        let json = serde_json::to_string(&GalleryCategory::Marryme).unwrap();
        assert_eq!(json, "\"marryme\"");
    }

    #[test]
    fn test_status_transition_table() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Paid));
        assert!(Confirmed.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn test_rental_row_without_category_has_no_reference() {
        let now = Utc::now();
        let item: RentalItem = RentalItemRow {
            id: 1,
            title: "Vase".into(),
            description: String::new(),
            price: 15.0,
            category_id: Some(9),
            category_name: None,
            category_slug: None,
            image_url: "/x.png".into(),
            featured: false,
            available: true,
            created_at: now,
            updated_at: now,
        }
        .into();
        assert_eq!(item.category_id, Some(9));
        assert!(item.category.is_none());
    }
}

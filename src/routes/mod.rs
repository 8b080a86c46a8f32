/**
 * Routes Module
 * API route handlers
 */

pub mod auth;
pub mod availability;
pub mod bookings;
pub mod categories;
pub mod clients;
pub mod contact;
pub mod content;
pub mod dashboard;
pub mod email_logs;
pub mod gallery;
pub mod health;
pub mod newsletter;
pub mod rentals;
pub mod testimonials;
pub mod upload;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// `{message}` body returned by deletes and other acknowledgements.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Trimmed query value; an empty parameter counts as absent.
pub(crate) fn non_empty(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn bool_param(raw: &Option<String>, name: &str) -> ApiResult<Option<bool>> {
    non_empty(raw)
        .map(|s| match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ApiError::invalid(format!(
                "Invalid value for '{}', expected true or false",
                name
            ))),
        })
        .transpose()
}

/// Parses a query value into one of the string enums of the data model.
pub(crate) fn enum_param<T>(raw: &Option<String>) -> ApiResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    non_empty(raw)
        .map(|s| s.parse::<T>())
        .transpose()
        .map_err(|e| ApiError::invalid(format!("Invalid {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::BookingStatus;

    #[test]
    fn test_bool_param() {
        assert_eq!(bool_param(&None, "x").unwrap(), None);
        assert_eq!(bool_param(&Some(" ".into()), "x").unwrap(), None);
        assert_eq!(bool_param(&Some("TRUE".into()), "x").unwrap(), Some(true));
        assert_eq!(bool_param(&Some("0".into()), "x").unwrap(), Some(false));
        assert!(bool_param(&Some("maybe".into()), "x").is_err());
    }

    #[test]
    fn test_enum_param() {
        let parsed: Option<BookingStatus> = enum_param(&Some("Paid".into())).unwrap();
        assert_eq!(parsed, Some(BookingStatus::Paid));
        assert!(enum_param::<BookingStatus>(&Some("nope".into())).is_err());
    }
}

//! Client-side error taxonomy and the conversion of store failures into
//! banner text.
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Problems detected before any request reaches the Post Store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select at least one post")]
    EmptySelection,
    #[error("Please select a date")]
    MissingDate,
    #[error("Please select a time")]
    MissingTime,
    #[error("Scheduled time must be in the future")]
    NotInFuture,
    #[error("{0} does not exist in the local timezone")]
    NonexistentLocalTime(NaiveDateTime),
    #[error("End date {end} is before start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("Stagger interval must be at least 1 minute")]
    InvalidStaggerInterval,
    #[error("Stagger interval is too large for this many posts")]
    StaggerSpanTooLarge,
    #[error("Invalid month: {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
}

/// Non-success response returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .message.as_deref().unwrap_or(GENERIC_ERROR_MESSAGE))]
pub struct ApiError {
    pub status: u16,
    pub message: Option<String>,
}

/// Human-readable message for a failed store call. Prefers the backend's
/// own message, then the outermost non-empty context, then a generic line.
pub fn describe(err: &anyhow::Error) -> String {
    if let Some(api) = err.chain().find_map(|e| e.downcast_ref::<ApiError>()) {
        return api.to_string();
    }
    err.chain()
        .map(|e| e.to_string())
        .find(|msg| !msg.trim().is_empty())
        .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
}

//! Small helpers shared by the application modules.

use time::{Date, OffsetDateTime};

/// The current UTC calendar date; due dates and overdue checks use it.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Absolute path of a route mounted under `/api/{module}`.
pub fn api_path(module: &str, path: &str) -> String {
    format!("/api/{module}{path}")
}

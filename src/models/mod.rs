//! Data models for the volunteer scheduler.
//!
//! JSON field names are camelCase to match the dashboard client.

mod availability;
mod conflict;
mod event;
mod notification;
mod schedule;
mod swap;
mod team;
mod volunteer;

pub use availability::*;
pub use conflict::*;
pub use event::*;
pub use notification::*;
pub use schedule::*;
pub use swap::*;
pub use team::*;
pub use volunteer::*;

use chrono::NaiveDateTime;

/// Storage format for wall-clock timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()
}

/// Generate a fresh entity id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Trim an optional text field, mapping blank input to `None`.
pub fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Current time as an RFC 3339 string, used for audit columns.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

//! Scheduling rules: double-booking guard, bulk conflict scan, staffing
//! status, availability matching and swap resolution.

pub mod availability;
pub mod detector;
pub mod guard;
pub mod status;
pub mod swap;

pub use detector::find_all_conflicts;
pub use guard::{check_conflict, OccurrenceKey};
pub use status::{event_status, EventStatus};

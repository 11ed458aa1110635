//! Staffing status roll-up for the dashboard.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::models::{AssignmentView, Event, Schedule};

/// Fewer assigned volunteers than this leaves an event incomplete.
pub const MIN_STAFFED: usize = 5;
/// An event needs at least this many volunteers to be complete.
pub const FULLY_STAFFED: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Complete,
    Warning,
    Incomplete,
}

pub fn event_status(assigned: usize, has_conflict: bool) -> EventStatus {
    if assigned < MIN_STAFFED {
        EventStatus::Incomplete
    } else if assigned < FULLY_STAFFED || has_conflict {
        EventStatus::Warning
    } else {
        EventStatus::Complete
    }
}

/// One row of `GET /api/dashboard/services`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub event: Event,
    pub team_count: usize,
    pub volunteer_count: usize,
    pub status: EventStatus,
    pub has_conflicts: bool,
}

impl ServiceSummary {
    /// Summarize `event` from every schedule and filled assignment in the
    /// store; rows for other events are ignored.
    pub fn build(
        event: Event,
        schedules: &[Schedule],
        assignments: &[AssignmentView],
        conflicted_events: &BTreeSet<String>,
    ) -> Self {
        let team_count = schedules
            .iter()
            .filter(|s| s.event_id == event.id)
            .map(|s| s.team_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        let volunteer_count = assignments
            .iter()
            .filter(|a| a.event.id == event.id)
            .map(|a| a.volunteer.id.as_str())
            .collect::<HashSet<_>>()
            .len();
        let has_conflicts = conflicted_events.contains(&event.id);

        Self {
            status: event_status(volunteer_count, has_conflicts),
            event,
            team_count,
            volunteer_count,
            has_conflicts,
        }
    }
}

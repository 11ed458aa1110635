//! Joined assignment views and conflict payloads.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{Schedule, ScheduleDetail, VolunteerSummary};

/// The event fields an assignment needs for collision checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventRef {
    pub id: String,
    pub name: String,
    pub starts_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TeamRef {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleRef {
    pub id: String,
    pub name: String,
}

/// A filled assignment joined with everything it points at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
    pub detail: ScheduleDetail,
    pub schedule: Schedule,
    pub event: EventRef,
    pub team: TeamRef,
    pub role: RoleRef,
    pub volunteer: VolunteerSummary,
}

/// Body of a 409 answer: the existing assignment the caller collided with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDetail {
    pub schedule_detail: ScheduleDetail,
    pub schedule: Schedule,
    pub role: RoleRef,
    pub team: TeamRef,
}

impl From<&AssignmentView> for ConflictDetail {
    fn from(view: &AssignmentView) -> Self {
        Self {
            schedule_detail: view.detail.clone(),
            schedule: view.schedule.clone(),
            role: view.role.clone(),
            team: view.team.clone(),
        }
    }
}

/// One colliding assignment inside a [`ConflictReport`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictAssignment {
    pub schedule_detail_id: String,
    pub schedule_id: String,
    pub event_id: String,
    pub event_name: String,
    pub team_id: String,
    pub team_name: String,
    pub team_color: String,
    pub role_id: String,
    pub role_name: String,
}

impl From<&AssignmentView> for ConflictAssignment {
    fn from(view: &AssignmentView) -> Self {
        Self {
            schedule_detail_id: view.detail.id.clone(),
            schedule_id: view.schedule.id.clone(),
            event_id: view.event.id.clone(),
            event_name: view.event.name.clone(),
            team_id: view.team.id.clone(),
            team_name: view.team.name.clone(),
            team_color: view.team.color.clone(),
            role_id: view.role.id.clone(),
            role_name: view.role.name.clone(),
        }
    }
}

/// A volunteer booked more than once at the same occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub volunteer: VolunteerSummary,
    pub event_date: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub assignments: Vec<ConflictAssignment>,
}

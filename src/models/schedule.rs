//! Schedule and schedule detail (assignment) models.

use serde::{Deserialize, Serialize};

use super::{new_id, normalize_text, now_rfc3339};
use crate::errors::{AppError, FieldErrors};

/// Publication state of a team schedule.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    #[default]
    Draft,
    Published,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Draft => "draft",
            ScheduleStatus::Published => "published",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ScheduleStatus::Draft),
            "published" => Some(ScheduleStatus::Published),
            _ => None,
        }
    }
}

/// One team's roster for one event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub event_id: String,
    pub team_id: String,
    pub status: ScheduleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Number of empty slots to open for a role when a schedule is created.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRequest {
    pub role_id: String,
    #[serde(default = "default_slot_count")]
    pub count: u32,
}

fn default_slot_count() -> u32 {
    1
}

/// Upper bound on slots opened per role in one request.
pub const MAX_SLOTS_PER_ROLE: u32 = 20;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    pub event_id: String,
    pub team_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub slots: Vec<SlotRequest>,
}

impl CreateScheduleRequest {
    pub fn validate(&self) -> Result<ScheduleStatus, AppError> {
        let mut errors = FieldErrors::new();
        errors.require("eventId", &self.event_id);
        errors.require("teamId", &self.team_id);
        let status = parse_schedule_status(&mut errors, self.status.as_deref());
        for slot in &self.slots {
            if slot.count == 0 || slot.count > MAX_SLOTS_PER_ROLE {
                errors.push(
                    "slots",
                    format!("slot count must be between 1 and {}", MAX_SLOTS_PER_ROLE),
                );
            }
        }
        errors.into_result()?;
        Ok(status)
    }

    pub fn to_schedule(&self, status: ScheduleStatus) -> Schedule {
        let now = now_rfc3339();
        Schedule {
            id: new_id(),
            event_id: self.event_id.clone(),
            team_id: self.team_id.clone(),
            status,
            notes: normalize_text(self.notes.clone()),
            created_by: normalize_text(self.created_by.clone()),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScheduleRequest {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Schedule {
    pub fn apply(&mut self, update: UpdateScheduleRequest) -> Result<(), AppError> {
        if let Some(raw) = update.status.as_deref() {
            let mut errors = FieldErrors::new();
            let status = parse_schedule_status(&mut errors, Some(raw));
            errors.into_result()?;
            self.status = status;
        }
        if update.notes.is_some() {
            self.notes = normalize_text(update.notes);
        }
        self.updated_at = now_rfc3339();
        Ok(())
    }
}

/// Query parameters for `GET /api/schedules`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleFilter {
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ScheduleFilter {
    pub fn matches(&self, schedule: &Schedule) -> bool {
        self.team_id.as_ref().map_or(true, |t| &schedule.team_id == t)
            && self.event_id.as_ref().map_or(true, |e| &schedule.event_id == e)
            && self
                .status
                .as_deref()
                .map_or(true, |s| schedule.status.as_str() == s)
    }
}

fn parse_schedule_status(errors: &mut FieldErrors, raw: Option<&str>) -> ScheduleStatus {
    match raw {
        None => ScheduleStatus::default(),
        Some(raw) => ScheduleStatus::from_str(raw).unwrap_or_else(|| {
            errors.push("status", "status must be one of draft, published");
            ScheduleStatus::default()
        }),
    }
}

/// Confirmation state of a single assignment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    #[default]
    Pending,
    Confirmed,
    Unavailable,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Confirmed => "confirmed",
            AssignmentStatus::Unavailable => "unavailable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AssignmentStatus::Pending),
            "confirmed" => Some(AssignmentStatus::Confirmed),
            "unavailable" => Some(AssignmentStatus::Unavailable),
            _ => None,
        }
    }
}

/// Binds one volunteer to one role within one schedule.
///
/// `volunteer_id` is `None` for a slot that still needs filling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDetail {
    pub id: String,
    pub schedule_id: String,
    pub role_id: String,
    pub volunteer_id: Option<String>,
    pub status: AssignmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trainee_id: Option<String>,
}

impl ScheduleDetail {
    pub fn empty_slot(schedule_id: &str, role_id: &str) -> Self {
        Self {
            id: new_id(),
            schedule_id: schedule_id.to_string(),
            role_id: role_id.to_string(),
            volunteer_id: None,
            status: AssignmentStatus::Pending,
            trainee_id: None,
        }
    }
}

/// How the caller chose to settle a reported collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Remove the colliding assignment, then insert.
    Replace,
    /// Insert anyway, knowingly double-booking the volunteer.
    Both,
}

impl Resolution {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "replace" => Some(Resolution::Replace),
            "both" => Some(Resolution::Both),
            _ => None,
        }
    }
}

/// Request body for `POST /api/schedule-details`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleDetailRequest {
    pub schedule_id: String,
    pub role_id: String,
    #[serde(default)]
    pub volunteer_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub trainee_id: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl CreateScheduleDetailRequest {
    pub fn into_detail(self) -> Result<(ScheduleDetail, Option<Resolution>), AppError> {
        let mut errors = FieldErrors::new();
        errors.require("scheduleId", &self.schedule_id);
        errors.require("roleId", &self.role_id);
        let status = parse_assignment_status(&mut errors, self.status.as_deref());
        let resolution = match self.resolution.as_deref() {
            None => None,
            Some(raw) => {
                let parsed = Resolution::from_str(raw);
                if parsed.is_none() {
                    errors.push("resolution", "resolution must be one of replace, both");
                }
                parsed
            }
        };
        errors.into_result()?;

        let detail = ScheduleDetail {
            id: new_id(),
            schedule_id: self.schedule_id,
            role_id: self.role_id,
            volunteer_id: normalize_text(self.volunteer_id),
            status,
            trainee_id: normalize_text(self.trainee_id),
        };
        Ok((detail, resolution))
    }
}

/// Request body for `PUT /api/schedule-details/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScheduleDetailRequest {
    #[serde(default)]
    pub volunteer_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub trainee_id: Option<String>,
}

impl UpdateScheduleDetailRequest {
    pub fn parse_status(&self) -> Result<Option<AssignmentStatus>, AppError> {
        match self.status.as_deref() {
            None => Ok(None),
            Some(raw) => {
                let mut errors = FieldErrors::new();
                let status = parse_assignment_status(&mut errors, Some(raw));
                errors.into_result()?;
                Ok(Some(status))
            }
        }
    }
}

fn parse_assignment_status(errors: &mut FieldErrors, raw: Option<&str>) -> AssignmentStatus {
    match raw {
        None => AssignmentStatus::default(),
        Some(raw) => AssignmentStatus::from_str(raw).unwrap_or_else(|| {
            errors.push(
                "status",
                "status must be one of pending, confirmed, unavailable",
            );
            AssignmentStatus::default()
        }),
    }
}

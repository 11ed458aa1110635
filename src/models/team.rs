//! Team, role and membership models.

use serde::{Deserialize, Serialize};

use super::{new_id, normalize_text};
use crate::errors::{AppError, FieldErrors};

/// Color assigned to a team when none is given.
pub const DEFAULT_TEAM_COLOR: &str = "#3f51b5";

/// A named group of volunteers (a ministry).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader_id: Option<String>,
    pub color: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub leader_id: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl CreateTeamRequest {
    pub fn into_team(self) -> Result<Team, AppError> {
        let mut errors = FieldErrors::new();
        errors.require("name", &self.name);
        if let Some(color) = &self.color {
            validate_color(&mut errors, color);
        }
        errors.into_result()?;

        Ok(Team {
            id: new_id(),
            name: self.name.trim().to_string(),
            description: normalize_text(self.description),
            leader_id: normalize_text(self.leader_id),
            color: normalize_text(self.color).unwrap_or_else(|| DEFAULT_TEAM_COLOR.to_string()),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTeamRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub leader_id: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl Team {
    pub fn apply(&mut self, update: UpdateTeamRequest) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &update.name {
            errors.require("name", name);
        }
        if let Some(color) = &update.color {
            validate_color(&mut errors, color);
        }
        errors.into_result()?;

        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if update.description.is_some() {
            self.description = normalize_text(update.description);
        }
        if update.leader_id.is_some() {
            self.leader_id = normalize_text(update.leader_id);
        }
        if let Some(color) = update.color {
            self.color = color.trim().to_string();
        }
        Ok(())
    }
}

fn validate_color(errors: &mut FieldErrors, color: &str) {
    let color = color.trim();
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        errors.push("color", "color must be a #rrggbb hex value");
    }
}

/// A function within exactly one team ("VMix", "Camera 1").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub team_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub requires_training: bool,
}

/// Request body for `POST /api/teams/{id}/roles`; the team comes from the path.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requires_training: bool,
}

impl CreateRoleRequest {
    pub fn into_role(self, team_id: &str) -> Result<Role, AppError> {
        let mut errors = FieldErrors::new();
        errors.require("name", &self.name);
        errors.into_result()?;

        Ok(Role {
            id: new_id(),
            team_id: team_id.to_string(),
            name: self.name.trim().to_string(),
            description: normalize_text(self.description),
            requires_training: self.requires_training,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requires_training: Option<bool>,
}

impl Role {
    pub fn apply(&mut self, update: UpdateRoleRequest) -> Result<(), AppError> {
        if let Some(name) = &update.name {
            let mut errors = FieldErrors::new();
            errors.require("name", name);
            errors.into_result()?;
            self.name = name.trim().to_string();
        }
        if update.description.is_some() {
            self.description = normalize_text(update.description);
        }
        if let Some(requires_training) = update.requires_training {
            self.requires_training = requires_training;
        }
        Ok(())
    }
}

/// Links a volunteer to a team and the roles they can fill there.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub volunteer_id: String,
    pub team_id: String,
    pub role_ids: Vec<String>,
    pub is_trainee: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTeamMemberRequest {
    pub volunteer_id: String,
    pub team_id: String,
    #[serde(default)]
    pub role_ids: Vec<String>,
    #[serde(default)]
    pub is_trainee: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl AddTeamMemberRequest {
    /// Validate the request against the roles of the target team.
    pub fn into_member(self, team_roles: &[Role]) -> Result<TeamMember, AppError> {
        let mut errors = FieldErrors::new();
        errors.require("volunteerId", &self.volunteer_id);
        errors.require("teamId", &self.team_id);
        for role_id in &self.role_ids {
            if !team_roles.iter().any(|r| &r.id == role_id) {
                errors.push(
                    "roleIds",
                    format!("role {} does not belong to the team", role_id),
                );
            }
        }
        errors.into_result()?;

        let mut role_ids = self.role_ids;
        role_ids.sort();
        role_ids.dedup();

        Ok(TeamMember {
            volunteer_id: self.volunteer_id,
            team_id: self.team_id,
            role_ids,
            is_trainee: self.is_trainee,
            is_active: self.is_active,
        })
    }
}

//! Volunteer model.

use serde::{Deserialize, Serialize};

use super::{new_id, normalize_text};
use crate::errors::{AppError, FieldErrors};

/// Access level of a volunteer account.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VolunteerRole {
    #[default]
    Volunteer,
    Leader,
    Admin,
}

impl VolunteerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolunteerRole::Volunteer => "volunteer",
            VolunteerRole::Leader => "leader",
            VolunteerRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "volunteer" => Some(VolunteerRole::Volunteer),
            "leader" => Some(VolunteerRole::Leader),
            "admin" => Some(VolunteerRole::Admin),
            _ => None,
        }
    }
}

/// A person who can be scheduled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Volunteer {
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: VolunteerRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// The identity fields shown next to a conflict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl From<&Volunteer> for VolunteerSummary {
    fn from(v: &Volunteer) -> Self {
        Self {
            id: v.id.clone(),
            name: v.name.clone(),
            email: v.email.clone(),
            avatar: v.avatar.clone(),
        }
    }
}

/// Request body for creating a volunteer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolunteerRequest {
    pub username: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl CreateVolunteerRequest {
    pub fn into_volunteer(self) -> Result<Volunteer, AppError> {
        let mut errors = FieldErrors::new();
        errors.require("username", &self.username);
        errors.require("name", &self.name);
        validate_email(&mut errors, &self.email);
        let role = parse_role(&mut errors, self.role.as_deref());
        errors.into_result()?;

        Ok(Volunteer {
            id: new_id(),
            username: self.username.trim().to_string(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: normalize_text(self.phone),
            role,
            avatar: normalize_text(self.avatar),
        })
    }
}

/// Request body for updating a volunteer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVolunteerRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Volunteer {
    /// Merge a partial update into this volunteer.
    pub fn apply(&mut self, update: UpdateVolunteerRequest) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if let Some(username) = &update.username {
            errors.require("username", username);
        }
        if let Some(name) = &update.name {
            errors.require("name", name);
        }
        if let Some(email) = &update.email {
            validate_email(&mut errors, email);
        }
        let role = update
            .role
            .as_deref()
            .map(|r| parse_role(&mut errors, Some(r)));
        errors.into_result()?;

        if let Some(username) = update.username {
            self.username = username.trim().to_string();
        }
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = update.email {
            self.email = email.trim().to_string();
        }
        if update.phone.is_some() {
            self.phone = normalize_text(update.phone);
        }
        if let Some(role) = role {
            self.role = role;
        }
        if update.avatar.is_some() {
            self.avatar = normalize_text(update.avatar);
        }
        Ok(())
    }
}

fn validate_email(errors: &mut FieldErrors, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        errors.push("email", "email is required");
    } else if !email.contains('@') {
        errors.push("email", "email must be a valid address");
    }
}

fn parse_role(errors: &mut FieldErrors, role: Option<&str>) -> VolunteerRole {
    match role {
        None => VolunteerRole::default(),
        Some(raw) => VolunteerRole::from_str(raw).unwrap_or_else(|| {
            errors.push("role", "role must be one of volunteer, leader, admin");
            VolunteerRole::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateVolunteerRequest {
        CreateVolunteerRequest {
            username: "ana".into(),
            name: " Ana Souza ".into(),
            email: "ana@example.com".into(),
            phone: Some("".into()),
            role: None,
            avatar: None,
        }
    }

    #[test]
    fn test_create_trims_and_defaults() {
        let v = request().into_volunteer().unwrap();
        assert_eq!(v.name, "Ana Souza");
        assert_eq!(v.role, VolunteerRole::Volunteer);
        assert!(v.phone.is_none());
    }

    #[test]
    fn test_create_rejects_bad_fields() {
        let mut req = request();
        req.email = "not-an-email".into();
        req.role = Some("pastor".into());
        match req.into_volunteer() {
            Err(AppError::Validation(fields)) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["email", "role"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_partial_update() {
        let mut v = request().into_volunteer().unwrap();
        v.apply(UpdateVolunteerRequest {
            role: Some("leader".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(v.role, VolunteerRole::Leader);
        assert_eq!(v.username, "ana");
    }
}

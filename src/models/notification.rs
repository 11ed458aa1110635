//! Volunteer notification inbox.

use serde::{Deserialize, Serialize};

use super::{new_id, normalize_text, now_rfc3339};
use crate::errors::{AppError, FieldErrors};

/// What a notification is about.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SwapRequest,
    SwapRequestUpdate,
    SchedulePublished,
    #[default]
    General,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::SwapRequest => "swap_request",
            NotificationKind::SwapRequestUpdate => "swap_request_update",
            NotificationKind::SchedulePublished => "schedule_published",
            NotificationKind::General => "general",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "swap_request" => Some(NotificationKind::SwapRequest),
            "swap_request_update" => Some(NotificationKind::SwapRequestUpdate),
            "schedule_published" => Some(NotificationKind::SchedulePublished),
            "general" => Some(NotificationKind::General),
            _ => None,
        }
    }
}

/// One inbox entry for a volunteer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub volunteer_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Id of the entity the notification points at, e.g. a swap request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

impl Notification {
    /// An unread notification with no message body.
    pub fn new(
        volunteer_id: &str,
        kind: NotificationKind,
        title: &str,
        related_id: Option<&str>,
    ) -> Self {
        Self {
            id: new_id(),
            volunteer_id: volunteer_id.to_string(),
            kind,
            title: title.to_string(),
            message: None,
            related_id: related_id.map(str::to_string),
            is_read: false,
            created_at: now_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub volunteer_id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub related_id: Option<String>,
}

impl CreateNotificationRequest {
    pub fn into_notification(self) -> Result<Notification, AppError> {
        let mut errors = FieldErrors::new();
        errors.require("volunteerId", &self.volunteer_id);
        errors.require("title", &self.title);
        let kind = match self.kind.as_deref().map(str::trim) {
            None | Some("") => NotificationKind::default(),
            Some(raw) => NotificationKind::from_str(raw).unwrap_or_else(|| {
                errors.push(
                    "type",
                    "type must be one of swap_request, swap_request_update, \
                     schedule_published, general",
                );
                NotificationKind::default()
            }),
        };
        errors.into_result()?;

        let mut notification = Notification::new(
            self.volunteer_id.trim(),
            kind,
            self.title.trim(),
            None,
        );
        notification.message = normalize_text(self.message);
        notification.related_id = normalize_text(self.related_id);
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: Option<&str>, title: &str) -> CreateNotificationRequest {
        CreateNotificationRequest {
            volunteer_id: " v1 ".into(),
            kind: kind.map(str::to_string),
            title: title.into(),
            message: Some("   ".into()),
            related_id: Some("s1".into()),
        }
    }

    #[test]
    fn test_new_notification_is_unread() {
        let notification = request(Some("swap_request"), " Swap requested ")
            .into_notification()
            .unwrap();
        assert_eq!(notification.volunteer_id, "v1");
        assert_eq!(notification.kind, NotificationKind::SwapRequest);
        assert_eq!(notification.title, "Swap requested");
        assert_eq!(notification.message, None);
        assert_eq!(notification.related_id.as_deref(), Some("s1"));
        assert!(!notification.is_read);
    }

    #[test]
    fn test_kind_defaults_to_general() {
        let notification = request(None, "Welcome").into_notification().unwrap();
        assert_eq!(notification.kind, NotificationKind::General);
    }

    #[test]
    fn test_unknown_kind_and_blank_title_rejected() {
        match request(Some("sms"), " ").into_notification() {
            Err(AppError::Validation(fields)) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["title", "type"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_type_field_is_renamed() {
        let notification =
            Notification::new("v1", NotificationKind::SwapRequestUpdate, "Done", None);
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["type"], "swap_request_update");
        assert_eq!(json["isRead"], false);
        assert!(json.get("relatedId").is_none());
    }
}

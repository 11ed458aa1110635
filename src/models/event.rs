//! Event (service occurrence) model.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{new_id, normalize_text};
use crate::errors::{AppError, FieldErrors};

/// Kind of occurrence, used for display and filtering only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    #[default]
    RegularService,
    SpecialEvent,
    Conference,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RegularService => "regular_service",
            EventType::SpecialEvent => "special_event",
            EventType::Conference => "conference",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "regular_service" => Some(EventType::RegularService),
            "special_event" => Some(EventType::SpecialEvent),
            "conference" => Some(EventType::Conference),
            _ => None,
        }
    }
}

/// A service or special event happening at one instant and place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    pub starts_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub event_type: EventType,
    pub is_recurring: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub name: String,
    pub starts_at: NaiveDateTime,
    #[serde(default)]
    pub ends_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
}

impl CreateEventRequest {
    pub fn into_event(self) -> Result<Event, AppError> {
        let mut errors = FieldErrors::new();
        errors.require("name", &self.name);
        let event_type = parse_event_type(&mut errors, self.event_type.as_deref());
        validate_window(&mut errors, &self.starts_at, self.ends_at.as_ref());
        errors.into_result()?;

        Ok(Event {
            id: new_id(),
            name: self.name.trim().to_string(),
            starts_at: truncate_subseconds(self.starts_at),
            ends_at: self.ends_at.map(truncate_subseconds),
            location: normalize_text(self.location),
            description: normalize_text(self.description),
            event_type,
            is_recurring: self.is_recurring,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub starts_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub ends_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub is_recurring: Option<bool>,
}

impl Event {
    pub fn apply(&mut self, update: UpdateEventRequest) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &update.name {
            errors.require("name", name);
        }
        let event_type = update
            .event_type
            .as_deref()
            .map(|t| parse_event_type(&mut errors, Some(t)));
        let starts_at = update.starts_at.unwrap_or(self.starts_at);
        let ends_at = update.ends_at.or(self.ends_at);
        validate_window(&mut errors, &starts_at, ends_at.as_ref());
        errors.into_result()?;

        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        self.starts_at = truncate_subseconds(starts_at);
        self.ends_at = ends_at.map(truncate_subseconds);
        if update.location.is_some() {
            self.location = normalize_text(update.location);
        }
        if update.description.is_some() {
            self.description = normalize_text(update.description);
        }
        if let Some(event_type) = event_type {
            self.event_type = event_type;
        }
        if let Some(is_recurring) = update.is_recurring {
            self.is_recurring = is_recurring;
        }
        Ok(())
    }
}

/// Query parameters for `GET /api/events`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(default)]
    pub from: Option<NaiveDateTime>,
    #[serde(default)]
    pub to: Option<NaiveDateTime>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.from.map_or(true, |from| event.starts_at >= from)
            && self.to.map_or(true, |to| event.starts_at <= to)
    }
}

fn parse_event_type(errors: &mut FieldErrors, raw: Option<&str>) -> EventType {
    match raw {
        None => EventType::default(),
        Some(raw) => EventType::from_str(raw).unwrap_or_else(|| {
            errors.push(
                "eventType",
                "eventType must be one of regular_service, special_event, conference",
            );
            EventType::default()
        }),
    }
}

fn validate_window(
    errors: &mut FieldErrors,
    starts_at: &NaiveDateTime,
    ends_at: Option<&NaiveDateTime>,
) {
    if let Some(ends_at) = ends_at {
        if ends_at < starts_at {
            errors.push("endsAt", "endsAt must not precede startsAt");
        }
    }
}

/// Occurrence keys compare to the second; stored values never carry fractions.
fn truncate_subseconds(ts: NaiveDateTime) -> NaiveDateTime {
    use chrono::Timelike;
    ts.with_nanosecond(0).unwrap_or(ts)
}

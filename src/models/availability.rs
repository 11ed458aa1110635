//! Volunteer availability rules.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::{new_id, normalize_text};
use crate::errors::{AppError, FieldErrors};

/// Wall-clock format for the daily window of a rule.
pub const CLOCK_FORMAT: &str = "%H:%M";

/// A recurring or dated window in which a volunteer is (un)available.
///
/// Every constraint that is set must hold for the rule to cover an instant:
/// `day_of_week` (0 = Sunday), the `start_time..end_time` daily window and the
/// inclusive `start_date..=end_date` range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRule {
    pub id: String,
    pub volunteer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub is_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAvailabilityRuleRequest {
    pub volunteer_id: String,
    #[serde(default)]
    pub day_of_week: Option<u8>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl CreateAvailabilityRuleRequest {
    pub fn into_rule(self) -> Result<AvailabilityRule, AppError> {
        let rule = AvailabilityRule {
            id: new_id(),
            volunteer_id: self.volunteer_id.trim().to_string(),
            day_of_week: self.day_of_week,
            start_time: normalize_text(self.start_time),
            end_time: normalize_text(self.end_time),
            is_available: self.is_available,
            reason: normalize_text(self.reason),
            start_date: self.start_date,
            end_date: self.end_date,
        };
        rule.validate()?;
        Ok(rule)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAvailabilityRuleRequest {
    #[serde(default)]
    pub day_of_week: Option<u8>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub is_available: Option<bool>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl AvailabilityRule {
    pub fn apply(&mut self, update: UpdateAvailabilityRuleRequest) -> Result<(), AppError> {
        let mut next = self.clone();
        if update.day_of_week.is_some() {
            next.day_of_week = update.day_of_week;
        }
        if update.start_time.is_some() {
            next.start_time = normalize_text(update.start_time);
        }
        if update.end_time.is_some() {
            next.end_time = normalize_text(update.end_time);
        }
        if let Some(is_available) = update.is_available {
            next.is_available = is_available;
        }
        if update.reason.is_some() {
            next.reason = normalize_text(update.reason);
        }
        if update.start_date.is_some() {
            next.start_date = update.start_date;
        }
        if update.end_date.is_some() {
            next.end_date = update.end_date;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.require("volunteerId", &self.volunteer_id);
        if self.day_of_week.is_some_and(|d| d > 6) {
            errors.push("dayOfWeek", "dayOfWeek must be between 0 (Sunday) and 6");
        }
        let start = parse_clock(&mut errors, "startTime", self.start_time.as_deref());
        let end = parse_clock(&mut errors, "endTime", self.end_time.as_deref());
        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                errors.push("endTime", "endTime must be after startTime");
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                errors.push("endDate", "endDate must not precede startDate");
            }
        }
        errors.into_result()
    }

    pub fn start_clock(&self) -> Option<NaiveTime> {
        self.start_time
            .as_deref()
            .and_then(|t| NaiveTime::parse_from_str(t, CLOCK_FORMAT).ok())
    }

    pub fn end_clock(&self) -> Option<NaiveTime> {
        self.end_time
            .as_deref()
            .and_then(|t| NaiveTime::parse_from_str(t, CLOCK_FORMAT).ok())
    }
}

fn parse_clock(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<NaiveTime> {
    let raw = raw?;
    match NaiveTime::parse_from_str(raw, CLOCK_FORMAT) {
        Ok(t) => Some(t),
        Err(_) => {
            errors.push(field, format!("{} must use HH:MM", field));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateAvailabilityRuleRequest {
        CreateAvailabilityRuleRequest {
            volunteer_id: "v1".into(),
            day_of_week: Some(0),
            start_time: Some("08:00".into()),
            end_time: Some("12:00".into()),
            is_available: false,
            reason: Some("Travel".into()),
            start_date: None,
            end_date: None,
        }
    }

    #[test]
    fn test_valid_rule() {
        let rule = request().into_rule().unwrap();
        assert_eq!(rule.start_clock(), NaiveTime::from_hms_opt(8, 0, 0));
    }

    #[test]
    fn test_rejects_inverted_window_and_bad_day() {
        let mut req = request();
        req.day_of_week = Some(7);
        req.end_time = Some("07:00".into());
        match req.into_rule() {
            Err(AppError::Validation(fields)) => assert_eq!(fields.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_keeps_rule_on_invalid_update() {
        let mut rule = request().into_rule().unwrap();
        let result = rule.apply(UpdateAvailabilityRuleRequest {
            start_time: Some("9am".into()),
            ..Default::default()
        });
        assert!(result.is_err());
        assert_eq!(rule.start_time.as_deref(), Some("08:00"));
    }
}

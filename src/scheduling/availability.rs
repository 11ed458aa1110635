//! Matching availability rules against an event instant.

use chrono::{Datelike, NaiveDateTime};

use crate::models::AvailabilityRule;

/// Whether every constraint set on the rule holds at `at`.
///
/// Dates are inclusive on both ends, the daily window is half-open
/// (`start_time <= t < end_time`).
pub fn covers(rule: &AvailabilityRule, at: NaiveDateTime) -> bool {
    let date = at.date();
    if rule.start_date.is_some_and(|start| date < start) {
        return false;
    }
    if rule.end_date.is_some_and(|end| date > end) {
        return false;
    }
    if let Some(day) = rule.day_of_week {
        if at.weekday().num_days_from_sunday() != u32::from(day) {
            return false;
        }
    }
    let time = at.time();
    if rule.start_clock().is_some_and(|start| time < start) {
        return false;
    }
    if rule.end_clock().is_some_and(|end| time >= end) {
        return false;
    }
    true
}

/// First rule marking the volunteer unavailable at `at`, if any.
pub fn blocking_rule(rules: &[AvailabilityRule], at: NaiveDateTime) -> Option<&AvailabilityRule> {
    rules
        .iter()
        .find(|rule| !rule.is_available && covers(rule, at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_timestamp;
    use chrono::NaiveDate;

    fn rule(is_available: bool) -> AvailabilityRule {
        AvailabilityRule {
            id: "a1".into(),
            volunteer_id: "v1".into(),
            day_of_week: None,
            start_time: None,
            end_time: None,
            is_available,
            reason: None,
            start_date: None,
            end_date: None,
        }
    }

    // 2024-06-02 is a Sunday.
    const SUNDAY_NINE: &str = "2024-06-02T09:00:00";

    #[test]
    fn test_unconstrained_rule_covers_everything() {
        let at = parse_timestamp(SUNDAY_NINE).unwrap();
        assert!(covers(&rule(false), at));
    }

    #[test]
    fn test_weekday_matching_counts_from_sunday() {
        let at = parse_timestamp(SUNDAY_NINE).unwrap();
        let mut r = rule(false);
        r.day_of_week = Some(0);
        assert!(covers(&r, at));
        r.day_of_week = Some(1);
        assert!(!covers(&r, at));
    }

    #[test]
    fn test_daily_window_is_half_open() {
        let mut r = rule(false);
        r.start_time = Some("09:00".into());
        r.end_time = Some("12:00".into());
        assert!(covers(&r, parse_timestamp("2024-06-02T09:00:00").unwrap()));
        assert!(covers(&r, parse_timestamp("2024-06-02T11:59:59").unwrap()));
        assert!(!covers(&r, parse_timestamp("2024-06-02T12:00:00").unwrap()));
        assert!(!covers(&r, parse_timestamp("2024-06-02T08:59:00").unwrap()));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let mut r = rule(false);
        r.start_date = NaiveDate::from_ymd_opt(2024, 6, 1);
        r.end_date = NaiveDate::from_ymd_opt(2024, 6, 2);
        assert!(covers(&r, parse_timestamp("2024-06-02T23:00:00").unwrap()));
        assert!(!covers(&r, parse_timestamp("2024-06-03T00:00:00").unwrap()));
        assert!(!covers(&r, parse_timestamp("2024-05-31T23:59:59").unwrap()));
    }

    #[test]
    fn test_only_unavailable_rules_block() {
        let at = parse_timestamp(SUNDAY_NINE).unwrap();
        let rules = vec![rule(true)];
        assert!(blocking_rule(&rules, at).is_none());

        let mut blocked = rule(false);
        blocked.id = "a2".into();
        let rules = vec![rule(true), blocked];
        assert_eq!(blocking_rule(&rules, at).map(|r| r.id.as_str()), Some("a2"));
    }
}

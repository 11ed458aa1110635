//! Bulk double-booking scan.

use std::collections::{BTreeMap, BTreeSet};

use super::guard::OccurrenceKey;
use crate::models::{AssignmentView, ConflictAssignment, ConflictReport};

/// Group assignments by occurrence and report every volunteer booked more
/// than once within a group.
///
/// The output is independent of input order: reports are sorted by
/// (date, location, volunteer name, volunteer id) and each report lists its
/// assignments by (team name, role name, detail id).
pub fn find_all_conflicts(
    assignments: &[AssignmentView],
    match_location: bool,
) -> Vec<ConflictReport> {
    let mut groups: BTreeMap<(OccurrenceKey, &str), Vec<&AssignmentView>> = BTreeMap::new();
    for view in assignments {
        let key = OccurrenceKey::of_ref(&view.event).grouping(match_location);
        groups
            .entry((key, view.volunteer.id.as_str()))
            .or_default()
            .push(view);
    }

    let mut reports: Vec<ConflictReport> = groups
        .into_iter()
        .filter(|(_, views)| views.len() > 1)
        .map(|((key, _), mut views)| {
            views.sort_by(|a, b| {
                (&a.team.name, &a.role.name, &a.detail.id).cmp(&(
                    &b.team.name,
                    &b.role.name,
                    &b.detail.id,
                ))
            });
            let location = if match_location {
                key.location
            } else {
                views.iter().filter_map(|v| v.event.location.clone()).min()
            };
            ConflictReport {
                volunteer: views[0].volunteer.clone(),
                event_date: key.starts_at,
                location,
                assignments: views.into_iter().map(ConflictAssignment::from).collect(),
            }
        })
        .collect();

    reports.sort_by(|a, b| {
        (a.event_date, &a.location, &a.volunteer.name, &a.volunteer.id).cmp(&(
            b.event_date,
            &b.location,
            &b.volunteer.name,
            &b.volunteer.id,
        ))
    });
    reports
}

/// Events touched by at least one report.
pub fn conflicting_event_ids(reports: &[ConflictReport]) -> BTreeSet<String> {
    reports
        .iter()
        .flat_map(|r| r.assignments.iter().map(|a| a.event_id.clone()))
        .collect()
}

//! Schedule-consistency guard.
//!
//! Rejects an assignment write when the volunteer already holds another
//! assignment at the same occurrence. Occurrences collide on exact equality
//! of their start instant (and location, when configured); overlapping
//! intervals with different start times never collide.

use chrono::NaiveDateTime;

use super::availability::blocking_rule;
use crate::db::{GuardedWrite, Storage};
use crate::errors::{AppError, FieldErrors};
use crate::models::{
    AssignmentView, ConflictDetail, Event, EventRef, Resolution, Schedule, ScheduleDetail,
    UpdateScheduleDetailRequest,
};

/// Identifies a schedulable instant: the (date, time[, location]) tuple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OccurrenceKey {
    pub starts_at: NaiveDateTime,
    pub location: Option<String>,
}

impl OccurrenceKey {
    pub fn of_event(event: &Event) -> Self {
        Self {
            starts_at: event.starts_at,
            location: event.location.clone(),
        }
    }

    pub fn of_ref(event: &EventRef) -> Self {
        Self {
            starts_at: event.starts_at,
            location: event.location.clone(),
        }
    }

    /// Location as bound into SQL comparisons; absent and blank are equal.
    pub fn location_text(&self) -> &str {
        self.location.as_deref().unwrap_or("")
    }

    pub fn collides_with(&self, other: &OccurrenceKey, match_location: bool) -> bool {
        self.starts_at == other.starts_at
            && (!match_location || self.location_text() == other.location_text())
    }

    /// The grouping key used by the bulk scan.
    pub fn grouping(&self, match_location: bool) -> OccurrenceKey {
        OccurrenceKey {
            starts_at: self.starts_at,
            location: if match_location {
                self.location.clone()
            } else {
                None
            },
        }
    }
}

/// Find an existing assignment that collides with the candidate occurrence.
///
/// `exclude_detail` skips the slot being rewritten. When several assignments
/// collide the choice is stable: lowest (team name, role name, detail id).
pub fn check_conflict<'a>(
    candidate: &OccurrenceKey,
    existing: &'a [AssignmentView],
    exclude_detail: Option<&str>,
    match_location: bool,
) -> Option<&'a AssignmentView> {
    existing
        .iter()
        .filter(|view| exclude_detail != Some(view.detail.id.as_str()))
        .filter(|view| {
            OccurrenceKey::of_ref(&view.event).collides_with(candidate, match_location)
        })
        .min_by(|a, b| {
            (&a.team.name, &a.role.name, &a.detail.id).cmp(&(
                &b.team.name,
                &b.role.name,
                &b.detail.id,
            ))
        })
}

/// Everything the guard needs to know about the slot's schedule.
struct Target {
    schedule: Schedule,
    event: Event,
}

async fn load_target(store: &dyn Storage, schedule_id: &str) -> Result<Target, AppError> {
    let schedule = store
        .get_schedule(schedule_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Schedule {} not found", schedule_id)))?;
    let event = store.get_event(&schedule.event_id).await?.ok_or_else(|| {
        AppError::NotFound(format!("Event {} not found", schedule.event_id))
    })?;
    Ok(Target { schedule, event })
}

async fn ensure_volunteer(store: &dyn Storage, volunteer_id: &str) -> Result<(), AppError> {
    match store.get_volunteer(volunteer_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!(
            "Volunteer {} not found",
            volunteer_id
        ))),
    }
}

/// Fail with `Unavailable` when one of the volunteer's rules blocks the instant.
pub async fn ensure_available(
    store: &dyn Storage,
    volunteer_id: &str,
    at: NaiveDateTime,
) -> Result<(), AppError> {
    let rules = store.list_availability_rules(volunteer_id).await?;
    match blocking_rule(&rules, at) {
        Some(rule) => {
            tracing::info!(%volunteer_id, rule_id = %rule.id, "Volunteer unavailable");
            Err(AppError::Unavailable(Box::new(rule.clone())))
        }
        None => Ok(()),
    }
}

fn conflict_error(view: &AssignmentView) -> AppError {
    tracing::info!(
        volunteer_id = %view.volunteer.id,
        existing_detail = %view.detail.id,
        starts_at = %view.event.starts_at,
        "Rejected double booking"
    );
    AppError::ScheduleConflict(Box::new(ConflictDetail::from(view)))
}

/// Create an assignment, refusing to double-book its volunteer.
///
/// On conflict nothing is written and the caller receives the colliding
/// assignment so it can choose to replace it or keep both.
pub async fn create_assignment(
    store: &dyn Storage,
    detail: ScheduleDetail,
    resolution: Option<Resolution>,
    match_location: bool,
) -> Result<ScheduleDetail, AppError> {
    let target = load_target(store, &detail.schedule_id).await?;

    let role = store
        .get_role(&detail.role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Role {} not found", detail.role_id)))?;
    if role.team_id != target.schedule.team_id {
        let mut errors = FieldErrors::new();
        errors.push("roleId", "role does not belong to the schedule's team");
        errors.into_result()?;
    }
    if let Some(trainee_id) = &detail.trainee_id {
        ensure_volunteer(store, trainee_id).await?;
    }

    let Some(volunteer_id) = detail.volunteer_id.clone() else {
        // Empty slots cannot collide.
        store.insert_schedule_detail(&detail).await?;
        return Ok(detail);
    };
    ensure_volunteer(store, &volunteer_id).await?;

    if resolution != Some(Resolution::Both) {
        ensure_available(store, &volunteer_id, target.event.starts_at).await?;
    }

    let key = OccurrenceKey::of_event(&target.event);
    match resolution {
        None => match store
            .insert_schedule_detail_guarded(&detail, &key, match_location)
            .await?
        {
            GuardedWrite::Written(written) => Ok(written),
            GuardedWrite::Collision(view) => Err(conflict_error(&view)),
        },
        Some(Resolution::Replace) => {
            let (written, removed) = store
                .replace_schedule_detail_guarded(&detail, &key, match_location)
                .await?;
            if !removed.is_empty() {
                tracing::info!(%volunteer_id, ?removed, "Replaced colliding assignments");
            }
            Ok(written)
        }
        Some(Resolution::Both) => {
            tracing::warn!(
                %volunteer_id,
                starts_at = %key.starts_at,
                "Double booking accepted by caller"
            );
            store.insert_schedule_detail(&detail).await?;
            Ok(detail)
        }
    }
}

/// Write an existing slot whose volunteer changes. Volunteer, status and
/// trainee land in one guarded write, or nothing is written.
async fn write_slot(
    store: &dyn Storage,
    candidate: &ScheduleDetail,
    volunteer_id: &str,
    match_location: bool,
) -> Result<ScheduleDetail, AppError> {
    let target = load_target(store, &candidate.schedule_id).await?;
    ensure_volunteer(store, volunteer_id).await?;
    ensure_available(store, volunteer_id, target.event.starts_at).await?;

    let key = OccurrenceKey::of_event(&target.event);
    match store
        .update_schedule_detail_guarded(candidate, &key, match_location)
        .await?
    {
        GuardedWrite::Written(written) => Ok(written),
        GuardedWrite::Collision(view) => Err(conflict_error(&view)),
    }
}

/// Put a volunteer into an existing slot through the guard.
pub async fn assign_volunteer(
    store: &dyn Storage,
    detail: &ScheduleDetail,
    volunteer_id: &str,
    match_location: bool,
) -> Result<ScheduleDetail, AppError> {
    let mut candidate = detail.clone();
    candidate.volunteer_id = Some(volunteer_id.to_string());
    write_slot(store, &candidate, volunteer_id, match_location).await
}

/// Apply `PUT /api/schedule-details/{id}`.
///
/// Every field is validated before anything is written. A new volunteer goes
/// through the guard together with the status and trainee changes.
pub async fn update_assignment(
    store: &dyn Storage,
    id: &str,
    update: UpdateScheduleDetailRequest,
    match_location: bool,
) -> Result<ScheduleDetail, AppError> {
    let status = update.parse_status()?;
    let current = store
        .get_schedule_detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Schedule detail {} not found", id)))?;

    let mut candidate = current.clone();
    if let Some(status) = status {
        candidate.status = status;
    }
    if let Some(trainee_id) = update.trainee_id.as_deref().map(str::trim) {
        if trainee_id.is_empty() {
            candidate.trainee_id = None;
        } else {
            ensure_volunteer(store, trainee_id).await?;
            candidate.trainee_id = Some(trainee_id.to_string());
        }
    }
    let volunteer_id = update
        .volunteer_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(volunteer_id) = volunteer_id {
        candidate.volunteer_id = Some(volunteer_id.to_string());
    }

    if candidate == current {
        return Ok(current);
    }
    match volunteer_id {
        Some(volunteer_id) if current.volunteer_id.as_deref() != Some(volunteer_id) => {
            write_slot(store, &candidate, volunteer_id, match_location).await
        }
        _ => {
            store.update_schedule_detail(&candidate).await?;
            Ok(candidate)
        }
    }
}

/// Dry-run of the guard for `POST /api/conflicts/check`.
pub async fn preview_conflict(
    store: &dyn Storage,
    volunteer_id: &str,
    event_id: &str,
    match_location: bool,
) -> Result<Option<ConflictDetail>, AppError> {
    ensure_volunteer(store, volunteer_id).await?;
    let event = store
        .get_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))?;

    let key = OccurrenceKey::of_event(&event);
    let existing = store.assignments_for_volunteer(volunteer_id).await?;
    let conflict = check_conflict(&key, &existing, None, match_location);
    Ok(conflict.map(ConflictDetail::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStorage;
    use crate::models::{parse_timestamp, AssignmentStatus};
    use crate::scheduling::fixtures::{seed, view};

    fn key(ts: &str, location: Option<&str>) -> OccurrenceKey {
        OccurrenceKey {
            starts_at: parse_timestamp(ts).unwrap(),
            location: location.map(str::to_string),
        }
    }

    fn camera(detail_id: &str, starts_at: &str, location: Option<&str>) -> AssignmentView {
        view(detail_id, "v1", starts_at, location, "Media", "Camera")
    }

    fn update(
        volunteer_id: Option<&str>,
        status: Option<&str>,
        trainee_id: Option<&str>,
    ) -> UpdateScheduleDetailRequest {
        UpdateScheduleDetailRequest {
            volunteer_id: volunteer_id.map(str::to_string),
            status: status.map(str::to_string),
            trainee_id: trainee_id.map(str::to_string),
        }
    }

    #[test]
    fn test_exact_instant_collides() {
        let existing = vec![camera("d1", "2024-06-02T09:00:00", Some("Main Hall"))];
        let candidate = key("2024-06-02T09:00:00", Some("Main Hall"));
        let hit = check_conflict(&candidate, &existing, None, false);
        assert_eq!(hit.map(|v| v.detail.id.as_str()), Some("d1"));
    }

    #[test]
    fn test_one_minute_apart_does_not_collide() {
        let existing = vec![camera("d1", "2024-06-02T09:00:00", None)];
        let later = key("2024-06-02T09:01:00", None);
        let earlier = key("2024-06-02T08:59:00", None);
        assert!(check_conflict(&later, &existing, None, false).is_none());
        assert!(check_conflict(&earlier, &existing, None, false).is_none());
    }

    #[test]
    fn test_location_only_matters_when_configured() {
        let existing = vec![camera("d1", "2024-06-02T09:00:00", Some("Main Hall"))];
        let candidate = key("2024-06-02T09:00:00", Some("Chapel"));
        assert!(check_conflict(&candidate, &existing, None, false).is_some());
        assert!(check_conflict(&candidate, &existing, None, true).is_none());
    }

    #[test]
    fn test_missing_location_matches_missing_location() {
        let existing = vec![camera("d1", "2024-06-02T09:00:00", None)];
        let candidate = key("2024-06-02T09:00:00", None);
        assert!(check_conflict(&candidate, &existing, None, true).is_some());
    }

    #[test]
    fn test_excluded_slot_is_ignored() {
        let existing = vec![camera("d1", "2024-06-02T09:00:00", None)];
        let candidate = key("2024-06-02T09:00:00", None);
        let conflict = check_conflict(&candidate, &existing, Some("d1"), false);
        assert!(conflict.is_none());
    }

    #[test]
    fn test_choice_is_stable_across_input_order() {
        let a = view("d2", "v1", "2024-06-02T09:00:00", None, "Worship", "Vocals");
        let b = camera("d1", "2024-06-02T09:00:00", None);
        let forward = vec![a.clone(), b.clone()];
        let backward = vec![b, a];
        let candidate = key("2024-06-02T09:00:00", None);
        assert_eq!(
            check_conflict(&candidate, &forward, None, false).map(|v| &v.detail.id),
            check_conflict(&candidate, &backward, None, false).map(|v| &v.detail.id),
        );
    }

    #[tokio::test]
    async fn test_rejected_update_writes_nothing() {
        let store = MemoryStorage::new();
        let seed = seed(&store).await;

        let request = update(Some(seed.bob.as_str()), None, Some("no-such-volunteer"));
        let result = update_assignment(&store, &seed.empty_at_second, request, false).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let detail = store
            .get_schedule_detail(&seed.empty_at_second)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.volunteer_id, None);
        assert_eq!(detail.trainee_id, None);
    }

    #[tokio::test]
    async fn test_conflicting_update_keeps_status() {
        let store = MemoryStorage::new();
        let seed = seed(&store).await;

        let request = update(Some(seed.alice.as_str()), Some("confirmed"), None);
        let result = update_assignment(&store, &seed.empty_at_second, request, false).await;
        assert!(matches!(result, Err(AppError::ScheduleConflict(_))));

        let detail = store
            .get_schedule_detail(&seed.empty_at_second)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.volunteer_id, None);
        assert_eq!(detail.status, AssignmentStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_writes_volunteer_status_and_trainee_together() {
        let store = MemoryStorage::new();
        let seed = seed(&store).await;

        let request = update(
            Some(seed.bob.as_str()),
            Some("confirmed"),
            Some(seed.alice.as_str()),
        );
        let written = update_assignment(&store, &seed.empty_at_second, request, false)
            .await
            .unwrap();
        assert_eq!(written.volunteer_id.as_deref(), Some(seed.bob.as_str()));

        let stored = store
            .get_schedule_detail(&seed.empty_at_second)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, written);
        assert_eq!(stored.status, AssignmentStatus::Confirmed);
        assert_eq!(stored.trainee_id.as_deref(), Some(seed.alice.as_str()));
    }
}

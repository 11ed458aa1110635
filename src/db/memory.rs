//! In-memory backend.
//!
//! One `RwLock` guards every table; guarded writes hold the write lock across
//! the collision check and the write. Deletes cascade like the SQLite schema.
//! References are not checked on insert; callers validate them first.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{GuardedWrite, Storage};
use crate::errors::AppError;
use crate::models::{
    AssignmentView, AvailabilityRule, Event, EventFilter, EventRef, Notification, Role, RoleRef,
    Schedule, ScheduleDetail, ScheduleFilter, SwapFilter, SwapRequest, SwapStatus, Team,
    TeamMember, TeamRef, Volunteer, VolunteerSummary,
};
use crate::scheduling::{check_conflict, OccurrenceKey};

#[derive(Default)]
struct Tables {
    volunteers: BTreeMap<String, Volunteer>,
    teams: BTreeMap<String, Team>,
    roles: BTreeMap<String, Role>,
    /// Keyed by (team id, volunteer id).
    members: BTreeMap<(String, String), TeamMember>,
    events: BTreeMap<String, Event>,
    schedules: BTreeMap<String, Schedule>,
    details: BTreeMap<String, ScheduleDetail>,
    rules: BTreeMap<String, AvailabilityRule>,
    swaps: BTreeMap<String, SwapRequest>,
    notifications: BTreeMap<String, Notification>,
}

impl Tables {
    fn view(&self, detail: &ScheduleDetail) -> Option<AssignmentView> {
        let volunteer = self.volunteers.get(detail.volunteer_id.as_ref()?)?;
        let schedule = self.schedules.get(&detail.schedule_id)?;
        let event = self.events.get(&schedule.event_id)?;
        let team = self.teams.get(&schedule.team_id)?;
        let role = self.roles.get(&detail.role_id)?;
        Some(AssignmentView {
            detail: detail.clone(),
            schedule: schedule.clone(),
            event: EventRef {
                id: event.id.clone(),
                name: event.name.clone(),
                starts_at: event.starts_at,
                location: event.location.clone(),
            },
            team: TeamRef {
                id: team.id.clone(),
                name: team.name.clone(),
                color: team.color.clone(),
            },
            role: RoleRef {
                id: role.id.clone(),
                name: role.name.clone(),
            },
            volunteer: VolunteerSummary::from(volunteer),
        })
    }

    fn views<'a>(&self, details: impl Iterator<Item = &'a ScheduleDetail>) -> Vec<AssignmentView> {
        let mut views: Vec<_> = details.filter_map(|d| self.view(d)).collect();
        views.sort_by(|a, b| {
            (a.event.starts_at, &a.detail.id).cmp(&(b.event.starts_at, &b.detail.id))
        });
        views
    }

    fn volunteer_views(&self, volunteer_id: &str) -> Vec<AssignmentView> {
        self.views(
            self.details
                .values()
                .filter(|d| d.volunteer_id.as_deref() == Some(volunteer_id)),
        )
    }

    fn remove_details_where(&mut self, pred: impl Fn(&ScheduleDetail) -> bool) {
        let doomed: Vec<String> = self
            .details
            .values()
            .filter(|d| pred(d))
            .map(|d| d.id.clone())
            .collect();
        for id in doomed {
            self.remove_detail(&id);
        }
    }

    fn remove_detail(&mut self, id: &str) -> Option<ScheduleDetail> {
        let removed = self.details.remove(id)?;
        self.swaps.retain(|_, s| s.schedule_detail_id != id);
        Some(removed)
    }

    fn remove_schedules_where(&mut self, pred: impl Fn(&Schedule) -> bool) {
        let doomed: Vec<String> = self
            .schedules
            .values()
            .filter(|s| pred(s))
            .map(|s| s.id.clone())
            .collect();
        for id in &doomed {
            self.schedules.remove(id);
        }
        self.remove_details_where(|d| doomed.contains(&d.schedule_id));
    }

    fn remove_roles_where(&mut self, pred: impl Fn(&Role) -> bool) {
        let doomed: Vec<String> = self
            .roles
            .values()
            .filter(|r| pred(r))
            .map(|r| r.id.clone())
            .collect();
        for id in &doomed {
            self.roles.remove(id);
        }
        self.remove_details_where(|d| doomed.contains(&d.role_id));
    }
}

fn not_found(kind: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} {} not found", kind, id))
}

/// Overwrite an existing row, failing when it is missing.
fn replace_row<T: Clone>(
    table: &mut BTreeMap<String, T>,
    id: &str,
    value: &T,
    kind: &str,
) -> Result<(), AppError> {
    match table.get_mut(id) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(not_found(kind, id)),
    }
}

/// Process-local storage for tests and ephemeral instances.
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn list_volunteers(&self) -> Result<Vec<Volunteer>, AppError> {
        let tables = self.tables.read().await;
        let mut volunteers: Vec<_> = tables.volunteers.values().cloned().collect();
        volunteers.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
        Ok(volunteers)
    }

    async fn get_volunteer(&self, id: &str) -> Result<Option<Volunteer>, AppError> {
        Ok(self.tables.read().await.volunteers.get(id).cloned())
    }

    async fn get_volunteer_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Volunteer>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .volunteers
            .values()
            .find(|v| v.username == username)
            .cloned())
    }

    async fn insert_volunteer(&self, volunteer: &Volunteer) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if tables
            .volunteers
            .values()
            .any(|v| v.username == volunteer.username)
        {
            return Err(AppError::Database(format!(
                "Duplicate username {}",
                volunteer.username
            )));
        }
        tables
            .volunteers
            .insert(volunteer.id.clone(), volunteer.clone());
        Ok(())
    }

    async fn update_volunteer(&self, volunteer: &Volunteer) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        replace_row(
            &mut tables.volunteers,
            &volunteer.id,
            volunteer,
            "Volunteer",
        )
    }

    async fn delete_volunteer(&self, id: &str) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if tables.volunteers.remove(id).is_none() {
            return Err(not_found("Volunteer", id));
        }
        tables.members.retain(|(_, volunteer_id), _| volunteer_id != id);
        tables.rules.retain(|_, r| r.volunteer_id != id);
        tables.notifications.retain(|_, n| n.volunteer_id != id);
        tables.swaps.retain(|_, s| s.requester_id != id);
        for swap in tables.swaps.values_mut() {
            if swap.replacement_id.as_deref() == Some(id) {
                swap.replacement_id = None;
            }
        }
        for detail in tables.details.values_mut() {
            if detail.volunteer_id.as_deref() == Some(id) {
                detail.volunteer_id = None;
            }
            if detail.trainee_id.as_deref() == Some(id) {
                detail.trainee_id = None;
            }
        }
        for team in tables.teams.values_mut() {
            if team.leader_id.as_deref() == Some(id) {
                team.leader_id = None;
            }
        }
        Ok(())
    }

    async fn list_teams(&self) -> Result<Vec<Team>, AppError> {
        let tables = self.tables.read().await;
        let mut teams: Vec<_> = tables.teams.values().cloned().collect();
        teams.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
        Ok(teams)
    }

    async fn get_team(&self, id: &str) -> Result<Option<Team>, AppError> {
        Ok(self.tables.read().await.teams.get(id).cloned())
    }

    async fn insert_team(&self, team: &Team) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.teams.insert(team.id.clone(), team.clone());
        Ok(())
    }

    async fn update_team(&self, team: &Team) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        replace_row(&mut tables.teams, &team.id, team, "Team")
    }

    async fn delete_team(&self, id: &str) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if tables.teams.remove(id).is_none() {
            return Err(not_found("Team", id));
        }
        tables.members.retain(|(team_id, _), _| team_id != id);
        tables.remove_schedules_where(|s| s.team_id == id);
        tables.remove_roles_where(|r| r.team_id == id);
        Ok(())
    }

    async fn list_roles(&self, team_id: &str) -> Result<Vec<Role>, AppError> {
        let tables = self.tables.read().await;
        let mut roles: Vec<_> = tables
            .roles
            .values()
            .filter(|r| r.team_id == team_id)
            .cloned()
            .collect();
        roles.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
        Ok(roles)
    }

    async fn get_role(&self, id: &str) -> Result<Option<Role>, AppError> {
        Ok(self.tables.read().await.roles.get(id).cloned())
    }

    async fn insert_role(&self, role: &Role) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.roles.insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        replace_row(&mut tables.roles, &role.id, role, "Role")
    }

    async fn delete_role(&self, id: &str) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if !tables.roles.contains_key(id) {
            return Err(not_found("Role", id));
        }
        tables.remove_roles_where(|r| r.id == id);
        Ok(())
    }

    async fn list_team_members(&self, team_id: &str) -> Result<Vec<TeamMember>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .iter()
            .filter(|((team, _), _)| team == team_id)
            .map(|(_, member)| member.clone())
            .collect())
    }

    async fn upsert_team_member(&self, member: &TeamMember) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.members.insert(
            (member.team_id.clone(), member.volunteer_id.clone()),
            member.clone(),
        );
        Ok(())
    }

    async fn remove_team_member(&self, volunteer_id: &str, team_id: &str) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        match tables
            .members
            .remove(&(team_id.to_string(), volunteer_id.to_string()))
        {
            Some(_) => Ok(()),
            None => Err(not_found(
                "Team member",
                &format!("{}/{}", volunteer_id, team_id),
            )),
        }
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, AppError> {
        let tables = self.tables.read().await;
        let mut events: Vec<_> = tables
            .events
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        events.sort_by(|a, b| (a.starts_at, &a.id).cmp(&(b.starts_at, &b.id)));
        Ok(events)
    }

    async fn get_event(&self, id: &str) -> Result<Option<Event>, AppError> {
        Ok(self.tables.read().await.events.get(id).cloned())
    }

    async fn insert_event(&self, event: &Event) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        replace_row(&mut tables.events, &event.id, event, "Event")
    }

    async fn delete_event(&self, id: &str) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if tables.events.remove(id).is_none() {
            return Err(not_found("Event", id));
        }
        tables.remove_schedules_where(|s| s.event_id == id);
        Ok(())
    }

    async fn list_schedules(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, AppError> {
        let tables = self.tables.read().await;
        let mut schedules: Vec<_> = tables
            .schedules
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        schedules.sort_by(|a, b| (&a.created_at, &a.id).cmp(&(&b.created_at, &b.id)));
        Ok(schedules)
    }

    async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, AppError> {
        Ok(self.tables.read().await.schedules.get(id).cloned())
    }

    async fn insert_schedule(
        &self,
        schedule: &Schedule,
        slots: &[ScheduleDetail],
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables
            .schedules
            .insert(schedule.id.clone(), schedule.clone());
        for slot in slots {
            tables.details.insert(slot.id.clone(), slot.clone());
        }
        Ok(())
    }

    async fn update_schedule(&self, schedule: &Schedule) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        replace_row(&mut tables.schedules, &schedule.id, schedule, "Schedule")
    }

    async fn delete_schedule(&self, id: &str) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if !tables.schedules.contains_key(id) {
            return Err(not_found("Schedule", id));
        }
        tables.remove_schedules_where(|s| s.id == id);
        Ok(())
    }

    async fn list_schedule_details(
        &self,
        schedule_id: &str,
    ) -> Result<Vec<ScheduleDetail>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .details
            .values()
            .filter(|d| d.schedule_id == schedule_id)
            .cloned()
            .collect())
    }

    async fn get_schedule_detail(&self, id: &str) -> Result<Option<ScheduleDetail>, AppError> {
        Ok(self.tables.read().await.details.get(id).cloned())
    }

    async fn insert_schedule_detail(&self, detail: &ScheduleDetail) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.details.insert(detail.id.clone(), detail.clone());
        Ok(())
    }

    async fn update_schedule_detail(&self, detail: &ScheduleDetail) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        replace_row(&mut tables.details, &detail.id, detail, "Schedule detail")
    }

    async fn delete_schedule_detail(&self, id: &str) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        match tables.remove_detail(id) {
            Some(_) => Ok(()),
            None => Err(not_found("Schedule detail", id)),
        }
    }

    async fn insert_schedule_detail_guarded(
        &self,
        detail: &ScheduleDetail,
        key: &OccurrenceKey,
        match_location: bool,
    ) -> Result<GuardedWrite, AppError> {
        let mut tables = self.tables.write().await;
        if let Some(volunteer_id) = detail.volunteer_id.as_deref() {
            let existing = tables.volunteer_views(volunteer_id);
            let exclude = Some(detail.id.as_str());
            if let Some(view) = check_conflict(key, &existing, exclude, match_location) {
                return Ok(GuardedWrite::Collision(Box::new(view.clone())));
            }
        }
        tables.details.insert(detail.id.clone(), detail.clone());
        Ok(GuardedWrite::Written(detail.clone()))
    }

    async fn replace_schedule_detail_guarded(
        &self,
        detail: &ScheduleDetail,
        key: &OccurrenceKey,
        match_location: bool,
    ) -> Result<(ScheduleDetail, Vec<String>), AppError> {
        let mut tables = self.tables.write().await;
        let mut removed = Vec::new();
        if let Some(volunteer_id) = detail.volunteer_id.as_deref() {
            removed = tables
                .volunteer_views(volunteer_id)
                .iter()
                .filter(|v| v.detail.id != detail.id)
                .filter(|v| {
                    OccurrenceKey::of_ref(&v.event).collides_with(key, match_location)
                })
                .map(|v| v.detail.id.clone())
                .collect::<Vec<_>>();
            removed.sort();
            for id in &removed {
                tables.remove_detail(id);
            }
        }
        tables.details.insert(detail.id.clone(), detail.clone());
        Ok((detail.clone(), removed))
    }

    async fn update_schedule_detail_guarded(
        &self,
        detail: &ScheduleDetail,
        key: &OccurrenceKey,
        match_location: bool,
    ) -> Result<GuardedWrite, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.details.contains_key(&detail.id) {
            return Err(not_found("Schedule detail", &detail.id));
        }
        if let Some(volunteer_id) = detail.volunteer_id.as_deref() {
            let existing = tables.volunteer_views(volunteer_id);
            let exclude = Some(detail.id.as_str());
            if let Some(view) = check_conflict(key, &existing, exclude, match_location) {
                return Ok(GuardedWrite::Collision(Box::new(view.clone())));
            }
        }
        tables.details.insert(detail.id.clone(), detail.clone());
        Ok(GuardedWrite::Written(detail.clone()))
    }

    async fn assignments_for_volunteer(
        &self,
        volunteer_id: &str,
    ) -> Result<Vec<AssignmentView>, AppError> {
        Ok(self.tables.read().await.volunteer_views(volunteer_id))
    }

    async fn all_assignments(&self) -> Result<Vec<AssignmentView>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.views(tables.details.values()))
    }

    async fn list_availability_rules(
        &self,
        volunteer_id: &str,
    ) -> Result<Vec<AvailabilityRule>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .rules
            .values()
            .filter(|r| r.volunteer_id == volunteer_id)
            .cloned()
            .collect())
    }

    async fn get_availability_rule(&self, id: &str) -> Result<Option<AvailabilityRule>, AppError> {
        Ok(self.tables.read().await.rules.get(id).cloned())
    }

    async fn insert_availability_rule(&self, rule: &AvailabilityRule) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.rules.insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    async fn update_availability_rule(&self, rule: &AvailabilityRule) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        replace_row(&mut tables.rules, &rule.id, rule, "Availability rule")
    }

    async fn delete_availability_rule(&self, id: &str) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        match tables.rules.remove(id) {
            Some(_) => Ok(()),
            None => Err(not_found("Availability rule", id)),
        }
    }

    async fn list_swap_requests(&self, filter: &SwapFilter) -> Result<Vec<SwapRequest>, AppError> {
        let tables = self.tables.read().await;
        let mut swaps: Vec<_> = tables
            .swaps
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        swaps.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(swaps)
    }

    async fn get_swap_request(&self, id: &str) -> Result<Option<SwapRequest>, AppError> {
        Ok(self.tables.read().await.swaps.get(id).cloned())
    }

    async fn insert_swap_request(&self, request: &SwapRequest) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.swaps.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn mark_swap_resolved(
        &self,
        id: &str,
        status: SwapStatus,
        resolved_by: Option<&str>,
        resolved_at: &str,
    ) -> Result<Option<SwapRequest>, AppError> {
        let mut tables = self.tables.write().await;
        match tables.swaps.get_mut(id) {
            Some(swap) if swap.status == SwapStatus::Pending => {
                swap.status = status;
                swap.resolved_by = resolved_by.map(str::to_string);
                swap.resolved_at = Some(resolved_at.to_string());
                Ok(Some(swap.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_swap_request(&self, id: &str) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        match tables.swaps.remove(id) {
            Some(_) => Ok(()),
            None => Err(not_found("Swap request", id)),
        }
    }

    async fn list_notifications(
        &self,
        volunteer_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AppError> {
        let tables = self.tables.read().await;
        let mut notifications: Vec<_> = tables
            .notifications
            .values()
            .filter(|n| n.volunteer_id == volunteer_id && !(unread_only && n.is_read))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(notifications)
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables
            .notifications
            .insert(notification.id.clone(), notification.clone());
        Ok(())
    }

    async fn mark_notification_read(&self, id: &str) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        match tables.notifications.get_mut(id) {
            Some(notification) => {
                notification.is_read = true;
                Ok(())
            }
            None => Err(not_found("Notification", id)),
        }
    }

    async fn delete_notification(&self, id: &str) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        match tables.notifications.remove(id) {
            Some(_) => Ok(()),
            None => Err(not_found("Notification", id)),
        }
    }
}

//! SQLite backend.
//!
//! Guarded writes are single conditional statements (or one transaction), so
//! the double-booking check and the write cannot interleave with another
//! request.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{GuardedWrite, Storage};
use crate::errors::AppError;
use crate::models::{
    format_timestamp, parse_timestamp, AssignmentStatus, AssignmentView, AvailabilityRule, Event,
    EventFilter, EventRef, EventType, Notification, NotificationKind, Role, RoleRef, Schedule,
    ScheduleDetail, ScheduleFilter, ScheduleStatus, SwapFilter, SwapRequest, SwapStatus, Team,
    TeamMember, TeamRef, Volunteer, VolunteerRole, VolunteerSummary,
};
use crate::scheduling::{check_conflict, OccurrenceKey};

const DATE_FORMAT: &str = "%Y-%m-%d";

const VOLUNTEER_COLUMNS: &str = "id, username, name, email, phone, role, avatar";
const TEAM_COLUMNS: &str = "id, name, description, leader_id, color";
const ROLE_COLUMNS: &str = "id, team_id, name, description, requires_training";
const EVENT_COLUMNS: &str =
    "id, name, starts_at, ends_at, location, description, event_type, is_recurring";
const SCHEDULE_COLUMNS: &str =
    "id, event_id, team_id, status, notes, created_by, created_at, updated_at";
const DETAIL_COLUMNS: &str = "id, schedule_id, role_id, volunteer_id, status, trainee_id";
const RULE_COLUMNS: &str = "id, volunteer_id, day_of_week, start_time, end_time, is_available, \
                            reason, start_date, end_date";
const SWAP_COLUMNS: &str = "id, requester_id, schedule_detail_id, replacement_id, status, reason, \
                            created_at, resolved_by, resolved_at";
const NOTIFICATION_COLUMNS: &str =
    "id, volunteer_id, kind, title, message, related_id, is_read, created_at";

/// A filled assignment joined with its schedule, event, team, role and volunteer.
const ASSIGNMENT_VIEW_SELECT: &str = r#"
    SELECT d.id AS d_id, d.schedule_id AS d_schedule_id, d.role_id AS d_role_id,
           d.volunteer_id AS d_volunteer_id, d.status AS d_status, d.trainee_id AS d_trainee_id,
           s.event_id AS s_event_id, s.team_id AS s_team_id, s.status AS s_status,
           s.notes AS s_notes, s.created_by AS s_created_by,
           s.created_at AS s_created_at, s.updated_at AS s_updated_at,
           e.name AS e_name, e.starts_at AS e_starts_at, e.location AS e_location,
           t.name AS t_name, t.color AS t_color,
           r.name AS r_name,
           v.name AS v_name, v.email AS v_email, v.avatar AS v_avatar
    FROM schedule_details d
    JOIN schedules s ON s.id = d.schedule_id
    JOIN events e ON e.id = s.event_id
    JOIN teams t ON t.id = s.team_id
    JOIN roles r ON r.id = d.role_id
    JOIN volunteers v ON v.id = d.volunteer_id
"#;

/// Assignments of one volunteer at one occurrence, other than one slot.
/// Binds: volunteer id, starts_at, match_location flag, location, excluded detail id.
const COLLIDING_DETAILS: &str = r#"
    SELECT d.id FROM schedule_details d
    JOIN schedules s ON s.id = d.schedule_id
    JOIN events e ON e.id = s.event_id
    WHERE d.volunteer_id = ?
      AND e.starts_at = ?
      AND (? = 0 OR COALESCE(e.location, '') = ?)
      AND d.id <> ?
"#;

/// SQLite-backed storage.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find the assignment that made a guarded write refuse.
    async fn collision(
        &self,
        volunteer_id: &str,
        key: &OccurrenceKey,
        exclude: &str,
        match_location: bool,
    ) -> Result<Option<AssignmentView>, AppError> {
        let views = self.assignments_for_volunteer(volunteer_id).await?;
        let conflict = check_conflict(key, &views, Some(exclude), match_location);
        Ok(conflict.cloned())
    }

    async fn insert_detail_row(
        &self,
        executor: impl sqlx::SqliteExecutor<'_>,
        detail: &ScheduleDetail,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO schedule_details (id, schedule_id, role_id, volunteer_id, status, trainee_id) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&detail.id)
        .bind(&detail.schedule_id)
        .bind(&detail.role_id)
        .bind(&detail.volunteer_id)
        .bind(detail.status.as_str())
        .bind(&detail.trainee_id)
        .execute(executor)
        .await?;
        Ok(())
    }
}

fn not_found(kind: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} {} not found", kind, id))
}

fn expect_one(rows_affected: u64, kind: &str, id: &str) -> Result<(), AppError> {
    if rows_affected == 0 {
        return Err(not_found(kind, id));
    }
    Ok(())
}

#[async_trait]
impl Storage for SqliteStorage {
    // ==================== VOLUNTEERS ====================

    async fn list_volunteers(&self) -> Result<Vec<Volunteer>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM volunteers ORDER BY name, id",
            VOLUNTEER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(volunteer_from_row).collect())
    }

    async fn get_volunteer(&self, id: &str) -> Result<Option<Volunteer>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM volunteers WHERE id = ?",
            VOLUNTEER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(volunteer_from_row))
    }

    async fn get_volunteer_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Volunteer>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM volunteers WHERE username = ?",
            VOLUNTEER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(volunteer_from_row))
    }

    async fn insert_volunteer(&self, volunteer: &Volunteer) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO volunteers (id, username, name, email, phone, role, avatar) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&volunteer.id)
        .bind(&volunteer.username)
        .bind(&volunteer.name)
        .bind(&volunteer.email)
        .bind(&volunteer.phone)
        .bind(volunteer.role.as_str())
        .bind(&volunteer.avatar)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_volunteer(&self, volunteer: &Volunteer) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE volunteers SET username = ?, name = ?, email = ?, phone = ?, role = ?, avatar = ? WHERE id = ?",
        )
        .bind(&volunteer.username)
        .bind(&volunteer.name)
        .bind(&volunteer.email)
        .bind(&volunteer.phone)
        .bind(volunteer.role.as_str())
        .bind(&volunteer.avatar)
        .bind(&volunteer.id)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), "Volunteer", &volunteer.id)
    }

    async fn delete_volunteer(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM volunteers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "Volunteer", id)
    }

    // ==================== TEAMS AND ROLES ====================

    async fn list_teams(&self) -> Result<Vec<Team>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM teams ORDER BY name, id",
            TEAM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(team_from_row).collect())
    }

    async fn get_team(&self, id: &str) -> Result<Option<Team>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM teams WHERE id = ?", TEAM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(team_from_row))
    }

    async fn insert_team(&self, team: &Team) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO teams (id, name, description, leader_id, color) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&team.id)
        .bind(&team.name)
        .bind(&team.description)
        .bind(&team.leader_id)
        .bind(&team.color)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_team(&self, team: &Team) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE teams SET name = ?, description = ?, leader_id = ?, color = ? WHERE id = ?",
        )
        .bind(&team.name)
        .bind(&team.description)
        .bind(&team.leader_id)
        .bind(&team.color)
        .bind(&team.id)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), "Team", &team.id)
    }

    async fn delete_team(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "Team", id)
    }

    async fn list_roles(&self, team_id: &str) -> Result<Vec<Role>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM roles WHERE team_id = ? ORDER BY name, id",
            ROLE_COLUMNS
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(role_from_row).collect())
    }

    async fn get_role(&self, id: &str) -> Result<Option<Role>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM roles WHERE id = ?", ROLE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(role_from_row))
    }

    async fn insert_role(&self, role: &Role) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO roles (id, team_id, name, description, requires_training) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&role.id)
        .bind(&role.team_id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.requires_training as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE roles SET name = ?, description = ?, requires_training = ? WHERE id = ?",
        )
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.requires_training as i32)
        .bind(&role.id)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), "Role", &role.id)
    }

    async fn delete_role(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "Role", id)
    }

    async fn list_team_members(&self, team_id: &str) -> Result<Vec<TeamMember>, AppError> {
        let rows = sqlx::query(
            "SELECT volunteer_id, team_id, role_ids, is_trainee, is_active FROM team_members WHERE team_id = ? ORDER BY volunteer_id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(member_from_row).collect()
    }

    async fn upsert_team_member(&self, member: &TeamMember) -> Result<(), AppError> {
        let role_ids = serde_json::to_string(&member.role_ids)?;
        sqlx::query(
            r#"INSERT INTO team_members (volunteer_id, team_id, role_ids, is_trainee, is_active)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (volunteer_id, team_id) DO UPDATE SET
                   role_ids = excluded.role_ids,
                   is_trainee = excluded.is_trainee,
                   is_active = excluded.is_active"#,
        )
        .bind(&member.volunteer_id)
        .bind(&member.team_id)
        .bind(&role_ids)
        .bind(member.is_trainee as i32)
        .bind(member.is_active as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_team_member(&self, volunteer_id: &str, team_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM team_members WHERE volunteer_id = ? AND team_id = ?")
            .bind(volunteer_id)
            .bind(team_id)
            .execute(&self.pool)
            .await?;
        expect_one(
            result.rows_affected(),
            "Team member",
            &format!("{}/{}", volunteer_id, team_id),
        )
    }

    // ==================== EVENTS ====================

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, AppError> {
        let from = filter.from.as_ref().map(format_timestamp);
        let to = filter.to.as_ref().map(format_timestamp);
        let rows = sqlx::query(&format!(
            "SELECT {} FROM events WHERE (? IS NULL OR starts_at >= ?) AND (? IS NULL OR starts_at <= ?) ORDER BY starts_at, id",
            EVENT_COLUMNS
        ))
        .bind(&from)
        .bind(&from)
        .bind(&to)
        .bind(&to)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn get_event(&self, id: &str) -> Result<Option<Event>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn insert_event(&self, event: &Event) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO events (id, name, starts_at, ends_at, location, description, event_type, is_recurring) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.name)
        .bind(format_timestamp(&event.starts_at))
        .bind(event.ends_at.as_ref().map(format_timestamp))
        .bind(&event.location)
        .bind(&event.description)
        .bind(event.event_type.as_str())
        .bind(event.is_recurring as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE events SET name = ?, starts_at = ?, ends_at = ?, location = ?, description = ?, event_type = ?, is_recurring = ? WHERE id = ?",
        )
        .bind(&event.name)
        .bind(format_timestamp(&event.starts_at))
        .bind(event.ends_at.as_ref().map(format_timestamp))
        .bind(&event.location)
        .bind(&event.description)
        .bind(event.event_type.as_str())
        .bind(event.is_recurring as i32)
        .bind(&event.id)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), "Event", &event.id)
    }

    async fn delete_event(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "Event", id)
    }

    // ==================== SCHEDULES ====================

    async fn list_schedules(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM schedules WHERE (? IS NULL OR team_id = ?) AND (? IS NULL OR event_id = ?) AND (? IS NULL OR status = ?) ORDER BY created_at, id",
            SCHEDULE_COLUMNS
        ))
        .bind(&filter.team_id)
        .bind(&filter.team_id)
        .bind(&filter.event_id)
        .bind(&filter.event_id)
        .bind(&filter.status)
        .bind(&filter.status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(schedule_from_row).collect())
    }

    async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM schedules WHERE id = ?",
            SCHEDULE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(schedule_from_row))
    }

    async fn insert_schedule(
        &self,
        schedule: &Schedule,
        slots: &[ScheduleDetail],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO schedules (id, event_id, team_id, status, notes, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&schedule.id)
        .bind(&schedule.event_id)
        .bind(&schedule.team_id)
        .bind(schedule.status.as_str())
        .bind(&schedule.notes)
        .bind(&schedule.created_by)
        .bind(&schedule.created_at)
        .bind(&schedule.updated_at)
        .execute(&mut *tx)
        .await?;

        for slot in slots {
            self.insert_detail_row(&mut *tx, slot).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_schedule(&self, schedule: &Schedule) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE schedules SET status = ?, notes = ?, updated_at = ? WHERE id = ?")
                .bind(schedule.status.as_str())
                .bind(&schedule.notes)
                .bind(&schedule.updated_at)
                .bind(&schedule.id)
                .execute(&self.pool)
                .await?;
        expect_one(result.rows_affected(), "Schedule", &schedule.id)
    }

    async fn delete_schedule(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "Schedule", id)
    }

    // ==================== SCHEDULE DETAILS ====================

    async fn list_schedule_details(
        &self,
        schedule_id: &str,
    ) -> Result<Vec<ScheduleDetail>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM schedule_details WHERE schedule_id = ? ORDER BY id",
            DETAIL_COLUMNS
        ))
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(detail_from_row).collect())
    }

    async fn get_schedule_detail(&self, id: &str) -> Result<Option<ScheduleDetail>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM schedule_details WHERE id = ?",
            DETAIL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(detail_from_row))
    }

    async fn insert_schedule_detail(&self, detail: &ScheduleDetail) -> Result<(), AppError> {
        self.insert_detail_row(&self.pool, detail).await
    }

    async fn update_schedule_detail(&self, detail: &ScheduleDetail) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE schedule_details SET volunteer_id = ?, status = ?, trainee_id = ? WHERE id = ?",
        )
        .bind(&detail.volunteer_id)
        .bind(detail.status.as_str())
        .bind(&detail.trainee_id)
        .bind(&detail.id)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), "Schedule detail", &detail.id)
    }

    async fn delete_schedule_detail(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM schedule_details WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "Schedule detail", id)
    }

    async fn insert_schedule_detail_guarded(
        &self,
        detail: &ScheduleDetail,
        key: &OccurrenceKey,
        match_location: bool,
    ) -> Result<GuardedWrite, AppError> {
        let Some(volunteer_id) = detail.volunteer_id.as_deref() else {
            self.insert_detail_row(&self.pool, detail).await?;
            return Ok(GuardedWrite::Written(detail.clone()));
        };

        let sql = format!(
            r#"INSERT INTO schedule_details (id, schedule_id, role_id, volunteer_id, status, trainee_id)
               SELECT ?, ?, ?, ?, ?, ?
               WHERE NOT EXISTS ({})"#,
            COLLIDING_DETAILS
        );
        let result = sqlx::query(&sql)
            .bind(&detail.id)
            .bind(&detail.schedule_id)
            .bind(&detail.role_id)
            .bind(volunteer_id)
            .bind(detail.status.as_str())
            .bind(&detail.trainee_id)
            .bind(volunteer_id)
            .bind(format_timestamp(&key.starts_at))
            .bind(match_location as i32)
            .bind(key.location_text())
            .bind(&detail.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(GuardedWrite::Written(detail.clone()));
        }
        match self
            .collision(volunteer_id, key, &detail.id, match_location)
            .await?
        {
            Some(view) => Ok(GuardedWrite::Collision(Box::new(view))),
            None => Err(AppError::Internal(
                "Guarded insert refused without a visible collision".to_string(),
            )),
        }
    }

    async fn replace_schedule_detail_guarded(
        &self,
        detail: &ScheduleDetail,
        key: &OccurrenceKey,
        match_location: bool,
    ) -> Result<(ScheduleDetail, Vec<String>), AppError> {
        let mut tx = self.pool.begin().await?;

        let mut removed = Vec::new();
        if let Some(volunteer_id) = detail.volunteer_id.as_deref() {
            let sql = format!(
                "DELETE FROM schedule_details WHERE id IN ({}) RETURNING id",
                COLLIDING_DETAILS
            );
            let rows = sqlx::query(&sql)
                .bind(volunteer_id)
                .bind(format_timestamp(&key.starts_at))
                .bind(match_location as i32)
                .bind(key.location_text())
                .bind(&detail.id)
                .fetch_all(&mut *tx)
                .await?;
            removed = rows.iter().map(|row| row.get::<String, _>("id")).collect();
            removed.sort();
        }

        self.insert_detail_row(&mut *tx, detail).await?;
        tx.commit().await?;

        Ok((detail.clone(), removed))
    }

    async fn update_schedule_detail_guarded(
        &self,
        detail: &ScheduleDetail,
        key: &OccurrenceKey,
        match_location: bool,
    ) -> Result<GuardedWrite, AppError> {
        let Some(volunteer_id) = detail.volunteer_id.as_deref() else {
            self.update_schedule_detail(detail).await?;
            return Ok(GuardedWrite::Written(detail.clone()));
        };

        let sql = format!(
            r#"UPDATE schedule_details SET volunteer_id = ?, status = ?, trainee_id = ?
               WHERE id = ? AND NOT EXISTS ({})"#,
            COLLIDING_DETAILS
        );
        let result = sqlx::query(&sql)
            .bind(volunteer_id)
            .bind(detail.status.as_str())
            .bind(&detail.trainee_id)
            .bind(&detail.id)
            .bind(volunteer_id)
            .bind(format_timestamp(&key.starts_at))
            .bind(match_location as i32)
            .bind(key.location_text())
            .bind(&detail.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(GuardedWrite::Written(detail.clone()));
        }
        match self
            .collision(volunteer_id, key, &detail.id, match_location)
            .await?
        {
            Some(view) => Ok(GuardedWrite::Collision(Box::new(view))),
            None => Err(not_found("Schedule detail", &detail.id)),
        }
    }

    async fn assignments_for_volunteer(
        &self,
        volunteer_id: &str,
    ) -> Result<Vec<AssignmentView>, AppError> {
        let sql = format!(
            "{} WHERE d.volunteer_id = ? ORDER BY e.starts_at, d.id",
            ASSIGNMENT_VIEW_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(volunteer_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(assignment_from_row).collect()
    }

    async fn all_assignments(&self) -> Result<Vec<AssignmentView>, AppError> {
        let sql = format!("{} ORDER BY e.starts_at, d.id", ASSIGNMENT_VIEW_SELECT);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(assignment_from_row).collect()
    }

    // ==================== AVAILABILITY RULES ====================

    async fn list_availability_rules(
        &self,
        volunteer_id: &str,
    ) -> Result<Vec<AvailabilityRule>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM availability_rules WHERE volunteer_id = ? ORDER BY id",
            RULE_COLUMNS
        ))
        .bind(volunteer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(rule_from_row).collect()
    }

    async fn get_availability_rule(&self, id: &str) -> Result<Option<AvailabilityRule>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM availability_rules WHERE id = ?",
            RULE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(rule_from_row).transpose()
    }

    async fn insert_availability_rule(&self, rule: &AvailabilityRule) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO availability_rules (id, volunteer_id, day_of_week, start_time, end_time, is_available, reason, start_date, end_date) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&rule.id)
        .bind(&rule.volunteer_id)
        .bind(rule.day_of_week.map(i32::from))
        .bind(&rule.start_time)
        .bind(&rule.end_time)
        .bind(rule.is_available as i32)
        .bind(&rule.reason)
        .bind(rule.start_date.map(|d| d.format(DATE_FORMAT).to_string()))
        .bind(rule.end_date.map(|d| d.format(DATE_FORMAT).to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_availability_rule(&self, rule: &AvailabilityRule) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE availability_rules SET day_of_week = ?, start_time = ?, end_time = ?, is_available = ?, reason = ?, start_date = ?, end_date = ? WHERE id = ?",
        )
        .bind(rule.day_of_week.map(i32::from))
        .bind(&rule.start_time)
        .bind(&rule.end_time)
        .bind(rule.is_available as i32)
        .bind(&rule.reason)
        .bind(rule.start_date.map(|d| d.format(DATE_FORMAT).to_string()))
        .bind(rule.end_date.map(|d| d.format(DATE_FORMAT).to_string()))
        .bind(&rule.id)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), "Availability rule", &rule.id)
    }

    async fn delete_availability_rule(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM availability_rules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "Availability rule", id)
    }

    // ==================== SWAP REQUESTS ====================

    async fn list_swap_requests(&self, filter: &SwapFilter) -> Result<Vec<SwapRequest>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM swap_requests WHERE (? IS NULL OR requester_id = ?) AND (? IS NULL OR status = ?) ORDER BY created_at DESC, id",
            SWAP_COLUMNS
        ))
        .bind(&filter.requester_id)
        .bind(&filter.requester_id)
        .bind(&filter.status)
        .bind(&filter.status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(swap_from_row).collect())
    }

    async fn get_swap_request(&self, id: &str) -> Result<Option<SwapRequest>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM swap_requests WHERE id = ?",
            SWAP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(swap_from_row))
    }

    async fn insert_swap_request(&self, request: &SwapRequest) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO swap_requests (id, requester_id, schedule_detail_id, replacement_id, status, reason, created_at, resolved_by, resolved_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id)
        .bind(&request.requester_id)
        .bind(&request.schedule_detail_id)
        .bind(&request.replacement_id)
        .bind(request.status.as_str())
        .bind(&request.reason)
        .bind(&request.created_at)
        .bind(&request.resolved_by)
        .bind(&request.resolved_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_swap_resolved(
        &self,
        id: &str,
        status: SwapStatus,
        resolved_by: Option<&str>,
        resolved_at: &str,
    ) -> Result<Option<SwapRequest>, AppError> {
        // Conditional on the pending state so a request resolves exactly once
        let result = sqlx::query(
            "UPDATE swap_requests SET status = ?, resolved_by = ?, resolved_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(resolved_by)
        .bind(resolved_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_swap_request(id).await
    }

    async fn delete_swap_request(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM swap_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "Swap request", id)
    }

    // ==================== NOTIFICATIONS ====================

    async fn list_notifications(
        &self,
        volunteer_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE volunteer_id = ? AND (? = 0 OR is_read = 0) \
             ORDER BY created_at DESC, id",
            NOTIFICATION_COLUMNS
        ))
        .bind(volunteer_id)
        .bind(unread_only as i32)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(notification_from_row).collect())
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO notifications (id, volunteer_id, kind, title, message, related_id, is_read, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&notification.id)
        .bind(&notification.volunteer_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.related_id)
        .bind(notification.is_read as i32)
        .bind(&notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_notification_read(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "Notification", id)
    }

    async fn delete_notification(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "Notification", id)
    }
}

// Helper functions for row conversion

fn volunteer_from_row(row: &SqliteRow) -> Volunteer {
    let role: String = row.get("role");
    Volunteer {
        id: row.get("id"),
        username: row.get("username"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        role: VolunteerRole::from_str(&role).unwrap_or_default(),
        avatar: row.get("avatar"),
    }
}

fn team_from_row(row: &SqliteRow) -> Team {
    Team {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        leader_id: row.get("leader_id"),
        color: row.get("color"),
    }
}

fn role_from_row(row: &SqliteRow) -> Role {
    let requires_training: i32 = row.get("requires_training");
    Role {
        id: row.get("id"),
        team_id: row.get("team_id"),
        name: row.get("name"),
        description: row.get("description"),
        requires_training: requires_training != 0,
    }
}

fn member_from_row(row: &SqliteRow) -> Result<TeamMember, AppError> {
    let role_ids: String = row.get("role_ids");
    let is_trainee: i32 = row.get("is_trainee");
    let is_active: i32 = row.get("is_active");
    Ok(TeamMember {
        volunteer_id: row.get("volunteer_id"),
        team_id: row.get("team_id"),
        role_ids: json_array_column(&role_ids)?,
        is_trainee: is_trainee != 0,
        is_active: is_active != 0,
    })
}

fn event_from_row(row: &SqliteRow) -> Result<Event, AppError> {
    let starts_at: String = row.get("starts_at");
    let ends_at: Option<String> = row.get("ends_at");
    let event_type: String = row.get("event_type");
    let is_recurring: i32 = row.get("is_recurring");
    Ok(Event {
        id: row.get("id"),
        name: row.get("name"),
        starts_at: timestamp_column(&starts_at)?,
        ends_at: ends_at.as_deref().map(timestamp_column).transpose()?,
        location: row.get("location"),
        description: row.get("description"),
        event_type: EventType::from_str(&event_type).unwrap_or_default(),
        is_recurring: is_recurring != 0,
    })
}

fn schedule_from_row(row: &SqliteRow) -> Schedule {
    let status: String = row.get("status");
    Schedule {
        id: row.get("id"),
        event_id: row.get("event_id"),
        team_id: row.get("team_id"),
        status: ScheduleStatus::from_str(&status).unwrap_or_default(),
        notes: row.get("notes"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn detail_from_row(row: &SqliteRow) -> ScheduleDetail {
    let status: String = row.get("status");
    ScheduleDetail {
        id: row.get("id"),
        schedule_id: row.get("schedule_id"),
        role_id: row.get("role_id"),
        volunteer_id: row.get("volunteer_id"),
        status: AssignmentStatus::from_str(&status).unwrap_or_default(),
        trainee_id: row.get("trainee_id"),
    }
}

fn assignment_from_row(row: &SqliteRow) -> Result<AssignmentView, AppError> {
    let detail_status: String = row.get("d_status");
    let schedule_status: String = row.get("s_status");
    let starts_at: String = row.get("e_starts_at");
    let volunteer_id: String = row.get("d_volunteer_id");
    let schedule_id: String = row.get("d_schedule_id");
    let role_id: String = row.get("d_role_id");
    let event_id: String = row.get("s_event_id");
    let team_id: String = row.get("s_team_id");

    Ok(AssignmentView {
        detail: ScheduleDetail {
            id: row.get("d_id"),
            schedule_id: schedule_id.clone(),
            role_id: role_id.clone(),
            volunteer_id: Some(volunteer_id.clone()),
            status: AssignmentStatus::from_str(&detail_status).unwrap_or_default(),
            trainee_id: row.get("d_trainee_id"),
        },
        schedule: Schedule {
            id: schedule_id,
            event_id: event_id.clone(),
            team_id: team_id.clone(),
            status: ScheduleStatus::from_str(&schedule_status).unwrap_or_default(),
            notes: row.get("s_notes"),
            created_by: row.get("s_created_by"),
            created_at: row.get("s_created_at"),
            updated_at: row.get("s_updated_at"),
        },
        event: EventRef {
            id: event_id,
            name: row.get("e_name"),
            starts_at: timestamp_column(&starts_at)?,
            location: row.get("e_location"),
        },
        team: TeamRef {
            id: team_id,
            name: row.get("t_name"),
            color: row.get("t_color"),
        },
        role: RoleRef {
            id: role_id,
            name: row.get("r_name"),
        },
        volunteer: VolunteerSummary {
            id: volunteer_id,
            name: row.get("v_name"),
            email: row.get("v_email"),
            avatar: row.get("v_avatar"),
        },
    })
}

fn rule_from_row(row: &SqliteRow) -> Result<AvailabilityRule, AppError> {
    let day_of_week: Option<i32> = row.get("day_of_week");
    let is_available: i32 = row.get("is_available");
    let start_date: Option<String> = row.get("start_date");
    let end_date: Option<String> = row.get("end_date");
    Ok(AvailabilityRule {
        id: row.get("id"),
        volunteer_id: row.get("volunteer_id"),
        day_of_week: day_of_week.and_then(|d| u8::try_from(d).ok()),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        is_available: is_available != 0,
        reason: row.get("reason"),
        start_date: start_date.as_deref().map(date_column).transpose()?,
        end_date: end_date.as_deref().map(date_column).transpose()?,
    })
}

fn swap_from_row(row: &SqliteRow) -> SwapRequest {
    let status: String = row.get("status");
    SwapRequest {
        id: row.get("id"),
        requester_id: row.get("requester_id"),
        schedule_detail_id: row.get("schedule_detail_id"),
        replacement_id: row.get("replacement_id"),
        status: SwapStatus::from_str(&status).unwrap_or_default(),
        reason: row.get("reason"),
        created_at: row.get("created_at"),
        resolved_by: row.get("resolved_by"),
        resolved_at: row.get("resolved_at"),
    }
}

fn timestamp_column(raw: &str) -> Result<chrono::NaiveDateTime, AppError> {
    parse_timestamp(raw).ok_or_else(|| AppError::Database(format!("Invalid timestamp {}", raw)))
}

fn date_column(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| AppError::Database(format!("Invalid date {}", raw)))
}

fn notification_from_row(row: &SqliteRow) -> Notification {
    let kind: String = row.get("kind");
    let is_read: i32 = row.get("is_read");
    Notification {
        id: row.get("id"),
        volunteer_id: row.get("volunteer_id"),
        kind: NotificationKind::from_str(&kind).unwrap_or_default(),
        title: row.get("title"),
        message: row.get("message"),
        related_id: row.get("related_id"),
        is_read: is_read != 0,
        created_at: row.get("created_at"),
    }
}

fn json_array_column(raw: &str) -> Result<Vec<String>, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Database(format!("Invalid JSON array {}: {}", raw, e)))
}

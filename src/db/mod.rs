//! Persistence layer.
//!
//! [`Storage`] is the capability the scheduling rules and handlers depend on.
//! SQLite is the production backend; the in-memory backend serves tests and
//! throwaway instances.

mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::errors::AppError;
use crate::models::{
    AssignmentView, AvailabilityRule, Event, EventFilter, Notification, Role, Schedule,
    ScheduleDetail, ScheduleFilter, SwapFilter, SwapRequest, SwapStatus, Team, TeamMember,
    Volunteer,
};
use crate::scheduling::OccurrenceKey;

/// Outcome of a write that must not double-book its volunteer.
#[derive(Debug)]
pub enum GuardedWrite {
    Written(ScheduleDetail),
    /// Nothing was written; this assignment already holds the occurrence.
    Collision(Box<AssignmentView>),
}

/// Everything the service reads and writes.
///
/// Updates and deletes of a missing row fail with `AppError::NotFound`.
/// Deletes cascade the way the SQLite foreign keys do.
#[async_trait]
pub trait Storage: Send + Sync {
    // Volunteers
    async fn list_volunteers(&self) -> Result<Vec<Volunteer>, AppError>;
    async fn get_volunteer(&self, id: &str) -> Result<Option<Volunteer>, AppError>;
    async fn get_volunteer_by_username(&self, username: &str)
        -> Result<Option<Volunteer>, AppError>;
    async fn insert_volunteer(&self, volunteer: &Volunteer) -> Result<(), AppError>;
    async fn update_volunteer(&self, volunteer: &Volunteer) -> Result<(), AppError>;
    async fn delete_volunteer(&self, id: &str) -> Result<(), AppError>;

    // Teams and roles
    async fn list_teams(&self) -> Result<Vec<Team>, AppError>;
    async fn get_team(&self, id: &str) -> Result<Option<Team>, AppError>;
    async fn insert_team(&self, team: &Team) -> Result<(), AppError>;
    async fn update_team(&self, team: &Team) -> Result<(), AppError>;
    async fn delete_team(&self, id: &str) -> Result<(), AppError>;

    async fn list_roles(&self, team_id: &str) -> Result<Vec<Role>, AppError>;
    async fn get_role(&self, id: &str) -> Result<Option<Role>, AppError>;
    async fn insert_role(&self, role: &Role) -> Result<(), AppError>;
    async fn update_role(&self, role: &Role) -> Result<(), AppError>;
    async fn delete_role(&self, id: &str) -> Result<(), AppError>;

    async fn list_team_members(&self, team_id: &str) -> Result<Vec<TeamMember>, AppError>;
    /// Insert or replace the membership of `(volunteer_id, team_id)`.
    async fn upsert_team_member(&self, member: &TeamMember) -> Result<(), AppError>;
    async fn remove_team_member(&self, volunteer_id: &str, team_id: &str)
        -> Result<(), AppError>;

    // Events
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, AppError>;
    async fn get_event(&self, id: &str) -> Result<Option<Event>, AppError>;
    async fn insert_event(&self, event: &Event) -> Result<(), AppError>;
    async fn update_event(&self, event: &Event) -> Result<(), AppError>;
    async fn delete_event(&self, id: &str) -> Result<(), AppError>;

    // Schedules
    async fn list_schedules(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, AppError>;
    async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, AppError>;
    /// Insert a schedule together with its initial (empty) slots.
    async fn insert_schedule(
        &self,
        schedule: &Schedule,
        slots: &[ScheduleDetail],
    ) -> Result<(), AppError>;
    async fn update_schedule(&self, schedule: &Schedule) -> Result<(), AppError>;
    async fn delete_schedule(&self, id: &str) -> Result<(), AppError>;

    // Schedule details
    async fn list_schedule_details(&self, schedule_id: &str)
        -> Result<Vec<ScheduleDetail>, AppError>;
    async fn get_schedule_detail(&self, id: &str) -> Result<Option<ScheduleDetail>, AppError>;
    /// Unguarded insert: empty slots and explicit double-bookings.
    async fn insert_schedule_detail(&self, detail: &ScheduleDetail) -> Result<(), AppError>;
    async fn update_schedule_detail(&self, detail: &ScheduleDetail) -> Result<(), AppError>;
    async fn delete_schedule_detail(&self, id: &str) -> Result<(), AppError>;

    /// Insert `detail` unless its volunteer already holds an assignment at `key`.
    async fn insert_schedule_detail_guarded(
        &self,
        detail: &ScheduleDetail,
        key: &OccurrenceKey,
        match_location: bool,
    ) -> Result<GuardedWrite, AppError>;

    /// Delete the volunteer's assignments at `key`, then insert `detail`.
    /// Returns the inserted detail and the ids removed.
    async fn replace_schedule_detail_guarded(
        &self,
        detail: &ScheduleDetail,
        key: &OccurrenceKey,
        match_location: bool,
    ) -> Result<(ScheduleDetail, Vec<String>), AppError>;

    /// Overwrite an existing slot (volunteer, status, trainee) unless its
    /// volunteer already holds another assignment at `key`.
    async fn update_schedule_detail_guarded(
        &self,
        detail: &ScheduleDetail,
        key: &OccurrenceKey,
        match_location: bool,
    ) -> Result<GuardedWrite, AppError>;

    /// Filled assignments of one volunteer, joined for conflict checks.
    async fn assignments_for_volunteer(
        &self,
        volunteer_id: &str,
    ) -> Result<Vec<AssignmentView>, AppError>;
    /// Every filled assignment, joined for the bulk scan.
    async fn all_assignments(&self) -> Result<Vec<AssignmentView>, AppError>;

    // Availability rules
    async fn list_availability_rules(
        &self,
        volunteer_id: &str,
    ) -> Result<Vec<AvailabilityRule>, AppError>;
    async fn get_availability_rule(&self, id: &str)
        -> Result<Option<AvailabilityRule>, AppError>;
    async fn insert_availability_rule(&self, rule: &AvailabilityRule) -> Result<(), AppError>;
    async fn update_availability_rule(&self, rule: &AvailabilityRule) -> Result<(), AppError>;
    async fn delete_availability_rule(&self, id: &str) -> Result<(), AppError>;

    // Swap requests
    async fn list_swap_requests(&self, filter: &SwapFilter)
        -> Result<Vec<SwapRequest>, AppError>;
    async fn get_swap_request(&self, id: &str) -> Result<Option<SwapRequest>, AppError>;
    async fn insert_swap_request(&self, request: &SwapRequest) -> Result<(), AppError>;
    /// Move a pending request to `status`. Returns `None` when the request is
    /// missing or no longer pending.
    async fn mark_swap_resolved(
        &self,
        id: &str,
        status: SwapStatus,
        resolved_by: Option<&str>,
        resolved_at: &str,
    ) -> Result<Option<SwapRequest>, AppError>;
    async fn delete_swap_request(&self, id: &str) -> Result<(), AppError>;

    // Notifications
    /// A volunteer's notifications, newest first.
    async fn list_notifications(
        &self,
        volunteer_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AppError>;
    async fn insert_notification(&self, notification: &Notification) -> Result<(), AppError>;
    async fn mark_notification_read(&self, id: &str) -> Result<(), AppError>;
    async fn delete_notification(&self, id: &str) -> Result<(), AppError>;
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS volunteers (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT,
            role TEXT NOT NULL DEFAULT 'volunteer',
            avatar TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            leader_id TEXT REFERENCES volunteers(id) ON DELETE SET NULL,
            color TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS roles (
            id TEXT PRIMARY KEY,
            team_id TEXT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT,
            requires_training INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS team_members (
            volunteer_id TEXT NOT NULL REFERENCES volunteers(id) ON DELETE CASCADE,
            team_id TEXT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            role_ids TEXT NOT NULL DEFAULT '[]',
            is_trainee INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (volunteer_id, team_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            starts_at TEXT NOT NULL,
            ends_at TEXT,
            location TEXT,
            description TEXT,
            event_type TEXT NOT NULL DEFAULT 'regular_service',
            is_recurring INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS schedules (
            id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            team_id TEXT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'draft',
            notes TEXT,
            created_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS schedule_details (
            id TEXT PRIMARY KEY,
            schedule_id TEXT NOT NULL REFERENCES schedules(id) ON DELETE CASCADE,
            role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
            volunteer_id TEXT REFERENCES volunteers(id) ON DELETE SET NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            trainee_id TEXT REFERENCES volunteers(id) ON DELETE SET NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS availability_rules (
            id TEXT PRIMARY KEY,
            volunteer_id TEXT NOT NULL REFERENCES volunteers(id) ON DELETE CASCADE,
            day_of_week INTEGER,
            start_time TEXT,
            end_time TEXT,
            is_available INTEGER NOT NULL DEFAULT 0,
            reason TEXT,
            start_date TEXT,
            end_date TEXT
        );

        CREATE TABLE IF NOT EXISTS swap_requests (
            id TEXT PRIMARY KEY,
            requester_id TEXT NOT NULL REFERENCES volunteers(id) ON DELETE CASCADE,
            schedule_detail_id TEXT NOT NULL REFERENCES schedule_details(id) ON DELETE CASCADE,
            replacement_id TEXT REFERENCES volunteers(id) ON DELETE SET NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            reason TEXT,
            created_at TEXT NOT NULL,
            resolved_by TEXT,
            resolved_at TEXT
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            volunteer_id TEXT NOT NULL REFERENCES volunteers(id) ON DELETE CASCADE,
            kind TEXT NOT NULL DEFAULT 'general',
            title TEXT NOT NULL,
            message TEXT,
            related_id TEXT,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes for the occurrence lookups and common filters
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_events_starts_at ON events(starts_at);
        CREATE INDEX IF NOT EXISTS idx_schedules_event ON schedules(event_id);
        CREATE INDEX IF NOT EXISTS idx_schedules_team ON schedules(team_id);
        CREATE INDEX IF NOT EXISTS idx_details_schedule ON schedule_details(schedule_id);
        CREATE INDEX IF NOT EXISTS idx_details_volunteer ON schedule_details(volunteer_id);
        CREATE INDEX IF NOT EXISTS idx_roles_team ON roles(team_id);
        CREATE INDEX IF NOT EXISTS idx_availability_volunteer ON availability_rules(volunteer_id);
        CREATE INDEX IF NOT EXISTS idx_swaps_status ON swap_requests(status);
        CREATE INDEX IF NOT EXISTS idx_notifications_volunteer ON notifications(volunteer_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

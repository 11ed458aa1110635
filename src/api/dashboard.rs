//! Dashboard roll-up endpoints.

use axum::{extract::State, Json};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{ApiQuery, ApiResult};
use crate::errors::AppError;
use crate::models::{EventFilter, ScheduleFilter, SwapFilter, SwapStatus};
use crate::scheduling::detector::conflicting_event_ids;
use crate::scheduling::find_all_conflicts;
use crate::scheduling::status::ServiceSummary;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub volunteer_count: usize,
    pub team_count: usize,
    pub monthly_service_count: usize,
    pub conflict_count: usize,
    pub pending_swap_requests: usize,
    pub upcoming_event_count: usize,
}

/// First and last second of the calendar month containing `now`.
fn month_bounds(now: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)?;
    let next = if now.month() == 12 {
        NaiveDate::from_ymd_opt(now.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(now.year(), now.month() + 1, 1)?
    };
    let start = first.and_hms_opt(0, 0, 0)?;
    let end = next.and_hms_opt(0, 0, 0)? - Duration::seconds(1);
    Some((start, end))
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// GET /api/dashboard/stats
pub async fn dashboard_stats(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    let store = state.store.as_ref();
    let now = local_now();
    let (month_start, month_end) = month_bounds(now)
        .ok_or_else(|| AppError::Internal(format!("No calendar month for {}", now)))?;

    let volunteer_count = store.list_volunteers().await?.len();
    let team_count = store.list_teams().await?.len();
    let monthly_service_count = store
        .list_events(&EventFilter {
            from: Some(month_start),
            to: Some(month_end),
        })
        .await?
        .len();
    let upcoming_event_count = store
        .list_events(&EventFilter {
            from: Some(now),
            to: None,
        })
        .await?
        .len();
    let pending_swap_requests = store
        .list_swap_requests(&SwapFilter {
            requester_id: None,
            status: Some(SwapStatus::Pending.as_str().to_string()),
        })
        .await?
        .len();
    let conflict_count =
        find_all_conflicts(&store.all_assignments().await?, state.config.match_location).len();

    Ok(Json(DashboardStats {
        volunteer_count,
        team_count,
        monthly_service_count,
        conflict_count,
        pending_swap_requests,
        upcoming_event_count,
    }))
}

/// Query parameters for `GET /api/dashboard/services`.
#[derive(Debug, Deserialize)]
pub struct ServicesQuery {
    /// Only events starting at or after this instant (default: now).
    #[serde(default)]
    pub from: Option<NaiveDateTime>,
    #[serde(default = "default_services_limit")]
    pub limit: usize,
}

fn default_services_limit() -> usize {
    10
}

/// GET /api/dashboard/services - Staffing status of upcoming events.
pub async fn dashboard_services(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ServicesQuery>,
) -> ApiResult<Vec<ServiceSummary>> {
    let store = state.store.as_ref();
    let from = query.from.unwrap_or_else(local_now);

    let events = store
        .list_events(&EventFilter {
            from: Some(from),
            to: None,
        })
        .await?;
    let schedules = store.list_schedules(&ScheduleFilter::default()).await?;
    let assignments = store.all_assignments().await?;
    let conflicted = conflicting_event_ids(&find_all_conflicts(
        &assignments,
        state.config.match_location,
    ));

    let summaries = events
        .into_iter()
        .take(query.limit)
        .map(|event| ServiceSummary::build(event, &schedules, &assignments, &conflicted))
        .collect();
    Ok(Json(summaries))
}

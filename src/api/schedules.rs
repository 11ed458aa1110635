//! Schedule API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::{ApiJson, ApiQuery, ApiResult, Created, EmptyResult};
use crate::errors::{AppError, FieldErrors};
use crate::models::{
    CreateScheduleRequest, Schedule, ScheduleDetail, ScheduleFilter, UpdateScheduleRequest,
};
use crate::AppState;

/// A schedule returned together with its slots.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleWithDetails {
    #[serde(flatten)]
    pub schedule: Schedule,
    pub details: Vec<ScheduleDetail>,
}

async fn load_schedule(state: &AppState, id: &str) -> Result<Schedule, AppError> {
    state
        .store
        .get_schedule(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Schedule {} not found", id)))
}

/// GET /api/schedules?teamId=&eventId=&status=
pub async fn list_schedules(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ScheduleFilter>,
) -> ApiResult<Vec<Schedule>> {
    Ok(Json(state.store.list_schedules(&filter).await?))
}

/// GET /api/schedules/:id
pub async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ScheduleWithDetails> {
    let schedule = load_schedule(&state, &id).await?;
    let details = state.store.list_schedule_details(&id).await?;
    Ok(Json(ScheduleWithDetails { schedule, details }))
}

/// POST /api/schedules - Create a schedule and open its empty slots.
pub async fn create_schedule(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateScheduleRequest>,
) -> Result<Created<ScheduleWithDetails>, AppError> {
    let status = request.validate()?;

    if state.store.get_event(&request.event_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Event {} not found", request.event_id)));
    }
    if state.store.get_team(&request.team_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Team {} not found", request.team_id)));
    }

    let roles = state.store.list_roles(&request.team_id).await?;
    let mut errors = FieldErrors::new();
    for slot in &request.slots {
        if !roles.iter().any(|r| r.id == slot.role_id) {
            errors.push(
                "slots",
                format!("role {} does not belong to the team", slot.role_id),
            );
        }
    }
    errors.into_result()?;

    let schedule = request.to_schedule(status);
    let details: Vec<ScheduleDetail> = request
        .slots
        .iter()
        .flat_map(|slot| {
            (0..slot.count).map(|_| ScheduleDetail::empty_slot(&schedule.id, &slot.role_id))
        })
        .collect();

    state.store.insert_schedule(&schedule, &details).await?;
    tracing::info!(
        schedule_id = %schedule.id,
        event_id = %schedule.event_id,
        slots = details.len(),
        "Schedule created"
    );
    Ok(Created(ScheduleWithDetails { schedule, details }))
}

/// PUT /api/schedules/:id - Change status or notes.
pub async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateScheduleRequest>,
) -> ApiResult<Schedule> {
    let mut schedule = load_schedule(&state, &id).await?;
    schedule.apply(request)?;

    state.store.update_schedule(&schedule).await?;
    Ok(Json(schedule))
}

/// DELETE /api/schedules/:id
pub async fn delete_schedule(State(state): State<AppState>, Path(id): Path<String>) -> EmptyResult {
    state.store.delete_schedule(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/schedules/:id/details
pub async fn list_schedule_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ScheduleDetail>> {
    load_schedule(&state, &id).await?;
    Ok(Json(state.store.list_schedule_details(&id).await?))
}

//! Schedule detail (assignment) API endpoints.
//!
//! Every write that puts a volunteer into a slot goes through
//! [`crate::scheduling::guard`].

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{ApiJson, ApiResult, Created, EmptyResult};
use crate::errors::AppError;
use crate::models::{CreateScheduleDetailRequest, ScheduleDetail, UpdateScheduleDetailRequest};
use crate::scheduling::guard;
use crate::AppState;

/// POST /api/schedule-details
///
/// Answers 409 with the colliding assignment when the volunteer is already
/// booked at the same occurrence, unless `resolution` is `replace` or `both`.
pub async fn create_schedule_detail(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateScheduleDetailRequest>,
) -> Result<Created<ScheduleDetail>, AppError> {
    let (detail, resolution) = request.into_detail()?;
    let created = guard::create_assignment(
        state.store.as_ref(),
        detail,
        resolution,
        state.config.match_location,
    )
    .await?;
    Ok(Created(created))
}

/// GET /api/schedule-details/:id
pub async fn get_schedule_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ScheduleDetail> {
    let detail = state
        .store
        .get_schedule_detail(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Schedule detail {} not found", id)))?;
    Ok(Json(detail))
}

/// PUT /api/schedule-details/:id
pub async fn update_schedule_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateScheduleDetailRequest>,
) -> ApiResult<ScheduleDetail> {
    let detail = guard::update_assignment(
        state.store.as_ref(),
        &id,
        request,
        state.config.match_location,
    )
    .await?;
    Ok(Json(detail))
}

/// DELETE /api/schedule-details/:id
pub async fn delete_schedule_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> EmptyResult {
    state.store.delete_schedule_detail(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

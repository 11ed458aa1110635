//! Availability rule endpoints. Listing lives under the volunteer.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{ApiJson, ApiResult, Created, EmptyResult};
use crate::errors::AppError;
use crate::models::{AvailabilityRule, CreateAvailabilityRuleRequest, UpdateAvailabilityRuleRequest};
use crate::AppState;

/// POST /api/availability-rules
pub async fn create_availability_rule(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateAvailabilityRuleRequest>,
) -> Result<Created<AvailabilityRule>, AppError> {
    let rule = request.into_rule()?;
    if state.store.get_volunteer(&rule.volunteer_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Volunteer {} not found",
            rule.volunteer_id
        )));
    }

    state.store.insert_availability_rule(&rule).await?;
    Ok(Created(rule))
}

/// PUT /api/availability-rules/:id
pub async fn update_availability_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateAvailabilityRuleRequest>,
) -> ApiResult<AvailabilityRule> {
    let mut rule = state
        .store
        .get_availability_rule(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Availability rule {} not found", id)))?;
    rule.apply(request)?;

    state.store.update_availability_rule(&rule).await?;
    Ok(Json(rule))
}

/// DELETE /api/availability-rules/:id
pub async fn delete_availability_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> EmptyResult {
    state.store.delete_availability_rule(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Conflict report endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::{ApiJson, ApiResult};
use crate::errors::FieldErrors;
use crate::models::{ConflictDetail, ConflictReport};
use crate::scheduling::{find_all_conflicts, guard};
use crate::AppState;

/// GET /api/conflicts - Every volunteer booked more than once per occurrence.
pub async fn list_conflicts(State(state): State<AppState>) -> ApiResult<Vec<ConflictReport>> {
    let assignments = state.store.all_assignments().await?;
    Ok(Json(find_all_conflicts(
        &assignments,
        state.config.match_location,
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConflictRequest {
    pub volunteer_id: String,
    pub event_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConflictResponse {
    pub has_conflict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictDetail>,
}

/// POST /api/conflicts/check - Would assigning the volunteer to the event collide?
pub async fn check_conflict(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CheckConflictRequest>,
) -> ApiResult<CheckConflictResponse> {
    let mut errors = FieldErrors::new();
    errors.require("volunteerId", &request.volunteer_id);
    errors.require("eventId", &request.event_id);
    errors.into_result()?;

    let conflict = guard::preview_conflict(
        state.store.as_ref(),
        request.volunteer_id.trim(),
        request.event_id.trim(),
        state.config.match_location,
    )
    .await?;

    Ok(Json(CheckConflictResponse {
        has_conflict: conflict.is_some(),
        conflict,
    }))
}

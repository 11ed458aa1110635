//! Volunteer API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{ApiJson, ApiQuery, ApiResult, Created, EmptyResult};
use crate::errors::{AppError, FieldErrors};
use crate::models::{
    AssignmentView, AvailabilityRule, CreateVolunteerRequest, UpdateVolunteerRequest, Volunteer,
};
use crate::AppState;

async fn load_volunteer(state: &AppState, id: &str) -> Result<Volunteer, AppError> {
    state
        .store
        .get_volunteer(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Volunteer {} not found", id)))
}

async fn ensure_username_free(
    state: &AppState,
    username: &str,
    owner_id: Option<&str>,
) -> Result<(), AppError> {
    if let Some(existing) = state.store.get_volunteer_by_username(username).await? {
        if Some(existing.id.as_str()) != owner_id {
            let mut errors = FieldErrors::new();
            errors.push("username", "username is already taken");
            errors.into_result()?;
        }
    }
    Ok(())
}

/// GET /api/volunteers - List all volunteers.
pub async fn list_volunteers(State(state): State<AppState>) -> ApiResult<Vec<Volunteer>> {
    Ok(Json(state.store.list_volunteers().await?))
}

/// GET /api/volunteers/:id
pub async fn get_volunteer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Volunteer> {
    Ok(Json(load_volunteer(&state, &id).await?))
}

/// POST /api/volunteers - Create a volunteer and index it for search.
pub async fn create_volunteer(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateVolunteerRequest>,
) -> Result<Created<Volunteer>, AppError> {
    let volunteer = request.into_volunteer()?;
    ensure_username_free(&state, &volunteer.username, None).await?;

    state.store.insert_volunteer(&volunteer).await?;
    if let Err(e) = state.search.index_volunteer(&volunteer).await {
        tracing::warn!("Failed to index volunteer {}: {:?}", volunteer.id, e);
    }

    tracing::info!(volunteer_id = %volunteer.id, "Volunteer created");
    Ok(Created(volunteer))
}

/// PUT /api/volunteers/:id
pub async fn update_volunteer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateVolunteerRequest>,
) -> ApiResult<Volunteer> {
    let mut volunteer = load_volunteer(&state, &id).await?;
    volunteer.apply(request)?;
    ensure_username_free(&state, &volunteer.username, Some(volunteer.id.as_str())).await?;

    state.store.update_volunteer(&volunteer).await?;
    if let Err(e) = state.search.index_volunteer(&volunteer).await {
        tracing::warn!("Failed to reindex volunteer {}: {:?}", volunteer.id, e);
    }

    Ok(Json(volunteer))
}

/// DELETE /api/volunteers/:id
///
/// Filled slots of the volunteer become empty; their rules, memberships and
/// swap requests go with them.
pub async fn delete_volunteer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> EmptyResult {
    state.store.delete_volunteer(&id).await?;
    if let Err(e) = state.search.remove_volunteer(&id).await {
        tracing::warn!("Failed to remove volunteer {} from index: {:?}", id, e);
    }

    tracing::info!(volunteer_id = %id, "Volunteer deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/volunteers/:id/assignments - Filled slots of one volunteer.
pub async fn list_volunteer_assignments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<AssignmentView>> {
    load_volunteer(&state, &id).await?;
    Ok(Json(state.store.assignments_for_volunteer(&id).await?))
}

/// GET /api/volunteers/:id/availability
pub async fn list_volunteer_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<AvailabilityRule>> {
    load_volunteer(&state, &id).await?;
    Ok(Json(state.store.list_availability_rules(&id).await?))
}

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    /// Maximum number of results (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: usize = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub volunteer: Volunteer,
    pub score: f32,
}

/// GET /api/volunteers/search?q= - Full-text search over the directory.
pub async fn search_volunteers(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchQuery>,
) -> ApiResult<Vec<SearchResultItem>> {
    let limit = params.limit.min(MAX_SEARCH_LIMIT);
    let hits = state.search.search(&params.q, limit)?;

    // The index may briefly lag behind deletes; skip ids that no longer resolve
    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        if let Some(volunteer) = state.store.get_volunteer(&hit.volunteer_id).await? {
            results.push(SearchResultItem {
                volunteer,
                score: hit.score,
            });
        }
    }

    Ok(Json(results))
}

//! Event API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{ApiJson, ApiQuery, ApiResult, Created, EmptyResult};
use crate::errors::AppError;
use crate::models::{CreateEventRequest, Event, EventFilter, UpdateEventRequest};
use crate::AppState;

/// GET /api/events?from=&to= - Events ordered by start, bounds inclusive.
pub async fn list_events(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<EventFilter>,
) -> ApiResult<Vec<Event>> {
    Ok(Json(state.store.list_events(&filter).await?))
}

/// GET /api/events/:id
pub async fn get_event(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Event> {
    let event = state
        .store
        .get_event(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))?;
    Ok(Json(event))
}

/// POST /api/events
pub async fn create_event(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateEventRequest>,
) -> Result<Created<Event>, AppError> {
    let event = request.into_event()?;
    state.store.insert_event(&event).await?;

    tracing::info!(event_id = %event.id, starts_at = %event.starts_at, "Event created");
    Ok(Created(event))
}

/// PUT /api/events/:id
///
/// Moving an event does not re-check its existing assignments; the conflict
/// report surfaces any collision this creates.
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateEventRequest>,
) -> ApiResult<Event> {
    let mut event = state
        .store
        .get_event(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))?;
    event.apply(request)?;

    state.store.update_event(&event).await?;
    Ok(Json(event))
}

/// DELETE /api/events/:id - Cascades to the event's schedules and their slots.
pub async fn delete_event(State(state): State<AppState>, Path(id): Path<String>) -> EmptyResult {
    state.store.delete_event(&id).await?;
    tracing::info!(event_id = %id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

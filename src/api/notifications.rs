//! Notification inbox endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{ApiJson, ApiResult, Created, EmptyResult};
use crate::errors::AppError;
use crate::models::{CreateNotificationRequest, Notification};
use crate::AppState;

async fn inbox(
    state: &AppState,
    volunteer_id: &str,
    unread_only: bool,
) -> Result<Vec<Notification>, AppError> {
    if state.store.get_volunteer(volunteer_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Volunteer {} not found",
            volunteer_id
        )));
    }
    state
        .store
        .list_notifications(volunteer_id, unread_only)
        .await
}

/// GET /api/volunteers/:id/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Notification>> {
    Ok(Json(inbox(&state, &id, false).await?))
}

/// GET /api/volunteers/:id/unread-notifications
pub async fn list_unread_notifications(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Notification>> {
    Ok(Json(inbox(&state, &id, true).await?))
}

/// POST /api/notifications
pub async fn create_notification(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateNotificationRequest>,
) -> Result<Created<Notification>, AppError> {
    let notification = request.into_notification()?;
    if state
        .store
        .get_volunteer(&notification.volunteer_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!(
            "Volunteer {} not found",
            notification.volunteer_id
        )));
    }

    state.store.insert_notification(&notification).await?;
    Ok(Created(notification))
}

/// PATCH /api/notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> EmptyResult {
    state.store.mark_notification_read(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/notifications/:id
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> EmptyResult {
    state.store.delete_notification(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

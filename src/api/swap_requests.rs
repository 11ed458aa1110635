//! Swap request API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{ApiJson, ApiQuery, ApiResult, Created, EmptyResult};
use crate::errors::AppError;
use crate::models::{CreateSwapRequest, ResolveSwapRequest, SwapFilter, SwapRequest};
use crate::scheduling::swap;
use crate::AppState;

/// GET /api/swap-requests?requesterId=&status=
pub async fn list_swap_requests(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<SwapFilter>,
) -> ApiResult<Vec<SwapRequest>> {
    Ok(Json(state.store.list_swap_requests(&filter).await?))
}

/// GET /api/swap-requests/:id
pub async fn get_swap_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SwapRequest> {
    let swap = state
        .store
        .get_swap_request(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Swap request {} not found", id)))?;
    Ok(Json(swap))
}

/// POST /api/swap-requests
pub async fn create_swap_request(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateSwapRequest>,
) -> Result<Created<SwapRequest>, AppError> {
    let swap = swap::create_swap(state.store.as_ref(), request).await?;
    Ok(Created(swap))
}

/// PUT /api/swap-requests/:id - Approve or reject a pending request.
pub async fn resolve_swap_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<ResolveSwapRequest>,
) -> ApiResult<SwapRequest> {
    let resolved = swap::resolve_swap(
        state.store.as_ref(),
        &id,
        request,
        state.config.match_location,
    )
    .await?;
    Ok(Json(resolved))
}

/// DELETE /api/swap-requests/:id
pub async fn delete_swap_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> EmptyResult {
    state.store.delete_swap_request(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

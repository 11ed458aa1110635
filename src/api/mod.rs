//! REST API module.
//!
//! Success bodies are the bare resource as JSON; failures are
//! [`crate::errors::ErrorResponse`] bodies produced by `AppError`.

mod availability;
mod conflicts;
mod dashboard;
mod events;
mod notifications;
mod schedule_details;
mod schedules;
mod swap_requests;
mod teams;
mod volunteers;

pub use availability::*;
pub use conflicts::*;
pub use dashboard::*;
pub use events::*;
pub use notifications::*;
pub use schedule_details::*;
pub use schedules::*;
pub use swap_requests::*;
pub use teams::*;
pub use volunteers::*;

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// JSON body extractor whose rejections become 400 field errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections become 400 errors.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// A freshly created resource, answered with 201.
pub struct Created<T>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

/// Response type for handlers returning a resource.
pub type ApiResult<T> = Result<Json<T>, AppError>;

/// Response type for delete handlers.
pub type EmptyResult = Result<StatusCode, AppError>;

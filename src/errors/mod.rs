//! Error handling module for the scheduler backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response bodies.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::{AvailabilityRule, ConflictDetail};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const SCHEDULE_CONFLICT: &str = "SCHEDULE_CONFLICT";
    pub const VOLUNTEER_UNAVAILABLE: &str = "VOLUNTEER_UNAVAILABLE";
    pub const INVALID_TRANSITION: &str = "INVALID_TRANSITION";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// A single rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Collects field errors while validating a request body.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Record an error when a required text field is blank.
    pub fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, format!("{} is required", field));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Authentication required
    Unauthorized(String),
    /// Resource not found
    NotFound(String),
    /// Request body failed validation
    Validation(Vec<FieldError>),
    /// The volunteer already holds an assignment at the same occurrence
    ScheduleConflict(Box<ConflictDetail>),
    /// The volunteer marked this occurrence as unavailable
    Unavailable(Box<AvailabilityRule>),
    /// State machine transition not allowed
    InvalidTransition(String),
    /// Database error
    Database(String),
    /// Search index error
    Search(String),
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::ScheduleConflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::CONFLICT,
            AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::ScheduleConflict(_) => codes::SCHEDULE_CONFLICT,
            AppError::Unavailable(_) => codes::VOLUNTEER_UNAVAILABLE,
            AppError::InvalidTransition(_) => codes::INVALID_TRANSITION,
            AppError::Database(_) | AppError::Search(_) | AppError::Internal(_) => {
                codes::INTERNAL_ERROR
            }
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the client-facing error message.
    ///
    /// Server-side failures never leak their detail.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation(_) => "Validation error".to_string(),
            AppError::ScheduleConflict(_) => {
                "Volunteer is already scheduled at this date and time".to_string()
            }
            AppError::Unavailable(_) => {
                "Volunteer is unavailable at this date and time".to_string()
            }
            AppError::InvalidTransition(msg) => msg.clone(),
            AppError::Database(_) | AppError::Search(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            AppError::BadRequest(msg) => msg.clone(),
        }
    }

    fn internal_detail(&self) -> Option<&str> {
        match self {
            AppError::Database(msg) | AppError::Search(msg) | AppError::Internal(msg) => Some(msg),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.internal_detail() {
            Some(detail) => write!(f, "{}: {}", self.error_code(), detail),
            None => write!(f, "{}: {}", self.error_code(), self.message()),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<tantivy::TantivyError> for AppError {
    fn from(err: tantivy::TantivyError) -> Self {
        tracing::error!("Search error: {:?}", err);
        AppError::Search(format!("Search error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Internal(format!("JSON error: {}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(vec![FieldError {
            field: "body".to_string(),
            message: rejection.body_text(),
        }])
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<AvailabilityRule>,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let mut body = Self {
            code: error.error_code().to_string(),
            message: error.message(),
            fields: None,
            conflict: None,
            rule: None,
        };

        match error {
            AppError::Validation(fields) => body.fields = Some(fields.clone()),
            AppError::ScheduleConflict(detail) => body.conflict = Some((**detail).clone()),
            AppError::Unavailable(rule) => body.rule = Some((**rule).clone()),
            _ => {}
        }

        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}

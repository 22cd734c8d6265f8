use crate::api::ApiResponse;
use axum::{http::StatusCode, response::Json};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Domain errors raised by the engine, the stores and the study service.
///
/// Every operation that returns one of these has left no partial state
/// behind: a review either updates the card and appends its event, or
/// does neither.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{resource} with id '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    #[error("Attempt '{0}' has already been graded")]
    AlreadyGraded(Uuid),

    #[error("Session '{0}' has already been finalized")]
    AlreadyFinalized(Uuid),

    #[error("Concurrent update conflict on {resource} '{id}'")]
    Conflict { resource: &'static str, id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("Content service error: {0}")]
    ContentService(String),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn conflict(resource: &'static str, id: impl ToString) -> Self {
        EngineError::Conflict {
            resource,
            id: id.to_string(),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Storage(anyhow::Error::from(err))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Storage(anyhow::Error::from(err))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),

    #[error("Content service error: {0}")]
    ContentServiceError(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub user_friendly_message: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_id: None,
            resource_type: resource_type.to_string(),
            user_friendly_message: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn with_user_message(mut self, message: &str) -> Self {
        self.user_friendly_message = Some(message.to_string());
        self
    }
}

impl ApiError {
    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(
        self,
        context: ErrorContext,
    ) -> (StatusCode, Json<ApiResponse<()>>) {
        match &self {
            ApiError::NotFound(_) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Resource not found"
                );
                (
                    StatusCode::NOT_FOUND,
                    Json(ApiResponse::error(
                        context
                            .user_friendly_message
                            .unwrap_or_else(|| format!("{} not found", context.resource_type)),
                    )),
                )
            }
            ApiError::ValidationError(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Validation error"
                );
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error(self.to_string())),
                )
            }
            ApiError::Conflict(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Conflicting state transition"
                );
                (
                    StatusCode::CONFLICT,
                    Json(ApiResponse::error(self.to_string())),
                )
            }
            ApiError::ContentServiceError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Content service error"
                );
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ApiResponse::error(
                        "Content generation service unavailable. Please try again.".to_string(),
                    )),
                )
            }
            ApiError::DatabaseError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Database error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error(
                        "Database operation failed. Please try again.".to_string(),
                    )),
                )
            }
        }
    }

    /// Simple conversion without context
    pub fn to_response(self) -> (StatusCode, Json<ApiResponse<()>>) {
        let context = ErrorContext::new("unknown", "resource");
        self.to_response_with_context(context)
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => ApiError::ValidationError(msg),
            e @ EngineError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            e @ (EngineError::AlreadyGraded(_)
            | EngineError::AlreadyFinalized(_)
            | EngineError::Conflict { .. }) => ApiError::Conflict(e.to_string()),
            EngineError::Storage(e) => ApiError::DatabaseError(e),
            EngineError::ContentService(msg) => ApiError::ContentServiceError(msg),
        }
    }
}

/// Helper macro turning an `EngineError` into an HTTP error response with context
#[macro_export]
macro_rules! api_error {
    ($error:expr, $operation:expr, $resource_type:expr) => {
        $crate::errors::ApiError::from($error)
            .to_response_with_context($crate::errors::ErrorContext::new($operation, $resource_type))
    };

    ($error:expr, $operation:expr, $resource_type:expr, $id:expr) => {
        $crate::errors::ApiError::from($error).to_response_with_context(
            $crate::errors::ErrorContext::new($operation, $resource_type).with_id($id),
        )
    };
}

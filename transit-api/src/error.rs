use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use transit_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    ConflictError(String),
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::UnprocessableEntity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::TicketNotFound(_)
            | CoreError::BookingNotFound(_)
            | CoreError::UserNotFound(_)
            | CoreError::RouteNotFound { .. } => AppError::NotFoundError(message),
            CoreError::InsufficientInventory { .. } | CoreError::InsufficientBalance { .. } => {
                AppError::UnprocessableEntity(message)
            }
            CoreError::NotOwner { .. } => AppError::AuthorizationError(message),
            CoreError::AlreadyCanceled(_) | CoreError::ConcurrencyConflict(_) => AppError::ConflictError(message),
            CoreError::ValidationError(_) => AppError::ValidationError(message),
            CoreError::RollbackFailed { .. } | CoreError::CancelIncomplete { .. } | CoreError::StorageError(_) => {
                AppError::InternalServerError(message)
            }
        }
    }
}

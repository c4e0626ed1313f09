//! Error types for the service layer, viewer sessions and HTTP responses.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{dao::storage::StorageError, dto::ws::InboundDecodeError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(target) => ServiceError::NotFound(target),
            other => ServiceError::Unavailable(other),
        }
    }
}

/// Failures while handling one viewer message.
///
/// None of them is fatal: the handler logs the error and keeps the connection open.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// Payload is not one of the known message kinds or fails validation.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] InboundDecodeError),
    /// Non-text frame received on the viewer socket.
    #[error("malformed message: unsupported {0} frame")]
    UnsupportedFrame(&'static str),
    /// Update received while the session is not subscribed to a match.
    #[error("invalid state: `{kind}` received before join_match")]
    InvalidState {
        /// Wire name of the rejected message.
        kind: &'static str,
    },
    /// The match store could not complete the operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] ServiceError),
    /// The update does not fit the targeted match (e.g. wrong sport).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Unknown match, poll or poll option.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<ServiceError> for ViewerError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(target) => ViewerError::NotFound(target),
            ServiceError::InvalidInput(message) | ServiceError::InvalidState(message) => {
                ViewerError::InvalidInput(message)
            }
            other => ViewerError::StoreUnavailable(other),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_not_found_stays_not_found_for_viewers() {
        let service: ServiceError = StorageError::not_found("match `m9`").into();
        let viewer: ViewerError = service.into();
        assert!(matches!(viewer, ViewerError::NotFound(target) if target == "match `m9`"));
    }

    #[test]
    fn degraded_and_timeouts_are_store_unavailable_for_viewers() {
        assert!(matches!(
            ViewerError::from(ServiceError::Degraded),
            ViewerError::StoreUnavailable(ServiceError::Degraded)
        ));
        assert!(matches!(
            ViewerError::from(ServiceError::Timeout),
            ViewerError::StoreUnavailable(ServiceError::Timeout)
        ));
    }

    #[test]
    fn http_status_follows_error_kind() {
        let response =
            AppError::from(ServiceError::InvalidState("already live".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let response = AppError::from(ServiceError::Degraded).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

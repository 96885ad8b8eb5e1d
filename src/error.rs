/// Unified error types for the CampusConnect workflow core
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a state transition was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// Approve/reject on an item that already left Pending
    NotPending,
    /// A participant row already exists for this user
    AlreadyJoined,
    /// Participant count reached capacity
    Full,
    /// Event is ongoing, completed or cancelled
    NotUpcoming,
    /// Optimistic retry budget ran out while other writers kept winning
    ConcurrentModification,
}

impl ConflictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictReason::NotPending => "not_pending",
            ConflictReason::AlreadyJoined => "already_joined",
            ConflictReason::Full => "full",
            ConflictReason::NotUpcoming => "not_upcoming",
            ConflictReason::ConcurrentModification => "concurrent_modification",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConflictReason::NotPending => "item is not pending approval",
            ConflictReason::AlreadyJoined => "already joined this event",
            ConflictReason::Full => "event is full",
            ConflictReason::NotUpcoming => "event is not upcoming",
            ConflictReason::ConcurrentModification => "item was modified concurrently",
        };
        f.write_str(text)
    }
}

/// Main error type for workflow operations
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Item, participant record or notification absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Scope or ownership mismatch
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid state transition, duplicate join, capacity exceeded, wrong phase
    #[error("Conflict: {0}")]
    Conflict(ConflictReason),

    /// Malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity store failure or timeout
    #[error("Store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// Notification transport failure or timeout
    #[error("Notification dispatch unavailable: {0}")]
    DispatchUnavailable(String),

    /// Corrupt rows, configuration faults
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// True for the store and dispatch failures that callers may retry
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            WorkflowError::Unavailable(_) | WorkflowError::DispatchUnavailable(_)
        )
    }
}

impl From<validator::ValidationErrors> for WorkflowError {
    fn from(errors: validator::ValidationErrors) -> Self {
        WorkflowError::Validation(errors.to_string())
    }
}

/// JSON error body returned to HTTP callers
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert WorkflowError to HTTP response
impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            WorkflowError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            WorkflowError::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden", self.to_string()),
            WorkflowError::Conflict(reason) => {
                (StatusCode::CONFLICT, reason.as_str(), self.to_string())
            }
            WorkflowError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            WorkflowError::Unavailable(_) | WorkflowError::DispatchUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Unavailable",
                "Service temporarily unavailable".to_string(), // Don't leak details
            ),
            WorkflowError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (WorkflowError::NotFound("event".into()), StatusCode::NOT_FOUND),
            (WorkflowError::Forbidden("dept".into()), StatusCode::FORBIDDEN),
            (WorkflowError::Conflict(ConflictReason::Full), StatusCode::CONFLICT),
            (WorkflowError::Validation("title".into()), StatusCode::BAD_REQUEST),
            (
                WorkflowError::Unavailable(sqlx::Error::PoolTimedOut),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (WorkflowError::Internal("bad row".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_conflict_display() {
        let err = WorkflowError::Conflict(ConflictReason::AlreadyJoined);
        assert_eq!(err.to_string(), "Conflict: already joined this event");
        assert!(!err.is_unavailable());
        assert!(WorkflowError::Unavailable(sqlx::Error::PoolTimedOut).is_unavailable());
    }
}

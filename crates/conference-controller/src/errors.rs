//! Conference Controller error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse`
//! impl. Callers get a clear split between "your request was rejected"
//! (permission/capacity/state errors) and "try again later" (store and
//! transport failures). Error messages returned to clients are generic to
//! avoid leaking internal details; actual errors are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Conference Controller error type.
///
/// Maps to appropriate HTTP status codes:
/// - Database, Internal: 500 Internal Server Error
/// - NotFound: 404 Not Found
/// - PermissionDenied: 403 Forbidden
/// - CapacityExceeded, Conflict, InvalidState: 409 Conflict
/// - BadRequest: 400 Bad Request
/// - ServiceUnavailable: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum ConfError {
    /// Store operation failed. The only class treated as fatal to the
    /// calling operation; no partial state is left behind.
    #[error("Database error: {0}")]
    Database(String),

    /// Conference, participant, or call absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Role or ownership check failed.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Conference is full.
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Duplicate active participation or user already on a live call.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation not valid for the current status.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed request input.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Downstream dependency unavailable.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal error.
    #[error("Internal server error")]
    Internal,
}

impl ConfError {
    /// Returns the HTTP status code for this error (for metrics recording).
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            ConfError::Database(_) | ConfError::Internal => 500,
            ConfError::NotFound(_) => 404,
            ConfError::PermissionDenied(_) => 403,
            ConfError::CapacityExceeded(_) | ConfError::Conflict(_) | ConfError::InvalidState(_) => {
                409
            }
            ConfError::BadRequest(_) => 400,
            ConfError::ServiceUnavailable(_) => 503,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ConfError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ConfError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "conf.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            ConfError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            ConfError::PermissionDenied(reason) => (
                StatusCode::FORBIDDEN,
                "PERMISSION_DENIED",
                reason.clone(),
            ),
            ConfError::CapacityExceeded(reason) => (
                StatusCode::CONFLICT,
                "CAPACITY_EXCEEDED",
                reason.clone(),
            ),
            ConfError::Conflict(reason) => (StatusCode::CONFLICT, "CONFLICT", reason.clone()),
            ConfError::InvalidState(reason) => {
                (StatusCode::CONFLICT, "INVALID_STATE", reason.clone())
            }
            ConfError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            ConfError::ServiceUnavailable(reason) => {
                // Log actual reason server-side
                tracing::warn!(target: "conf.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            ConfError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Convert sqlx errors to ConfError
impl From<sqlx::Error> for ConfError {
    fn from(err: sqlx::Error) -> Self {
        ConfError::Database(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    // Helper function to read the response body as JSON
    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_database_error() {
        let error = ConfError::Database("connection failed".to_string());
        assert_eq!(format!("{}", error), "Database error: connection failed");
    }

    #[test]
    fn test_display_not_found() {
        let error = ConfError::NotFound("conference".to_string());
        assert_eq!(format!("{}", error), "Not found: conference");
    }

    #[test]
    fn test_display_permission_denied() {
        let error = ConfError::PermissionDenied("not the originator".to_string());
        assert_eq!(
            format!("{}", error),
            "Permission denied: not the originator"
        );
    }

    #[test]
    fn test_display_capacity_exceeded() {
        let error = ConfError::CapacityExceeded("conference is full".to_string());
        assert_eq!(format!("{}", error), "Capacity exceeded: conference is full");
    }

    #[test]
    fn test_display_invalid_state() {
        let error = ConfError::InvalidState("call already ended".to_string());
        assert_eq!(format!("{}", error), "Invalid state: call already ended");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ConfError::Database("test".to_string()).status_code(), 500);
        assert_eq!(ConfError::NotFound("test".to_string()).status_code(), 404);
        assert_eq!(
            ConfError::PermissionDenied("test".to_string()).status_code(),
            403
        );
        assert_eq!(
            ConfError::CapacityExceeded("test".to_string()).status_code(),
            409
        );
        assert_eq!(ConfError::Conflict("test".to_string()).status_code(), 409);
        assert_eq!(
            ConfError::InvalidState("test".to_string()).status_code(),
            409
        );
        assert_eq!(ConfError::BadRequest("test".to_string()).status_code(), 400);
        assert_eq!(
            ConfError::ServiceUnavailable("test".to_string()).status_code(),
            503
        );
        assert_eq!(ConfError::Internal.status_code(), 500);
    }

    #[tokio::test]
    async fn test_into_response_database_error() {
        let error = ConfError::Database("connection failed".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "DATABASE_ERROR");
        assert_eq!(
            body_json["error"]["message"],
            "An internal database error occurred"
        );
    }

    #[tokio::test]
    async fn test_into_response_permission_denied() {
        let error = ConfError::PermissionDenied("moderators cannot kick moderators".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "PERMISSION_DENIED");
        assert_eq!(
            body_json["error"]["message"],
            "moderators cannot kick moderators"
        );
    }

    #[tokio::test]
    async fn test_into_response_capacity_exceeded() {
        let error = ConfError::CapacityExceeded("conference is full".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "CAPACITY_EXCEEDED");
    }

    #[tokio::test]
    async fn test_into_response_service_unavailable_is_generic() {
        let error = ConfError::ServiceUnavailable("redis down".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "SERVICE_UNAVAILABLE");
        // Generic message returned to client
        assert_eq!(
            body_json["error"]["message"],
            "Service temporarily unavailable"
        );
    }
}

//! HTTP error mapping for the REST API

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::joint::JointError;

use super::dto::timestamp;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request or value out of range
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Motion refused because another command holds the arm
    #[error("{0}")]
    Conflict(String),

    /// Robot link down or a command failed on the wire
    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code for clients
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "robot_busy",
            ApiError::ServiceUnavailable(_) => "robot_unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    status: u16,
    timestamp: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
            timestamp: timestamp(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JointError> for ApiError {
    fn from(err: JointError) -> Self {
        match err {
            e if e.is_validation() => ApiError::BadRequest(e.to_string()),
            e @ (JointError::Busy | JointError::Cancelled) => ApiError::Conflict(e.to_string()),
            e @ JointError::Communication(_) => ApiError::ServiceUnavailable(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::SdkError;

    #[test]
    fn joint_errors_map_to_status_codes() {
        let cases = [
            (JointError::InvalidJoint(9), StatusCode::BAD_REQUEST),
            (JointError::WrongAngleCount(3), StatusCode::BAD_REQUEST),
            (JointError::Busy, StatusCode::CONFLICT),
            (JointError::Cancelled, StatusCode::CONFLICT),
            (
                JointError::Communication(SdkError::Disconnected),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (JointError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn message_is_carried_through() {
        let err = ApiError::from(JointError::InvalidSpeed(0));
        assert_eq!(err.to_string(), "Speed must be between 1-100, got 0");
        assert_eq!(err.code(), "validation_error");
    }
}

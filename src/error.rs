use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for goalcast handlers and services
#[derive(Debug, thiserror::Error)]
pub enum GoalcastError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request timeout")]
    RequestTimeout,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Standard error response format for API errors.
#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_id: Option<String>,
}

impl GoalcastError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
        }
    }

    /// Returns a message safe to expose in client responses.
    ///
    /// Client errors (4xx) keep their message since the caller needs to know
    /// what went wrong. Server errors (5xx) are reduced to a generic message;
    /// the full error is logged server-side only (CWE-209).
    fn safe_message(&self) -> String {
        match self {
            Self::NotFound(msg) => format!("Not found: {}", msg),
            Self::BadRequest(msg) => format!("Bad request: {}", msg),
            Self::Unauthorized(msg) => format!("Unauthorized: {}", msg),
            Self::Forbidden(msg) => format!("Forbidden: {}", msg),
            Self::RequestTimeout => "Request timeout".to_string(),

            Self::Internal(_) | Self::Anyhow(_) => "Internal server error".to_string(),
            Self::ServiceUnavailable(_) => "Service unavailable".to_string(),
        }
    }
}

impl IntoResponse for GoalcastError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            status = status.as_u16(),
            error_id = %error_id,
            error = %self,
            "Request failed"
        );

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            error_id: Some(error_id),
        });

        (status, body).into_response()
    }
}

/// Result type alias for goalcast handlers
pub type Result<T> = std::result::Result<T, GoalcastError>;

impl From<serde_json::Error> for GoalcastError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            GoalcastError::BadRequest(format!("JSON error: {}", err))
        } else {
            GoalcastError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<reqwest::Error> for GoalcastError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GoalcastError::RequestTimeout
        } else if err.is_connect() {
            GoalcastError::ServiceUnavailable(format!("Connection error: {}", err))
        } else if err.is_status() {
            if let Some(status) = err.status() {
                match status.as_u16() {
                    401 => GoalcastError::Unauthorized("Upstream authentication failed".to_string()),
                    403 => GoalcastError::Forbidden("Upstream access denied".to_string()),
                    404 => GoalcastError::NotFound("Upstream resource not found".to_string()),
                    503 => GoalcastError::ServiceUnavailable("Upstream service unavailable".to_string()),
                    _ => GoalcastError::Internal(format!("Upstream error: {}", err)),
                }
            } else {
                GoalcastError::Internal(format!("HTTP error: {}", err))
            }
        } else {
            GoalcastError::Internal(format!("Request error: {}", err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_variants() {
        assert_eq!(
            GoalcastError::not_found("x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GoalcastError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GoalcastError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GoalcastError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_are_redacted() {
        let err = GoalcastError::internal("database password is hunter2");
        assert_eq!(err.safe_message(), "Internal server error");
    }

    #[test]
    fn client_errors_keep_their_message() {
        let err = GoalcastError::bad_request("unknown price ID");
        assert_eq!(err.safe_message(), "Bad request: unknown price ID");
    }
}

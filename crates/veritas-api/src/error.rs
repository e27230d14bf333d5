//! API error type and JSON error bodies.
//!
//! Every failure leaves the server as `{"error": code, "message": text}`
//! with a matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use veritas_core::VeritasError;
use veritas_rag::RagError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. "bad_request").
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 - missing or invalid parameters.
    BadRequest(String),
    /// 401 - missing, invalid, or expired credentials.
    Unauthorized(String),
    /// 403 - valid credentials without the needed privilege.
    Forbidden(String),
    /// 429 - rate limit hit.
    TooManyRequests(String),
    /// 500 - unexpected server error.
    Internal(String),
    /// 502 - the model or a search backend failed or misbehaved.
    BadGateway(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::TooManyRequests(_) => "too_many_requests",
            ApiError::Internal(_) => "internal_error",
            ApiError::BadGateway(_) => "upstream_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::TooManyRequests(m)
            | ApiError::Internal(m)
            | ApiError::BadGateway(m) => m,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code().to_string(),
            message: self.message().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!(code = self.code(), message = self.message(), "Request failed");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match &err {
            RagError::EmptyQuestion | RagError::QuestionTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            RagError::ContractViolation { .. }
            | RagError::Model(_)
            | RagError::Retrieval(_)
            | RagError::WebSearch(_) => ApiError::BadGateway(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<VeritasError> for ApiError {
    fn from(err: VeritasError) -> Self {
        match &err {
            VeritasError::Config(msg) => ApiError::BadRequest(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rag_error_mapping() {
        assert_eq!(
            ApiError::from(RagError::EmptyQuestion).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(RagError::ContractViolation {
                component: "route_classifier",
                value: "database".to_string(),
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(RagError::StepLimitExceeded(100)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_body_shape() {
        let body = serde_json::to_value(ApiError::Forbidden("admin only".into()).body()).unwrap();
        assert_eq!(body["error"], "forbidden");
        assert_eq!(body["message"], "admin only");
    }
}

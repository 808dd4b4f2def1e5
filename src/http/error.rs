//! HTTP error responses.
//!
//! Client mistakes are reported with their kind and message. Server-side
//! failures are logged in full and answered with a generic message.

use std::fmt;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde_json::json;

use crate::AssessmentError;

/// Random per-request identifier, echoed in error bodies and log spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 8];
        ChaCha20Rng::from_entropy().fill_bytes(&mut bytes);
        Self(format!(
            "req-{}",
            bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    request_id: RequestId,
}

impl ApiError {
    pub fn from_assessment(err: AssessmentError, request_id: &RequestId) -> Self {
        if err.is_client_error() {
            tracing::warn!("Rejected request: {err}");
            Self {
                status: StatusCode::BAD_REQUEST,
                kind: err.kind().as_str(),
                message: err.to_string(),
                request_id: request_id.clone(),
            }
        } else {
            tracing::error!("Assessment failed ({}): {err}", err.kind().as_str());
            Self::internal_with_id(request_id)
        }
    }

    pub fn from_rejection(rejection: JsonRejection, request_id: &RequestId) -> Self {
        tracing::warn!("Rejected request body: {}", rejection.body_text());
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                kind: "payload_too_large",
                message: "Request body exceeds the configured limit".into(),
                request_id: request_id.clone(),
            };
        }
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "validation_error",
            message: rejection.body_text(),
            request_id: request_id.clone(),
        }
    }

    pub fn timeout(limit: Duration, request_id: &RequestId) -> Self {
        tracing::error!("Request exceeded {}s", limit.as_secs_f64());
        Self {
            status: StatusCode::GATEWAY_TIMEOUT,
            kind: "timeout",
            message: format!("Request exceeded {}s", limit.as_secs_f64()),
            request_id: request_id.clone(),
        }
    }

    /// A failure outside the assessment itself (e.g. a worker panic).
    pub fn internal(detail: impl fmt::Display, request_id: &RequestId) -> Self {
        tracing::error!("Internal failure: {detail}");
        Self::internal_with_id(request_id)
    }

    fn internal_with_id(request_id: &RequestId) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message: "Internal server error".into(),
            request_id: request_id.clone(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "kind": self.kind,
            "request_id": self.request_id.as_str(),
        }));

        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CryptoError, FeatureError};

    #[test]
    fn test_client_errors_are_bad_request() {
        let id = RequestId::generate();
        let err = ApiError::from_assessment(
            FeatureError::WrongArity { expected: 6, got: 1 }.into(),
            &id,
        );
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind, "validation_error");
        assert!(err.message.contains('6'));
    }

    #[test]
    fn test_server_errors_hide_details() {
        let id = RequestId::generate();
        let err = ApiError::from_assessment(
            CryptoError::Computation("bootstrapping key 0xdeadbeef".into()).into(),
            &id,
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind, "internal");
        assert!(!err.message.contains("deadbeef"));
    }

    #[test]
    fn test_request_ids_are_random() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("req-"));
        assert_eq!(a.as_str().len(), 20);
    }
}

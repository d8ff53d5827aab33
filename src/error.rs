//! Error taxonomy for the HTTP surface.
//!
//! Write paths return structured `{error, details}` JSON bodies so the
//! editing client can show a specific message and decide whether to fall
//! back to local-only persistence. Read paths never produce these errors:
//! they degrade to defaults instead (see `document.rs`).

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Everything a write path can fail with. Mapped 1:1 onto HTTP statuses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed { allow: &'static str },

    /// Aggregates every field-level violation; never short-circuits.
    #[error("Validation failed")]
    ValidationFailed(Vec<String>),

    /// The sanitizer rejected the HTML outright (deny-list hit).
    #[error("HTML sanitization failed: {0}")]
    UnsafeContent(String),

    /// Bad or missing access code on the upload path. The update path
    /// reports the same condition as a validation error instead.
    #[error("Access code incorrect or missing: {0}")]
    Forbidden(String),

    /// Backing store missing or unreachable.
    #[error("Storage not configured: {0}")]
    StorageUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::ValidationFailed(_) | ApiError::UnsafeContent(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::MethodNotAllowed { .. } => json!({ "error": "Method not allowed" }),
            ApiError::ValidationFailed(details) => json!({
                "error": "Validation failed",
                "details": details,
            }),
            ApiError::UnsafeContent(detail) => json!({
                "error": "HTML sanitization failed",
                "details": detail,
            }),
            ApiError::Forbidden(detail) => json!({
                "error": "Access code incorrect or missing",
                "details": detail,
            }),
            ApiError::StorageUnavailable(detail) => json!({
                "error": "Storage not configured",
                "details": detail,
            }),
            ApiError::Internal(_) => json!({
                "error": "Internal server error",
            }),
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::MethodNotAllowed { allow } = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            ApiError::MethodNotAllowed { allow: "GET" }.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiError::ValidationFailed(vec![]).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::UnsafeContent("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::StorageUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn method_not_allowed_sets_allow_header() {
        let response = ApiError::MethodNotAllowed { allow: "POST" }.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "POST");
    }
}

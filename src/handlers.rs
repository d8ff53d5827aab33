//! HTTP route handlers for the banner API.
//!
//! Read endpoints (document fetch, update check, health) degrade instead of
//! erroring so a broken backend never blanks a display. Write endpoints
//! (document update, image upload) return the structured errors defined in
//! `error.rs`.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, info};

use crate::document;
use crate::error::ApiError;
use crate::models::{BannerDocument, Direction, UpdateRequest, DEFAULT_COLOR, DEFAULT_SPEED};
use crate::upload;
use crate::validate;
use crate::AppState;

const NO_STORE: &str = "no-cache, no-store, must-revalidate";

/// Reads may be cached briefly; staleness is bounded by the poll interval.
const READ_CACHE: &str = "public, max-age=60";

// ============================================================================
// Method Fallbacks
// ============================================================================

pub async fn only_get() -> Response {
    ApiError::MethodNotAllowed { allow: "GET" }.into_response()
}

pub async fn only_post() -> Response {
    ApiError::MethodNotAllowed { allow: "POST" }.into_response()
}

// ============================================================================
// Document Read
// ============================================================================

/// `GET /api/get-document` — the full banner document, defaults when absent.
/// Never errors to the caller.
pub async fn get_document(State(state): State<Arc<AppState>>) -> Response {
    let doc = document::read_document(state.kv());
    ([(header::CACHE_CONTROL, READ_CACHE)], Json(doc)).into_response()
}

// ============================================================================
// Update Check
// ============================================================================

/// `GET /api/check-updates` — only the last-modified timestamp, for the
/// polling loop. Degrades to "now" on any failure so pollers are never
/// blocked, and always reaches the origin (no caching).
pub async fn check_updates(State(state): State<Arc<AppState>>) -> Response {
    let ts = document::last_modified(state.kv());
    (
        [(header::CACHE_CONTROL, NO_STORE)],
        Json(json!({ "lastModified": ts })),
    )
        .into_response()
}

// ============================================================================
// Document Update
// ============================================================================

/// `POST /api/update-document` — validate, screen the HTML, then fully
/// replace the stored document with a server-stamped timestamp.
pub async fn update_document(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateRequest>,
) -> Response {
    let errors = validate::validate(&payload, state.config.access_code.as_deref());
    if !errors.is_empty() {
        return ApiError::ValidationFailed(errors).into_response();
    }

    let html = match validate::sanitize_html(payload.html.as_deref().unwrap_or_default()) {
        Ok(html) => html.to_string(),
        Err(reason) => return ApiError::UnsafeContent(reason).into_response(),
    };

    let Some(store) = state.kv() else {
        return ApiError::StorageUnavailable(
            "the key-value store could not be opened; check BANDEAU_DATA_DIR".to_string(),
        )
        .into_response();
    };

    // Validation already guaranteed these parse; the fallbacks are unreachable.
    let speed = payload
        .speed
        .as_ref()
        .and_then(validate::parse_speed)
        .unwrap_or(DEFAULT_SPEED as i64) as u32;
    let color = payload.color.unwrap_or_else(|| DEFAULT_COLOR.to_string());
    let direction = match payload.direction.as_deref() {
        Some("vertical") => Direction::Vertical,
        _ => Direction::Horizontal,
    };

    let candidate = BannerDocument {
        html,
        speed,
        color,
        direction,
        last_modified: None,
    };

    match document::write_document(store, candidate) {
        Ok(written) => {
            info!(last_modified = ?written.last_modified, "banner document updated");
            (
                [(header::CACHE_CONTROL, NO_STORE)],
                Json(json!({ "success": true, "message": "Data updated successfully" })),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "banner document write failed");
            ApiError::Internal(e.to_string()).into_response()
        }
    }
}

// ============================================================================
// Image Upload
// ============================================================================

/// `POST /api/upload-image` — multipart `file` + `accessCode`. Unlike the
/// update path, a bad code here is a distinct 403.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut access_code: Option<String> = None;
    let mut file: Option<(String, String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "failed to read multipart body");
                return ApiError::Internal(e.to_string()).into_response();
            }
        };
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((filename, content_type, bytes.to_vec())),
                    Err(e) => {
                        error!(error = %e, "failed to read uploaded file");
                        return ApiError::Internal(e.to_string()).into_response();
                    }
                }
            }
            Some("accessCode") => {
                if let Ok(text) = field.text().await {
                    access_code = Some(text);
                }
            }
            _ => {}
        }
    }

    let authorized = match (&access_code, &state.config.access_code) {
        (Some(code), Some(expected)) => validate::access_code_matches(code, expected),
        _ => false,
    };
    if !authorized {
        let detail = if access_code.is_none() {
            "missing code"
        } else {
            "incorrect code"
        };
        return ApiError::Forbidden(detail.to_string()).into_response();
    }

    let Some((original_name, content_type, bytes)) = file else {
        return ApiError::ValidationFailed(vec!["No file provided".to_string()]).into_response();
    };

    match upload::store_image(state.blobs.as_ref(), &original_name, &content_type, &bytes) {
        Ok(stored) => {
            info!(filename = %stored.filename, size = bytes.len(), "image uploaded");
            Json(json!({
                "success": true,
                "url": stored.url,
                "filename": stored.filename,
            }))
            .into_response()
        }
        Err(e) => e.into_response(),
    }
}

// ============================================================================
// Health
// ============================================================================

const HEALTH_PROBE_KEY: &str = "bandeau:health-check";

/// `GET /api/health` — key-value store diagnostics: a write/read/delete
/// round trip on a probe key, plus whether the main document key exists.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let mut diagnostics = json!({
        "timestamp": Utc::now(),
        "kvConfigured": state.kv().is_some(),
        "kvConnected": false,
        "mainKeyExists": false,
    });

    let Some(store) = state.kv() else {
        diagnostics["error"] = json!("key-value store not configured");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(diagnostics)).into_response();
    };

    let probe = json!({ "test": true, "timestamp": Utc::now().timestamp_millis() });
    let probe_bytes = probe.to_string().into_bytes();

    let connected = store.set(HEALTH_PROBE_KEY, &probe_bytes).is_ok()
        && matches!(store.get(HEALTH_PROBE_KEY), Ok(Some(read)) if read == probe_bytes)
        && store.delete(HEALTH_PROBE_KEY).is_ok();

    diagnostics["kvConnected"] = json!(connected);
    if let Ok(Some(_)) = store.get(document::DOCUMENT_KEY) {
        diagnostics["mainKeyExists"] = json!(true);
    }

    let status = if connected {
        StatusCode::OK
    } else {
        diagnostics["error"] = json!("key-value read/write probe failed");
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(diagnostics)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FsBlobStore, MemoryStore};
    use crate::BandeauConfig;
    use serde_json::Value;

    fn test_config() -> BandeauConfig {
        BandeauConfig {
            access_code: Some("s3cret".to_string()),
            data_dir: "unused".into(),
            uploads_dir: "unused".into(),
            public_base: "http://localhost:3000".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }

    fn test_state(with_store: bool) -> (Arc<AppState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::new(
            dir.path().join("uploads"),
            "http://localhost:3000".to_string(),
        )
        .unwrap();
        let kv: Option<Arc<dyn crate::storage::KeyValueStore>> = if with_store {
            Some(Arc::new(MemoryStore::new()))
        } else {
            None
        };
        (
            Arc::new(AppState::with_stores(test_config(), kv, Arc::new(blobs))),
            dir,
        )
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn valid_update() -> UpdateRequest {
        UpdateRequest {
            html: Some("<b>alert</b>".to_string()),
            speed: Some(json!(12)),
            color: Some("#112233".to_string()),
            direction: Some("vertical".to_string()),
            access_code: Some("s3cret".to_string()),
        }
    }

    #[tokio::test]
    async fn get_document_returns_defaults_with_200() {
        let (state, _dir) = test_state(false);
        let response = get_document(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            READ_CACHE
        );
        let body = body_json(response).await;
        assert_eq!(body["speed"], 5);
        assert_eq!(body["color"], "#FFFFFF");
        assert_eq!(body["direction"], "horizontal");
    }

    #[tokio::test]
    async fn check_updates_always_succeeds() {
        let (state, _dir) = test_state(false);
        let response = check_updates(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            NO_STORE
        );
        let body = body_json(response).await;
        assert!(body["lastModified"].is_string());
    }

    #[tokio::test]
    async fn update_then_read_reflects_new_document() {
        let (state, _dir) = test_state(true);
        let response = update_document(State(state.clone()), Json(valid_update())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);

        let body = body_json(get_document(State(state)).await).await;
        assert_eq!(body["html"], "<b>alert</b>");
        assert_eq!(body["speed"], 12);
        assert_eq!(body["direction"], "vertical");
        assert!(body["lastModified"].is_string());
    }

    #[tokio::test]
    async fn update_collects_all_validation_errors() {
        let (state, _dir) = test_state(true);
        let response =
            update_document(State(state), Json(UpdateRequest::default())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn update_with_wrong_code_is_400_not_403() {
        let (state, _dir) = test_state(true);
        let mut payload = valid_update();
        payload.access_code = Some("wrong".to_string());
        let response = update_document(State(state), Json(payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_rejects_unsafe_html_entirely() {
        let (state, _dir) = test_state(true);
        let mut payload = valid_update();
        payload.html = Some("<b>fine</b><script>alert(1)</script>".to_string());
        let response = update_document(State(state.clone()), Json(payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "HTML sanitization failed");

        // Nothing was written
        let body = body_json(get_document(State(state)).await).await;
        assert_eq!(body["speed"], 5);
    }

    #[tokio::test]
    async fn update_without_store_is_503() {
        let (state, _dir) = test_state(false);
        let response = update_document(State(state), Json(valid_update())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn malformed_multipart_body_is_500_not_403() {
        use axum::extract::FromRequest;

        let (state, _dir) = test_state(true);
        let request = axum::http::Request::builder()
            .method("POST")
            .header(
                header::CONTENT_TYPE,
                "multipart/form-data; boundary=BOUNDARY",
            )
            .body(axum::body::Body::from("not a multipart body"))
            .unwrap();
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let response = upload_image(State(state), multipart).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn method_fallbacks_name_the_allowed_verb() {
        let response = only_get().await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET");

        let response = only_post().await;
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "POST");
    }

    #[tokio::test]
    async fn health_reports_unconfigured_store() {
        let (state, _dir) = test_state(false);
        let response = health(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["kvConfigured"], false);
    }

    #[tokio::test]
    async fn health_round_trips_probe_key() {
        let (state, _dir) = test_state(true);
        let response = health(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["kvConnected"], true);
        assert_eq!(body["mainKeyExists"], false);
    }
}

//! Bandeau - shared scrolling announcement banner server.
//!
//! This is the main entry point for the banner web server. The application
//! is organized into the following modules:
//!
//! - `models`: the banner document and wire payloads
//! - `storage`: key-value and blob storage adapters
//! - `document`: read/write service over the stored document
//! - `validate`: payload validation and deny-list HTML screening
//! - `upload`: image upload validation and naming
//! - `handlers`: HTTP route handlers
//! - `client`: the polling/debouncing sync controller for displays

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing_subscriber::EnvFilter;

use bandeau::{handlers, AppState, BandeauConfig};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bandeau=info,tower_http=warn")),
        )
        .init();

    let config = BandeauConfig::from_env();
    let bind_addr = config.bind_addr.clone();
    let uploads_dir = config.uploads_dir.clone();
    let auth_enabled = config.access_code.is_some();
    let state = Arc::new(AppState::new(config));

    let app = Router::new()
        .route(
            "/api/get-document",
            get(handlers::get_document).fallback(handlers::only_get),
        )
        .route(
            "/api/check-updates",
            get(handlers::check_updates).fallback(handlers::only_get),
        )
        .route(
            "/api/update-document",
            post(handlers::update_document).fallback(handlers::only_post),
        )
        .route(
            "/api/upload-image",
            post(handlers::upload_image).fallback(handlers::only_post),
        )
        .route(
            "/api/health",
            get(handlers::health).fallback(handlers::only_get),
        )
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        // Uploads are capped at 2 MiB by validation; the transport limit is
        // higher so oversized files get a 400 with details instead of a 413.
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind server address");

    tracing::info!(addr = %bind_addr, "bandeau server running");
    if auth_enabled {
        tracing::info!("write access: ENABLED (BANDEAU_ACCESS_CODE set)");
    } else {
        tracing::warn!("write access: DISABLED (set BANDEAU_ACCESS_CODE to allow editing)");
    }

    axum::serve(listener, app).await.expect("Server error");
}

//! Client-side sync controller: the display/editor logic that keeps a
//! banner view in step with the server.
//!
//! This is the Rust rendition of the browser controller. Instead of
//! module-level globals it owns an explicit session context, and instead of
//! touching a DOM it emits [`SyncEvent`]s over a channel; the embedding view
//! applies them. Concurrency is cooperative: the poll loop, the per-field
//! debounce timers and explicit submits only ever touch controller-local
//! state plus stateless HTTP calls, so there is nothing to lock beyond the
//! small shared variables.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::models::{BannerDocument, Direction, UpdateRequest};

// ============================================================================
// Errors and Events
// ============================================================================

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a server answer (network, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),
    /// The server answered with a structured rejection.
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

/// What the controller tells its embedding view.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Apply every field of this document to the live view.
    DocumentApplied(BannerDocument),
    /// A push reached the server and was accepted.
    PushSaved,
    /// The edit was kept locally only; no write request was sent.
    PushLocalOnly,
    /// A push reached the server but was refused, or the transport failed.
    /// The edit survives in the local cache; retrying is up to the editor.
    PushFailed(String),
    /// An update check failed. Transient; polling continues.
    SyncError(String),
}

/// Fields whose edits are debounced independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditField {
    Speed,
    Color,
}

// ============================================================================
// API Seam
// ============================================================================

/// The three server calls the controller makes. Behind a trait so tests can
/// count calls and inject failures.
#[async_trait]
pub trait BannerApi: Send + Sync {
    async fn fetch_document(&self) -> Result<BannerDocument, ClientError>;
    async fn check_updates(&self) -> Result<DateTime<Utc>, ClientError>;
    async fn push_update(&self, request: &UpdateRequest) -> Result<(), ClientError>;
}

/// Production transport over reqwest.
pub struct HttpBannerApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBannerApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckUpdatesResponse {
    last_modified: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[async_trait]
impl BannerApi for HttpBannerApi {
    async fn fetch_document(&self) -> Result<BannerDocument, ClientError> {
        let response = self.http.get(self.url("/api/get-document")).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Rejected {
                status: response.status().as_u16(),
                message: format!("HTTP {}", response.status()),
            });
        }
        Ok(response.json().await?)
    }

    async fn check_updates(&self) -> Result<DateTime<Utc>, ClientError> {
        let response = self.http.get(self.url("/api/check-updates")).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Rejected {
                status: response.status().as_u16(),
                message: format!("HTTP {}", response.status()),
            });
        }
        Ok(response.json::<CheckUpdatesResponse>().await?.last_modified)
    }

    async fn push_update(&self, request: &UpdateRequest) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url("/api/update-document"))
            .json(request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Local Cache
// ============================================================================

/// Last-known copy of the document, mirrored locally. Used only as a
/// fallback when the read path fails; storing never fails from the caller's
/// point of view.
pub trait LocalCache: Send + Sync {
    fn load(&self) -> Option<BannerDocument>;
    fn store(&self, doc: &BannerDocument);
}

/// In-process cache, for tests and short-lived displays.
#[derive(Default)]
pub struct MemoryCache {
    doc: Mutex<Option<BannerDocument>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn load(&self) -> Option<BannerDocument> {
        self.doc.lock().unwrap().clone()
    }

    fn store(&self, doc: &BannerDocument) {
        *self.doc.lock().unwrap() = Some(doc.clone());
    }
}

/// JSON file on disk, the localStorage analogue for long-lived displays.
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl LocalCache for FileCache {
    fn load(&self) -> Option<BannerDocument> {
        let bytes = fs::read(&self.path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn store(&self, doc: &BannerDocument) {
        match serde_json::to_vec(doc) {
            Ok(bytes) => {
                if let Err(e) = fs::write(&self.path, bytes) {
                    warn!(error = %e, "local cache write failed");
                }
            }
            Err(e) => warn!(error = %e, "local cache serialization failed"),
        }
    }
}

// ============================================================================
// Sync Controller
// ============================================================================

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub poll_interval: Duration,
    pub debounce: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            debounce: Duration::from_secs(1),
        }
    }
}

/// A local edit of the banner, before it is pushed.
#[derive(Debug, Clone)]
pub struct BannerEdit {
    pub html: String,
    pub speed: u32,
    pub color: String,
    pub direction: Direction,
}

impl BannerEdit {
    fn into_document(self) -> BannerDocument {
        BannerDocument {
            html: self.html,
            speed: self.speed,
            color: self.color,
            direction: self.direction,
            last_modified: None,
        }
    }
}

struct ControllerInner {
    api: Arc<dyn BannerApi>,
    cache: Box<dyn LocalCache>,
    config: ClientConfig,
    access_code: Mutex<Option<String>>,
    last_known_modified: Mutex<Option<DateTime<Utc>>>,
    timers: Mutex<HashMap<EditField, JoinHandle<()>>>,
    events: UnboundedSender<SyncEvent>,
}

/// Owns the freshness state (`last_known_modified`), the editor session
/// (access code) and the per-field debounce timers. Clone-cheap; clones
/// share state, which is what the spawned timers rely on.
#[derive(Clone)]
pub struct SyncController {
    inner: Arc<ControllerInner>,
}

impl SyncController {
    pub fn new(
        api: Arc<dyn BannerApi>,
        cache: Box<dyn LocalCache>,
        config: ClientConfig,
    ) -> (Self, UnboundedReceiver<SyncEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            inner: Arc::new(ControllerInner {
                api,
                cache,
                config,
                access_code: Mutex::new(None),
                last_known_modified: Mutex::new(None),
                timers: Mutex::new(HashMap::new()),
                events,
            }),
        };
        (controller, receiver)
    }

    /// Entering the editor records the shared access code; leaving clears it.
    pub fn set_access_code(&self, code: Option<String>) {
        *self.inner.access_code.lock().unwrap() = code;
    }

    pub fn last_known_modified(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_known_modified.lock().unwrap()
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.inner.events.send(event);
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    /// Load the document at startup: server first, local cache on failure,
    /// built-in defaults when both are empty.
    pub async fn initial_load(&self) {
        match self.inner.api.fetch_document().await {
            Ok(doc) => {
                self.inner.cache.store(&doc);
                *self.inner.last_known_modified.lock().unwrap() = doc.last_modified;
                self.emit(SyncEvent::DocumentApplied(doc));
            }
            Err(e) => {
                warn!(error = %e, "initial load failed, falling back to local cache");
                match self.inner.cache.load() {
                    Some(doc) => {
                        *self.inner.last_known_modified.lock().unwrap() = doc.last_modified;
                        self.emit(SyncEvent::DocumentApplied(doc));
                    }
                    None => {
                        self.emit(SyncEvent::DocumentApplied(BannerDocument::default_document()));
                    }
                }
            }
        }
    }

    /// One polling step: compare the server timestamp with the last known
    /// one and re-fetch the full document only when they differ.
    pub async fn poll_once(&self) {
        let ts = match self.inner.api.check_updates().await {
            Ok(ts) => ts,
            Err(e) => {
                self.emit(SyncEvent::SyncError(e.to_string()));
                return;
            }
        };

        let unchanged = {
            let last = self.inner.last_known_modified.lock().unwrap();
            *last == Some(ts)
        };
        if unchanged {
            return;
        }

        match self.inner.api.fetch_document().await {
            Ok(doc) => {
                self.inner.cache.store(&doc);
                *self.inner.last_known_modified.lock().unwrap() = Some(ts);
                self.emit(SyncEvent::DocumentApplied(doc));
            }
            Err(e) => self.emit(SyncEvent::SyncError(e.to_string())),
        }
    }

    /// Spawn the polling loop. Errors surface as `SyncError` events; the
    /// loop itself never stops.
    pub fn spawn_polling(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(controller.inner.config.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await; // the first tick completes immediately
            loop {
                interval.tick().await;
                controller.poll_once().await;
            }
        })
    }

    // ------------------------------------------------------------------
    // Write side
    // ------------------------------------------------------------------

    /// Explicit "update"/"reset": cache synchronously, push immediately,
    /// bypassing any pending debounce.
    pub async fn submit(&self, edit: BannerEdit) {
        self.inner.cache.store(&edit.clone().into_document());
        self.push_now(edit).await;
    }

    /// Slider/picker edit: cache synchronously, then push after the
    /// debounce window. A newer edit on the same field cancels the pending
    /// timer, so only the most recent value is ever sent.
    pub fn queue_edit(&self, field: EditField, edit: BannerEdit) {
        self.inner.cache.store(&edit.clone().into_document());

        if self.inner.access_code.lock().unwrap().is_none() {
            self.emit(SyncEvent::PushLocalOnly);
            return;
        }

        let controller = self.clone();
        let delay = self.inner.config.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.push_now(edit).await;
        });

        let mut timers = self.inner.timers.lock().unwrap();
        if let Some(previous) = timers.insert(field, handle) {
            previous.abort();
        }
    }

    /// Push an edit to the server. Without an access code the edit stays
    /// local: no write request is sent at all.
    async fn push_now(&self, edit: BannerEdit) {
        let code = self.inner.access_code.lock().unwrap().clone();
        let Some(code) = code else {
            self.emit(SyncEvent::PushLocalOnly);
            return;
        };

        let direction = match edit.direction {
            Direction::Horizontal => "horizontal",
            Direction::Vertical => "vertical",
        };
        let request = UpdateRequest {
            html: Some(edit.html),
            speed: Some(json!(edit.speed)),
            color: Some(edit.color),
            direction: Some(direction.to_string()),
            access_code: Some(code),
        };

        match self.inner.api.push_update(&request).await {
            Ok(()) => self.emit(SyncEvent::PushSaved),
            Err(e) => self.emit(SyncEvent::PushFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;

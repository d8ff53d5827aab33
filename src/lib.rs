//! Bandeau library - shared scrolling announcement banner service.
//!
//! This module provides public access to all the application's modules
//! for testing purposes and for embedding the sync client elsewhere.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

pub mod client;
pub mod document;
pub mod error;
pub mod handlers;
pub mod models;
pub mod storage;
pub mod upload;
pub mod validate;

use storage::{BlobStore, FsBlobStore, KeyValueStore, SledStore};

// Re-export commonly used types
pub use client::{
    BannerApi, BannerEdit, ClientConfig, ClientError, EditField, FileCache, HttpBannerApi,
    LocalCache, MemoryCache, SyncController, SyncEvent,
};
pub use document::{last_modified, read_document, write_document, DOCUMENT_KEY};
pub use error::ApiError;
pub use models::{default_html, BannerDocument, Direction, UpdateRequest};
pub use storage::{MemoryStore, StoreError};
pub use upload::{generate_filename, store_image, validate_file, StoredImage};
pub use validate::{access_code_matches, sanitize_html, validate};

// ============================================================================
// Configuration
// ============================================================================

pub const DEFAULT_DB_PATH: &str = ".bandeau_db";
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Runtime configuration, read from environment variables at startup.
///
/// `BANDEAU_ACCESS_CODE` is the shared secret gating writes; when unset,
/// every write is rejected (viewing still works). The storage paths and the
/// public URL used for upload links have sensible local defaults.
#[derive(Debug, Clone)]
pub struct BandeauConfig {
    pub access_code: Option<String>,
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub public_base: String,
    pub bind_addr: String,
}

impl BandeauConfig {
    pub fn from_env() -> Self {
        let bind_addr =
            env::var("BANDEAU_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let public_base =
            env::var("BANDEAU_PUBLIC_URL").unwrap_or_else(|_| format!("http://{}", bind_addr));

        Self {
            access_code: env::var("BANDEAU_ACCESS_CODE").ok().filter(|c| !c.is_empty()),
            data_dir: PathBuf::from(
                env::var("BANDEAU_DATA_DIR").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()),
            ),
            uploads_dir: PathBuf::from(
                env::var("BANDEAU_UPLOADS_DIR")
                    .unwrap_or_else(|_| DEFAULT_UPLOADS_DIR.to_string()),
            ),
            public_base,
            bind_addr,
        }
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Shared state of the request handlers. All server-side operations are
/// stateless: the key-value store is the single source of truth and the
/// handlers keep no mutable state of their own.
#[derive(Clone)]
pub struct AppState {
    pub config: BandeauConfig,
    kv: Option<Arc<dyn KeyValueStore>>,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    /// Open the configured stores. A key-value store that fails to open
    /// leaves the app serving defaults on reads and 503 on writes, mirroring
    /// how a missing storage credential behaves.
    pub fn new(config: BandeauConfig) -> Self {
        let kv: Option<Arc<dyn KeyValueStore>> = match SledStore::open(&config.data_dir) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(error = %e, path = %config.data_dir.display(),
                    "failed to open key-value store, writes will be unavailable");
                None
            }
        };

        let blobs = FsBlobStore::new(config.uploads_dir.clone(), config.public_base.clone())
            .expect("Failed to create uploads directory");

        Self {
            config,
            kv,
            blobs: Arc::new(blobs),
        }
    }

    /// Assemble state from explicit stores; used by tests and embedders.
    pub fn with_stores(
        config: BandeauConfig,
        kv: Option<Arc<dyn KeyValueStore>>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self { config, kv, blobs }
    }

    pub fn kv(&self) -> Option<&dyn KeyValueStore> {
        self.kv.as_deref()
    }
}

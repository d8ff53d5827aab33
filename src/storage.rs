//! Storage adapters: the key-value store holding the banner document and
//! the blob store holding uploaded images.
//!
//! Both are thin wrappers over external storage with no logic of their own.
//! They sit behind traits so the backing store is selected by configuration
//! (sled on disk in production, in-memory in tests) rather than by parallel
//! code paths.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key-value store error: {0}")]
    Kv(#[from] sled::Error),
    #[error("blob store I/O error: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Key-Value Store
// ============================================================================

/// Atomic get/set/delete over opaque byte values. Concurrent writers are
/// arbitrated by plain overwrite: the last `set` to land wins entirely.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Production backend: a sled tree on disk.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: &PathBuf) -> Result<Self, StoreError> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.db.insert(key, value)?;
        self.db.flush()?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.db.remove(key)?;
        self.db.flush()?;
        Ok(())
    }
}

/// In-memory backend for tests and for running without persistence.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

// ============================================================================
// Blob Store
// ============================================================================

/// Public-read blob hosting for uploaded images. Returns the public URL of
/// the stored blob.
pub trait BlobStore: Send + Sync {
    fn put(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, StoreError>;
}

/// Filesystem-backed blob store. Files land in the uploads directory, which
/// the server exposes under `/uploads/`.
pub struct FsBlobStore {
    dir: PathBuf,
    public_base: String,
}

impl FsBlobStore {
    pub fn new(dir: PathBuf, public_base: String) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, public_base })
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, name: &str, bytes: &[u8], _content_type: &str) -> Result<String, StoreError> {
        // The content type is re-derived from the extension when served;
        // nothing extra to record on the filesystem.
        fs::write(self.dir.join(name), bytes)?;
        Ok(format!(
            "{}/uploads/{}",
            self.public_base.trim_end_matches('/'),
            name
        ))
    }
}

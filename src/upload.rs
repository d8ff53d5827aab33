//! Image upload service: validates uploaded files and stores them in the
//! blob store under a collision-free generated name.

use rand::{distributions::Alphanumeric, Rng};

use crate::error::ApiError;
use crate::storage::BlobStore;

/// Accepted image MIME types.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Maximum upload size: 2 MiB.
pub const MAX_FILE_SIZE: usize = 2 * 1024 * 1024;

/// Outcome of a successful upload.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub url: String,
    pub filename: String,
}

// ============================================================================
// Validation
// ============================================================================

/// Validate an uploaded file, collecting every violation.
pub fn validate_file(content_type: &str, size: usize) -> Vec<String> {
    let mut errors = Vec::new();

    if !ALLOWED_MIME_TYPES.contains(&content_type) {
        errors.push(format!(
            "File type not allowed. Accepted types: {}",
            ALLOWED_MIME_TYPES.join(", ")
        ));
    }

    if size > MAX_FILE_SIZE {
        errors.push(format!(
            "File too large. Maximum size: {}MB",
            MAX_FILE_SIZE / 1024 / 1024
        ));
    }

    if size == 0 {
        errors.push("No file provided".to_string());
    }

    errors
}

// ============================================================================
// Filename Generation
// ============================================================================

/// Extension derived from the MIME type, falling back to the original
/// filename's extension when the type is unrecognized.
fn extension_for(content_type: &str, original_name: &str) -> String {
    if content_type.contains("jpeg") || content_type.contains("jpg") {
        ".jpg".to_string()
    } else if content_type.contains("png") {
        ".png".to_string()
    } else if content_type.contains("gif") {
        ".gif".to_string()
    } else if content_type.contains("webp") {
        ".webp".to_string()
    } else {
        match original_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => format!(".{}", ext),
            _ => String::new(),
        }
    }
}

/// Compose a unique blob name as `bandeau-<timestamp>-<random token><ext>`.
/// Timestamp plus random token, never a counter, so concurrent uploads
/// cannot collide.
pub fn generate_filename(original_name: &str, content_type: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(13)
        .map(char::from)
        .collect();
    format!(
        "bandeau-{}-{}{}",
        timestamp,
        token.to_lowercase(),
        extension_for(content_type, original_name)
    )
}

// ============================================================================
// Store
// ============================================================================

/// Validate and store an uploaded image, returning its public URL and the
/// generated filename. Access-code checking happens in the handler, before
/// any of this runs.
pub fn store_image(
    blobs: &dyn BlobStore,
    original_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> Result<StoredImage, ApiError> {
    let errors = validate_file(content_type, bytes.len());
    if !errors.is_empty() {
        return Err(ApiError::ValidationFailed(errors));
    }

    let filename = generate_filename(original_name, content_type);
    let url = blobs
        .put(&filename, bytes, content_type)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(StoredImage { url, filename })
}

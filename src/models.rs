//! Data models for the banner service.
//!
//! The whole application revolves around a single persisted entity, the
//! [`BannerDocument`]: the HTML content of the scrolling banner plus its
//! presentation settings. Everything else here is wire-format plumbing for
//! the update endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Defaults
// ============================================================================

/// Blue checkmark rendered inline in the default banner content.
pub const CHECKMARK_SVG: &str = r#"<svg class="blue-check-svg" viewBox="0 0 24 24"><path d="M9 16.17L4.83 12l-1.42 1.41L9 19 21 7l-1.41-1.41z"/></svg>"#;

pub const DEFAULT_SPEED: u32 = 5;
pub const DEFAULT_COLOR: &str = "#FFFFFF";

/// Default banner content shown when no document has ever been saved.
pub fn default_html() -> String {
    format!(
        "{check} Engin : <span class=\"status-red\">néant</span><br><br>\
         {check} Rue barrée : <span class=\"status-yellow\">néant</span><br><br>\
         {check} Divers : <span class=\"status-blue\">néant</span><br><br>\
         {check} Manoeuvre: néant<br><br>\
         {check} Sport:<br><br>\
         {check} Merci de votre coopération",
        check = CHECKMARK_SVG
    )
}

// ============================================================================
// Banner Document
// ============================================================================

/// Scroll direction of the banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Horizontal,
    Vertical,
}

/// The single shared record of scrolling content and presentation settings.
///
/// Exactly one document exists at a time, stored under a fixed key. Every
/// successful write fully replaces it; `last_modified` is stamped server-side
/// and is the sole basis for client change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerDocument {
    pub html: String,
    pub speed: u32,
    pub color: String,
    #[serde(default)]
    pub direction: Direction,
    /// RFC 3339 timestamp of the last successful write. `None` only for the
    /// built-in default document. Old records persisted the same field as
    /// `updatedAt`.
    #[serde(default, alias = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl BannerDocument {
    /// The hardcoded fallback returned whenever no document exists or the
    /// stored value cannot be read. Never persisted implicitly.
    pub fn default_document() -> Self {
        Self {
            html: default_html(),
            speed: DEFAULT_SPEED,
            color: DEFAULT_COLOR.to_string(),
            direction: Direction::Horizontal,
            last_modified: None,
        }
    }
}

// ============================================================================
// Update Payload
// ============================================================================

/// Incoming body of the update endpoint, before validation.
///
/// All fields are optional at the wire level so that the validator can
/// report every missing field at once instead of failing on the first.
/// `speed` is kept as a raw JSON value because editors historically sent it
/// both as a number and as a numeric string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateRequest {
    pub html: Option<String>,
    pub speed: Option<serde_json::Value>,
    pub color: Option<String>,
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_document_matches_reference_values() {
        let doc = BannerDocument::default_document();
        assert_eq!(doc.speed, 5);
        assert_eq!(doc.color, "#FFFFFF");
        assert_eq!(doc.direction, Direction::Horizontal);
        assert!(doc.last_modified.is_none());
        assert!(doc.html.contains("blue-check-svg"));
    }

    #[test]
    fn document_serializes_camel_case() {
        let mut doc = BannerDocument::default_document();
        doc.last_modified = Some(Utc::now());
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("lastModified").is_some());
        assert_eq!(json["direction"], "horizontal");
    }

    #[test]
    fn document_accepts_legacy_updated_at_field() {
        let json = r##"{"html":"<b>x</b>","speed":10,"color":"#00FF00","updatedAt":"2024-01-02T03:04:05Z"}"##;
        let doc: BannerDocument = serde_json::from_str(json).unwrap();
        assert!(doc.last_modified.is_some());
        assert_eq!(doc.direction, Direction::Horizontal);
    }

    #[test]
    fn update_request_tolerates_missing_fields() {
        let req: UpdateRequest = serde_json::from_str("{}").unwrap();
        assert!(req.html.is_none());
        assert!(req.speed.is_none());
        assert!(req.access_code.is_none());
    }
}

//! Payload validation and HTML screening for the update path.
//!
//! Validation collects every violation instead of short-circuiting, so the
//! editor sees all problems at once. The HTML screen is a deny-list: input
//! containing any dangerous pattern is rejected entirely, everything else
//! passes through byte-for-byte unmodified. It deliberately does not strip
//! or rewrite anything.

use std::sync::OnceLock;

use regex::Regex;
use subtle::ConstantTimeEq;

use crate::models::UpdateRequest;

pub const MAX_HTML_LEN: usize = 50_000;
pub const SPEED_MIN: i64 = 3;
pub const SPEED_MAX: i64 = 60;

fn color_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap())
}

/// Patterns that reject the whole payload when found anywhere in the HTML.
fn dangerous_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)<script",
            r"(?i)javascript:",
            r"(?i)on\w+\s*=",
            r"(?i)<iframe",
            r"(?i)<object",
            r"(?i)<embed",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

// ============================================================================
// Field Validation
// ============================================================================

/// `speed` historically arrives both as a JSON number and as a numeric
/// string; accept either. Fractional values truncate toward zero, the way
/// editors that ran the value through an integer parse always behaved.
pub fn parse_speed(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

/// Validate an update payload against the configured access code.
/// Returns the full list of violations; an empty list means valid.
///
/// A wrong or missing access code is reported here as a plain validation
/// error — the update path has no separate auth layer. (The upload path is
/// different; it returns 403, see `upload.rs`.)
pub fn validate(payload: &UpdateRequest, expected_code: Option<&str>) -> Vec<String> {
    let mut errors = Vec::new();

    match &payload.html {
        None => errors.push("The html field is required and must be a string".to_string()),
        Some(html) if html.is_empty() => {
            errors.push("The html field is required and must be a string".to_string())
        }
        Some(html) if html.chars().count() > MAX_HTML_LEN => errors.push(format!(
            "The HTML content is too long (max {} characters)",
            MAX_HTML_LEN
        )),
        Some(_) => {}
    }

    match &payload.speed {
        None => errors.push("The speed field is required".to_string()),
        Some(value) => match parse_speed(value) {
            Some(speed) if (SPEED_MIN..=SPEED_MAX).contains(&speed) => {}
            _ => errors.push(format!(
                "The speed must be a number between {} and {} seconds",
                SPEED_MIN, SPEED_MAX
            )),
        },
    }

    match &payload.color {
        None => errors.push("The color field is required and must be a string".to_string()),
        Some(color) if !color_regex().is_match(color) => {
            errors.push("The color must be in hexadecimal format (#RRGGBB)".to_string())
        }
        Some(_) => {}
    }

    if let Some(direction) = &payload.direction {
        if direction != "horizontal" && direction != "vertical" {
            errors.push("The direction must be 'horizontal' or 'vertical'".to_string());
        }
    }

    match &payload.access_code {
        None => errors.push("The access code is required".to_string()),
        Some(code) => {
            let matches = expected_code
                .map(|expected| access_code_matches(code, expected))
                .unwrap_or(false);
            if !matches {
                errors.push("Incorrect access code".to_string());
            }
        }
    }

    errors
}

/// Constant-time comparison of the shared access code.
pub fn access_code_matches(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        return false;
    }
    provided.ct_eq(expected).unwrap_u8() == 1
}

// ============================================================================
// HTML Screening
// ============================================================================

/// Deny-list screen over banner HTML. Either the whole string passes through
/// unchanged or it is rejected entirely; nothing is ever stripped.
pub fn sanitize_html(html: &str) -> Result<&str, String> {
    for pattern in dangerous_patterns() {
        if pattern.is_match(html) {
            return Err("Disallowed HTML content detected".to_string());
        }
    }
    Ok(html)
}

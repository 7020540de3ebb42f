//! JSON extraction from model output
//!
//! Vision models frequently wrap JSON answers in markdown code fences and
//! surrounding prose. This module centralizes the cleanup so every pipeline
//! stage shares one failure mode: a typed error, never a panic.

use thiserror::Error;

/// Why a model response could not be read as JSON
#[derive(Debug, Error)]
pub enum JsonExtractError {
    #[error("no JSON found in model output")]
    Empty,
    #[error("invalid JSON in model output: {0}")]
    Parse(String),
}

/// Extract a JSON value from possibly-fenced model output.
///
/// Strips literal ```` ```json ```` and ```` ``` ```` markers anywhere in the
/// text and trims whitespace before parsing. Content outside the fences is
/// tolerated only when the fences are present; otherwise the whole trimmed
/// text must parse.
pub fn extract_json(raw: &str) -> Result<serde_json::Value, JsonExtractError> {
    let candidate = strip_fences(raw);
    if candidate.is_empty() {
        return Err(JsonExtractError::Empty);
    }
    serde_json::from_str(&candidate).map_err(|e| JsonExtractError::Parse(e.to_string()))
}

/// Remove markdown code-fence delimiters, keeping the fenced body when a
/// complete ```` ```json ... ``` ```` block exists
fn strip_fences(raw: &str) -> String {
    if let Some(start) = raw.find("```json") {
        let body_start = start + "```json".len();
        if let Some(end) = raw[body_start..].find("```") {
            return raw[body_start..body_start + end].trim().to_string();
        }
    }
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Coerce a boolean-like JSON value.
///
/// Accepts native booleans, the strings "true"/"yes"/"1" (case-insensitive,
/// anything else is false), and numbers (non-zero is true). Returns `None`
/// for shapes with no boolean reading (arrays, objects, null).
pub fn coerce_bool(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::String(s) => Some(matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "1"
        )),
        serde_json::Value::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        _ => None,
    }
}

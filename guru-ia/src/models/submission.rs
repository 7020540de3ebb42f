//! Submission request/acknowledgment types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// POST /boom_guru request body
///
/// Immutable once accepted; owned exclusively by one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Source image location
    pub image_url: String,
    /// Caller-side image identifier, echoed in the callback
    pub image_id: String,
    /// Machine serial number
    pub serial_number: String,
    #[serde(default)]
    pub form_id: Option<String>,
    #[serde(default)]
    pub question_id: Option<String>,
    /// Callback target for the asynchronous result
    pub webhook_url: String,
    /// Requested answer language code (en, tr, ru, ka, az, kk, ky)
    pub language: String,
}

/// POST /boom_guru acknowledgment, returned before any analysis work starts
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeAccepted {
    pub session_id: Uuid,
    pub image_id: String,
    pub serial_number: String,
    pub form_id: Option<String>,
    pub question_id: Option<String>,
    pub webhook_url: String,
    pub language: String,
    pub status: String,
}

impl AnalyzeAccepted {
    pub fn new(session_id: Uuid, request: &AnalyzeRequest) -> Self {
        Self {
            session_id,
            image_id: request.image_id.clone(),
            serial_number: request.serial_number.clone(),
            form_id: request.form_id.clone(),
            question_id: request.question_id.clone(),
            webhook_url: request.webhook_url.clone(),
            language: request.language.clone(),
            status: "processing".to_string(),
        }
    }
}

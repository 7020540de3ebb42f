//! Analysis outcome and callback wire types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AnalyzeRequest;

/// Image category decided by the dispatch stage
///
/// Determined once per session; the authenticity gate may override it to
/// `Other`, after which it is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    WorkingMachine,
    ErrorCode,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::WorkingMachine => "working_machine",
            Category::ErrorCode => "error_code",
            Category::Other => "other",
        }
    }

    /// Parse a dispatcher-provided category string
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "working_machine" => Some(Category::WorkingMachine),
            "error_code" => Some(Category::ErrorCode),
            "other" => Some(Category::Other),
            _ => None,
        }
    }

    /// Whether this category goes through part classification
    pub fn classifies_parts(&self) -> bool {
        matches!(self, Category::WorkingMachine | Category::ErrorCode)
    }
}

/// Terminal session status reported in the callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Done,
    Failed,
}

/// One extracted error code entry
///
/// Unknown `type` values and extra fields from the model pass through
/// untouched; only `name` is filled in by reference lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    #[serde(default)]
    pub code: String,
    #[serde(rename = "type", default)]
    pub code_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Successful pipeline output, before status tagging
#[derive(Debug, Clone)]
pub struct Analysis {
    pub category: Category,
    pub answer: String,
    pub part_categories: Vec<String>,
}

/// Terminal artifact of one session
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub category: Option<Category>,
    pub answer: String,
    pub part_categories: Vec<String>,
    pub status: AnalysisStatus,
}

impl AnalysisResult {
    pub fn done(analysis: Analysis) -> Self {
        Self {
            category: Some(analysis.category),
            answer: analysis.answer,
            part_categories: analysis.part_categories,
            status: AnalysisStatus::Done,
        }
    }

    pub fn failed(message: String) -> Self {
        Self {
            category: None,
            answer: message,
            part_categories: Vec::new(),
            status: AnalysisStatus::Failed,
        }
    }
}

/// Callback wire payload; shape must not change without coordinating with
/// the webhook consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub session_id: Uuid,
    pub image_id: String,
    pub serial_number: String,
    pub form_id: Option<String>,
    pub question_id: Option<String>,
    pub answer: String,
    pub status: AnalysisStatus,
    pub part_categories: Vec<String>,
}

impl CallbackPayload {
    pub fn new(session_id: Uuid, request: &AnalyzeRequest, result: &AnalysisResult) -> Self {
        Self {
            session_id,
            image_id: request.image_id.clone(),
            serial_number: request.serial_number.clone(),
            form_id: request.form_id.clone(),
            question_id: request.question_id.clone(),
            answer: result.answer.clone(),
            status: result.status,
            part_categories: result.part_categories.clone(),
        }
    }
}

//! Data models for guru-ia

mod analysis;
mod submission;

pub use analysis::{
    Analysis, AnalysisResult, AnalysisStatus, CallbackPayload, Category, ErrorEntry,
};
pub use submission::{AnalyzeAccepted, AnalyzeRequest};

/// Map a submission language code to the language name used in prompts.
///
/// Unknown codes fall back to English.
pub fn prompt_language(code: &str) -> &'static str {
    match code {
        "en" => "English",
        "tr" => "Türkçe",
        "ru" => "Russian",
        "ka" => "Georgian",
        "az" => "Azerbaijani",
        "kk" => "Kazakh",
        "ky" => "Kyrgyz",
        _ => "English",
    }
}

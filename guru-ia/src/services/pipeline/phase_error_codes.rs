//! Error-code extraction, enrichment, and humanization
//!
//! Three steps: extract structured codes from the fault screen, enrich them
//! with reference-table descriptions, then hand the enriched JSON to a
//! final prompt that writes the operator-facing answer in the requested
//! language.

use uuid::Uuid;

use super::{ClassificationPipeline, PipelineError};
use crate::models::ErrorEntry;
use crate::services::model_gateway::{ChatMessage, ContentBlock, DEFAULT_TEMPERATURE};
use crate::utils::json_extract::extract_json;

/// Fixed user turn for the humanizer call; the enriched codes travel in the
/// system prompt
const HUMANIZER_USER_TURN: &str =
    "Please generate a response based on the provided error codes.";

impl ClassificationPipeline {
    /// Full error-code branch, returning the final free-text answer
    pub(super) async fn analyze_error_codes(
        &self,
        session_id: Uuid,
        image: &str,
        language_name: &str,
    ) -> Result<String, PipelineError> {
        let prompt = self
            .prompts
            .resolve("error_codes", &[("language_name", language_name)])?;
        let messages = vec![
            ChatMessage::system(prompt),
            ChatMessage::user_blocks(vec![ContentBlock::image(image)]),
        ];

        let response = self
            .model
            .chat(session_id, &messages, DEFAULT_TEMPERATURE)
            .await?;

        // Malformed extraction output degrades to "no codes found" — the
        // humanizer still runs and can describe the screen in general terms.
        let (mut errors, additional_info) = match extract_json(&response) {
            Ok(value) => {
                let errors: Vec<ErrorEntry> = value
                    .get("errors")
                    .and_then(|v| v.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| serde_json::from_value(item.clone()).ok())
                            .collect()
                    })
                    .unwrap_or_default();
                let additional_info = value
                    .get("additional_info")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                (errors, additional_info)
            }
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    error = %e,
                    "Failed to decode error-codes response"
                );
                (Vec::new(), String::new())
            }
        };

        tracing::info!(
            session_id = %session_id,
            count = errors.len(),
            "Extracted error codes"
        );

        for entry in &mut errors {
            self.enrich_entry(entry);
        }

        let final_json = serde_json::json!({
            "errors": errors,
            "additional_info": additional_info,
        })
        .to_string();

        let humanizer_prompt = self.prompts.resolve(
            "error_codes_prompt",
            &[
                ("final_json_str", final_json.as_str()),
                ("target_language", language_name),
            ],
        )?;
        let humanizer_messages = vec![
            ChatMessage::system(humanizer_prompt),
            ChatMessage::user_text(HUMANIZER_USER_TURN),
        ];

        let answer = self
            .model
            .chat(session_id, &humanizer_messages, DEFAULT_TEMPERATURE)
            .await?;
        Ok(answer)
    }

    /// Fill the entry's `name` from the reference tables according to its
    /// declared code type. Unknown types pass through unenriched.
    fn enrich_entry(&self, entry: &mut ErrorEntry) {
        match entry.code_type.as_str() {
            "CID-FMI" => entry.name = Some(self.reference.describe_cid_fmi(&entry.code)),
            "EID" => entry.name = Some(self.reference.describe_eid(&entry.code)),
            _ => {}
        }
    }
}

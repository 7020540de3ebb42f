//! Dispatch and authenticity stages
//!
//! Dispatch buckets the image into {working_machine, error_code, other};
//! the authenticity gate can demote a working-machine photo to `other` when
//! the model judges it synthetic (a screenshot, a rendering, a photo of a
//! photo).

use uuid::Uuid;

use super::{ClassificationPipeline, PipelineError};
use crate::models::Category;
use crate::services::model_gateway::{ChatMessage, ContentBlock, DEFAULT_TEMPERATURE};
use crate::utils::json_extract::{coerce_bool, extract_json};

impl ClassificationPipeline {
    /// First-stage classification.
    ///
    /// An unreadable or unrecognized dispatcher answer defaults to
    /// `working_machine` — documented policy: a broken classifier must not
    /// reject genuine machine photos.
    pub(super) async fn dispatch(
        &self,
        session_id: Uuid,
        image: &str,
    ) -> Result<Category, PipelineError> {
        let prompt = self.prompts.resolve("dispatcher", &[])?;
        let messages = vec![
            ChatMessage::system(prompt),
            ChatMessage::user_blocks(vec![ContentBlock::image(image)]),
        ];

        let response = self
            .model
            .chat(session_id, &messages, DEFAULT_TEMPERATURE)
            .await?;

        let category = match extract_json(&response) {
            Ok(value) => value
                .get("category")
                .and_then(|v| v.as_str())
                .and_then(Category::parse)
                .unwrap_or_else(|| {
                    tracing::warn!(
                        session_id = %session_id,
                        "Dispatcher answer carried no known category; defaulting to working_machine"
                    );
                    Category::WorkingMachine
                }),
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    error = %e,
                    "Failed to decode dispatcher response; defaulting to working_machine"
                );
                Category::WorkingMachine
            }
        };

        tracing::info!(
            session_id = %session_id,
            category = category.as_str(),
            "Predicted category"
        );
        Ok(category)
    }

    /// Authenticity gate.
    ///
    /// Fail-open on every failure mode (call error, unreadable answer,
    /// absent field): an unverifiable photo is treated as real. This is a
    /// product policy choice, not an engineering default.
    pub(super) async fn is_real_photo(&self, session_id: Uuid, image: &str) -> bool {
        let prompt = match self.prompts.resolve("authenticity", &[]) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Authenticity prompt unavailable");
                return true;
            }
        };

        let messages = vec![
            ChatMessage::system(prompt),
            ChatMessage::user_blocks(vec![ContentBlock::image(image)]),
        ];

        let response = match self
            .model
            .chat(session_id, &messages, DEFAULT_TEMPERATURE)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "Authenticity check failed; treating photo as real"
                );
                return true;
            }
        };

        let verdict = extract_json(&response)
            .ok()
            .and_then(|value| value.get("is_real_photo").and_then(coerce_bool));

        match verdict {
            Some(is_real) => is_real,
            None => {
                tracing::warn!(
                    session_id = %session_id,
                    "Authenticity answer carried no is_real_photo field; treating photo as real"
                );
                true
            }
        }
    }

    /// Single-call general analysis for working-machine images
    pub(super) async fn analyze_working_machine(
        &self,
        session_id: Uuid,
        image: &str,
        language_name: &str,
    ) -> Result<String, PipelineError> {
        let prompt = self
            .prompts
            .resolve("general", &[("language_name", language_name)])?;
        let messages = vec![
            ChatMessage::system(prompt),
            ChatMessage::user_blocks(vec![ContentBlock::image(image)]),
        ];

        let answer = self
            .model
            .chat(session_id, &messages, DEFAULT_TEMPERATURE)
            .await?;
        Ok(answer)
    }
}

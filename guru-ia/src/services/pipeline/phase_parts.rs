//! Part classification with multi-attempt consensus
//!
//! A single low-temperature call still misreads parts often enough to
//! matter, so the stage runs a fixed number of independent attempts and
//! unions every validated answer, first-seen order preserved. A failed or
//! unreadable attempt is skipped; it never blocks the others.

use serde_json::Value;
use uuid::Uuid;

use super::{ClassificationPipeline, PART_CLASSIFIER_ATTEMPTS, PART_CLASSIFIER_TEMPERATURE};
use crate::services::model_gateway::{ChatMessage, ContentBlock};
use crate::utils::json_extract::extract_json;

/// Closed set of part categories the classifier may emit; anything else is
/// dropped as noise
pub const VALID_PART_CATEGORIES: &[&str] = &[
    "ATASMANLAR-DIGER",
    "ATASMANLAR-KIRICI",
    "ATASMANLAR-KOVA",
    "HIDROLIK PARÇALARI - HORTUM / RAKOR",
    "HIDROLIK PARÇALARI - SILINDIR",
    "ELEKTIRIK VE DIĞER PARÇALAR",
    "SASE PARCALARI",
    "YÜRÜYÜŞ TAKIMI",
    "LASTIK",
];

impl ClassificationPipeline {
    /// Run the part-classification attempts and aggregate their answers.
    ///
    /// Infallible by contract: every failure mode inside an attempt is
    /// logged and skipped, and an empty aggregate is a valid outcome.
    pub(super) async fn classify_parts(
        &self,
        session_id: Uuid,
        image: &str,
        answer: &str,
    ) -> Vec<String> {
        let prompt = match self.prompts.resolve("part_classifier", &[]) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Part classifier prompt unavailable");
                return Vec::new();
            }
        };

        let context = format!(
            "The following analysis captures the extracted findings about the machine or fault:\n{}",
            answer
        );

        let mut aggregated: Vec<String> = Vec::new();

        for attempt in 1..=PART_CLASSIFIER_ATTEMPTS {
            let messages = vec![
                ChatMessage::system(prompt.clone()),
                ChatMessage::user_blocks(vec![
                    ContentBlock::image(image),
                    ContentBlock::text(context.clone()),
                ]),
            ];

            let response = match self
                .model
                .chat(session_id, &messages, PART_CLASSIFIER_TEMPERATURE)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(
                        session_id = %session_id,
                        attempt,
                        error = %e,
                        "Part classifier call failed"
                    );
                    continue;
                }
            };

            let value = match extract_json(&response) {
                Ok(value) => value,
                Err(e) => {
                    tracing::error!(
                        session_id = %session_id,
                        attempt,
                        error = %e,
                        "Failed to decode part classifier response"
                    );
                    continue;
                }
            };

            // A bare string is accepted as a one-element list; any other
            // non-list shape is discarded.
            let candidates = match value.get("part_categories").cloned() {
                None => Vec::new(),
                Some(Value::String(single)) => vec![Value::String(single)],
                Some(Value::Array(items)) => items,
                Some(other) => {
                    tracing::warn!(
                        session_id = %session_id,
                        attempt,
                        shape = ?other,
                        "Unexpected part_categories shape"
                    );
                    continue;
                }
            };

            for candidate in candidates {
                let Some(text) = candidate.as_str() else {
                    tracing::warn!(
                        session_id = %session_id,
                        candidate = ?candidate,
                        "Discarding non-string part category"
                    );
                    continue;
                };
                let normalized = text.trim();
                if normalized.is_empty() {
                    continue;
                }
                if !VALID_PART_CATEGORIES.contains(&normalized) {
                    tracing::warn!(
                        session_id = %session_id,
                        category = normalized,
                        "Invalid part category"
                    );
                    continue;
                }
                if !aggregated.iter().any(|existing| existing == normalized) {
                    aggregated.push(normalized.to_string());
                }
            }
        }

        if aggregated.is_empty() {
            tracing::info!(session_id = %session_id, "No part categories predicted");
        } else {
            tracing::info!(
                session_id = %session_id,
                part_categories = ?aggregated,
                "Predicted part categories"
            );
        }

        aggregated
    }
}

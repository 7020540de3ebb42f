//! Classification pipeline
//!
//! Coordinates one session's analysis through its stages:
//!
//! Dispatching → Other (terminal)
//!            → Authenticity → Other (terminal)
//!            → ErrorCodeAnalysis → PartClassification (terminal)
//!            → WorkingMachineAnalysis → PartClassification (terminal)
//!
//! Each stage is handled by a dedicated `phase_*` module. The pipeline
//! returns `Result<Analysis, PipelineError>`; the job worker maps `Err` to a
//! failed session. No error escapes past this boundary.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{prompt_language, Analysis, AnalyzeRequest, Category};
use crate::services::model_gateway::{ChatModel, ModelError};
use crate::services::prompt_library::PromptLibrary;
use crate::services::reference::ReferenceTables;

mod phase_dispatch;
mod phase_error_codes;
mod phase_parts;

pub use phase_parts::VALID_PART_CATEGORIES;

/// Answer returned without any further model calls when the image is not a
/// machine or an error screen (fixed Turkish copy, owned by the product team)
pub const REJECTION_MESSAGE: &str = "Yüklenen görsel bir iş makinesi veya hata kodu olarak tanımlanamadı. Lütfen bir makine ya da hata ekranı içeren alakalı bir görsel yükleyin.";

/// Number of independent part-classification attempts per session
pub const PART_CLASSIFIER_ATTEMPTS: usize = 3;

/// Temperature override for part classification, lower than the analysis
/// default to stabilize the voting
pub const PART_CLASSIFIER_TEMPERATURE: f32 = 0.2;

/// User agent sent when fetching submission images
const IMAGE_FETCH_USER_AGENT: &str = "Mozilla/5.0";

/// Bound on a single image download
const IMAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fatal pipeline failures; the display string becomes the callback answer
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Image download failed: HTTP {0}")]
    ImageStatus(u16),

    #[error("Image download failed: {0}")]
    ImageFetch(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("{0}")]
    Config(String),
}

impl From<guru_common::Error> for PipelineError {
    fn from(err: guru_common::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

/// Per-session classification pipeline
///
/// Holds only shared immutable collaborators; safe to share across
/// concurrently running sessions.
pub struct ClassificationPipeline {
    model: Arc<dyn ChatModel>,
    prompts: Arc<PromptLibrary>,
    reference: Arc<ReferenceTables>,
    http_client: reqwest::Client,
}

impl ClassificationPipeline {
    pub fn new(
        model: Arc<dyn ChatModel>,
        prompts: Arc<PromptLibrary>,
        reference: Arc<ReferenceTables>,
    ) -> guru_common::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(IMAGE_FETCH_USER_AGENT)
            .timeout(IMAGE_FETCH_TIMEOUT)
            .build()
            .map_err(|e| {
                guru_common::Error::Internal(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            model,
            prompts,
            reference,
            http_client,
        })
    }

    /// Run one session to its terminal analysis.
    ///
    /// Stages are strictly sequential: each depends on the previous stage's
    /// output. Only part classification tolerates per-attempt failures.
    pub async fn run(
        &self,
        session_id: Uuid,
        submission: &AnalyzeRequest,
    ) -> Result<Analysis, PipelineError> {
        let language_name = prompt_language(&submission.language);

        let image = self.acquire_image(session_id, &submission.image_url).await?;

        let mut category = self.dispatch(session_id, &image).await?;

        // Authenticity gate applies only to images dispatched as working
        // machines; a photo judged synthetic is handled as off-topic.
        if category == Category::WorkingMachine && !self.is_real_photo(session_id, &image).await {
            tracing::info!(
                session_id = %session_id,
                "Photo judged not real; overriding category to other"
            );
            category = Category::Other;
        }

        let answer = match category {
            Category::Other => REJECTION_MESSAGE.to_string(),
            Category::ErrorCode => {
                self.analyze_error_codes(session_id, &image, language_name)
                    .await?
            }
            Category::WorkingMachine => {
                self.analyze_working_machine(session_id, &image, language_name)
                    .await?
            }
        };

        let part_categories = if category.classifies_parts() {
            self.classify_parts(session_id, &image, &answer).await
        } else {
            Vec::new()
        };

        Ok(Analysis {
            category,
            answer,
            part_categories,
        })
    }

    /// Fetch the submission image and encode it as a data URI.
    ///
    /// Any failure here is fatal for the session: without the image there is
    /// nothing to classify.
    async fn acquire_image(
        &self,
        session_id: Uuid,
        image_url: &str,
    ) -> Result<String, PipelineError> {
        let response = self
            .http_client
            .get(image_url)
            .send()
            .await
            .map_err(|e| PipelineError::ImageFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::ImageStatus(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::ImageFetch(e.to_string()))?;

        tracing::info!(
            session_id = %session_id,
            bytes = bytes.len(),
            "Image downloaded successfully"
        );

        let encoded = general_purpose::STANDARD.encode(&bytes);
        Ok(format!(
            "data:image/{};base64,{}",
            image_media_subtype(image_url),
            encoded
        ))
    }
}

/// Derive the data-URI media subtype from the URL extension, query string
/// stripped
fn image_media_subtype(image_url: &str) -> String {
    image_url
        .rsplit('.')
        .next()
        .unwrap_or("jpeg")
        .split('?')
        .next()
        .unwrap_or("jpeg")
        .to_ascii_lowercase()
}

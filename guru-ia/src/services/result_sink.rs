//! Result persistence and webhook delivery
//!
//! The two side effects are deliberately independent: a failed INSERT must
//! never suppress the callback, and a failed callback is terminal (no
//! retry, no dead-letter queue). Both outcomes are logged per session.

use sqlx::SqlitePool;
use std::time::Duration;
use uuid::Uuid;

use guru_common::config::CallbackConfig;

use crate::models::{AnalysisResult, AnalysisStatus, AnalyzeRequest, CallbackPayload};

/// Provider-specific API-key header expected by the webhook consumer
const CALLBACK_API_KEY_HEADER: &str = "Boom724ExternalApiKey";

/// Fixed language header; callback metadata is always English regardless of
/// the requested answer language
const CALLBACK_LANGUAGE: &str = "en";

/// Bound on a single callback delivery
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Terminal stage of every session: persist the record, then call back
pub struct ResultSink {
    db: SqlitePool,
    http_client: reqwest::Client,
    api_key: String,
}

impl ResultSink {
    pub fn new(db: SqlitePool, config: CallbackConfig) -> guru_common::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(CALLBACK_TIMEOUT)
            .build()
            .map_err(|e| {
                guru_common::Error::Internal(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            db,
            http_client,
            api_key: config.api_key,
        })
    }

    /// Deliver one session's terminal result.
    ///
    /// Invariant: exactly one callback attempt per session, for both done
    /// and failed outcomes. This function never returns an error.
    pub async fn deliver(
        &self,
        session_id: Uuid,
        submission: &AnalyzeRequest,
        result: &AnalysisResult,
    ) {
        // Failed sessions carry no analysis record; only the callback
        // reports them.
        if result.status == AnalysisStatus::Done {
            self.persist(session_id, submission, result).await;
        }

        self.send_callback(session_id, submission, result).await;
    }

    /// Best-effort INSERT of the terminal record
    async fn persist(
        &self,
        session_id: Uuid,
        submission: &AnalyzeRequest,
        result: &AnalysisResult,
    ) {
        if let Err(e) =
            crate::db::analyses::insert_analysis(&self.db, session_id, submission, result).await
        {
            tracing::error!(
                session_id = %session_id,
                error = %e,
                "Failed to persist machine analysis"
            );
        }
    }

    /// Single callback attempt; non-2xx and transport failures are logged
    /// and dropped
    async fn send_callback(
        &self,
        session_id: Uuid,
        submission: &AnalyzeRequest,
        result: &AnalysisResult,
    ) {
        let payload = CallbackPayload::new(session_id, submission, result);

        let response = self
            .http_client
            .post(&submission.webhook_url)
            .header(CALLBACK_API_KEY_HEADER, &self.api_key)
            .header("Language", CALLBACK_LANGUAGE)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                tracing::info!(session_id = %session_id, "Callback sent successfully");
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                tracing::error!(
                    session_id = %session_id,
                    status,
                    body = %body,
                    "Callback failed"
                );
            }
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    error = %e,
                    "Failed to send callback"
                );
            }
        }
    }
}

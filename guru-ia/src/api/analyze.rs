//! Image analysis submission endpoint
//!
//! POST /boom_guru accepts a submission, schedules the classification
//! pipeline, and acknowledges immediately with a session id. The analysis
//! outcome arrives later at the submission's webhook.

use axum::{extract::State, routing::post, Json, Router};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{AnalyzeAccepted, AnalyzeRequest};
use crate::services::job_queue::AnalysisJob;
use crate::AppState;

/// POST /boom_guru
///
/// Always returns 200 with status "processing" on well-formed input; the
/// acknowledgment is sent before the pipeline produces any result.
pub async fn analyze_image(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeAccepted>> {
    if request.image_url.trim().is_empty() {
        return Err(ApiError::BadRequest("image_url must not be empty".to_string()));
    }
    if request.webhook_url.trim().is_empty() {
        return Err(ApiError::BadRequest("webhook_url must not be empty".to_string()));
    }

    let session_id = Uuid::new_v4();
    let response = AnalyzeAccepted::new(session_id, &request);

    tracing::info!(
        session_id = %session_id,
        image_id = %request.image_id,
        serial_number = %request.serial_number,
        form_id = ?request.form_id,
        question_id = ?request.question_id,
        image_url = %request.image_url,
        "Received image analysis request"
    );

    let job = AnalysisJob {
        session_id,
        submission: request,
    };
    state
        .jobs
        .enqueue(job)
        .await
        .map_err(|_| ApiError::Internal("Analysis queue is closed".to_string()))?;

    Ok(Json(response))
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/boom_guru", post(analyze_image))
}

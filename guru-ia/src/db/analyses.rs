//! Machine analysis record persistence

use sqlx::SqlitePool;
use uuid::Uuid;

use guru_common::Result;

use crate::models::{AnalysisResult, AnalyzeRequest};

/// Insert the terminal record for one session.
///
/// One bound-parameter INSERT; the caller decides what a failure means
/// (for the result sink it is log-and-continue).
pub async fn insert_analysis(
    pool: &SqlitePool,
    session_id: Uuid,
    submission: &AnalyzeRequest,
    result: &AnalysisResult,
) -> Result<()> {
    let session_id = session_id.to_string();
    let category = result.category.map(|c| c.as_str().to_string());
    let part_category = result.part_categories.join(", ");
    let created_at = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO machine_analyses (
            session_id, serial_number, image_id, form_id, question_id,
            category, part_category, final_answer, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session_id)
    .bind(&submission.serial_number)
    .bind(&submission.image_id)
    .bind(&submission.form_id)
    .bind(&submission.question_id)
    .bind(&category)
    .bind(&part_category)
    .bind(&result.answer)
    .bind(&created_at)
    .execute(pool)
    .await
    .map_err(guru_common::Error::Database)?;

    Ok(())
}

//! End-to-end workflow tests: enqueue → worker → persistence → callback
//!
//! Exercises the full background path with a scripted model, a local image
//! server, and a local webhook receiver. The properties under test are the
//! session invariants: exactly one callback attempt per session, correct
//! wire payload for both outcomes, and persistence that never interferes
//! with delivery.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use sqlx::Row;
use uuid::Uuid;

use common::{
    callback_receiver, sample_submission, serve_image, test_pipeline, wait_until, ScriptedModel,
};
use guru_ia::services::job_queue::{self, AnalysisJob, JobQueue};
use guru_ia::services::pipeline::REJECTION_MESSAGE;
use guru_ia::services::ResultSink;

async fn test_pool() -> sqlx::SqlitePool {
    // Single connection: every pooled connection to :memory: would
    // otherwise get its own empty database
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    guru_ia::db::init_tables(&pool).await.expect("init tables");
    pool
}

fn test_sink(pool: sqlx::SqlitePool) -> Arc<ResultSink> {
    let config = guru_common::config::CallbackConfig {
        api_key: "test-key".to_string(),
    };
    Arc::new(ResultSink::new(pool, config).unwrap())
}

#[tokio::test]
async fn successful_session_delivers_exactly_one_callback() {
    let image_url = serve_image(StatusCode::OK).await;
    let (webhook_url, callbacks) = callback_receiver().await;
    let pool = test_pool().await;

    // Dispatch straight to "other": one model call, fixed answer
    let model = ScriptedModel::new(vec![Ok(r#"{"category": "other"}"#.to_string())]);
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(test_pipeline(model, dir.path()));
    let sink = test_sink(pool.clone());

    let (jobs, job_rx) = JobQueue::new(8);
    let last_error = Arc::new(tokio::sync::RwLock::new(None));
    job_queue::spawn_workers(2, job_rx, pipeline, sink, last_error.clone());

    let session_id = Uuid::new_v4();
    let submission = sample_submission(&image_url, &webhook_url);
    jobs.enqueue(AnalysisJob {
        session_id,
        submission,
    })
    .await
    .expect("enqueue");

    let delivered = wait_until(Duration::from_secs(5), || {
        !callbacks.lock().unwrap().is_empty()
    })
    .await;
    assert!(delivered, "callback never arrived");

    // Give any erroneous second attempt time to show up
    tokio::time::sleep(Duration::from_millis(200)).await;
    let (body, headers) = {
        let received = callbacks.lock().unwrap();
        assert_eq!(received.len(), 1);
        (received[0].body.clone(), received[0].headers.clone())
    };

    assert_eq!(body["session_id"], session_id.to_string());
    assert_eq!(body["image_id"], "img-1");
    assert_eq!(body["serial_number"], "SN-42");
    assert_eq!(body["form_id"], "form-7");
    assert_eq!(body["question_id"], "q-3");
    assert_eq!(body["status"], "done");
    assert_eq!(body["answer"], REJECTION_MESSAGE);
    assert_eq!(body["part_categories"], serde_json::json!([]));

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    assert_eq!(header("Boom724ExternalApiKey"), "test-key");
    assert_eq!(header("Language"), "en");
    assert_eq!(header("content-type"), "application/json");

    // Session persisted with its category and empty part list
    let row = sqlx::query("SELECT category, part_category FROM machine_analyses WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_one(&pool)
        .await
        .expect("record persisted");
    let category: String = row.get("category");
    assert_eq!(category, "other");

    assert!(last_error.read().await.is_none());
}

#[tokio::test]
async fn failed_session_still_calls_back() {
    let image_url = serve_image(StatusCode::NOT_FOUND).await;
    let (webhook_url, callbacks) = callback_receiver().await;
    let pool = test_pool().await;

    let model = ScriptedModel::new(vec![]);
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(test_pipeline(model, dir.path()));
    let sink = test_sink(pool.clone());

    let (jobs, job_rx) = JobQueue::new(8);
    let last_error = Arc::new(tokio::sync::RwLock::new(None));
    job_queue::spawn_workers(1, job_rx, pipeline, sink, last_error.clone());

    let session_id = Uuid::new_v4();
    jobs.enqueue(AnalysisJob {
        session_id,
        submission: sample_submission(&image_url, &webhook_url),
    })
    .await
    .expect("enqueue");

    let delivered = wait_until(Duration::from_secs(5), || {
        !callbacks.lock().unwrap().is_empty()
    })
    .await;
    assert!(delivered, "failure callback never arrived");

    let body = {
        let received = callbacks.lock().unwrap();
        assert_eq!(received.len(), 1);
        received[0].body.clone()
    };
    assert_eq!(body["status"], "failed");
    assert!(body["answer"]
        .as_str()
        .unwrap()
        .contains("Image download failed"));
    assert_eq!(body["part_categories"], serde_json::json!([]));

    // Failed sessions are not persisted; the callback is the only record
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM machine_analyses")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);

    let last = last_error.read().await.clone();
    assert!(last.unwrap().contains("Image download failed"));
}

#[tokio::test]
async fn persistence_failure_does_not_suppress_callback() {
    let image_url = serve_image(StatusCode::OK).await;
    let (webhook_url, callbacks) = callback_receiver().await;

    // Pool without the machine_analyses table: every INSERT fails
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let model = ScriptedModel::new(vec![Ok(r#"{"category": "other"}"#.to_string())]);
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(test_pipeline(model, dir.path()));
    let sink = test_sink(pool);

    let (jobs, job_rx) = JobQueue::new(8);
    let last_error = Arc::new(tokio::sync::RwLock::new(None));
    job_queue::spawn_workers(1, job_rx, pipeline, sink, last_error);

    jobs.enqueue(AnalysisJob {
        session_id: Uuid::new_v4(),
        submission: sample_submission(&image_url, &webhook_url),
    })
    .await
    .expect("enqueue");

    let delivered = wait_until(Duration::from_secs(5), || {
        !callbacks.lock().unwrap().is_empty()
    })
    .await;
    assert!(delivered, "callback suppressed by persistence failure");
    assert_eq!(callbacks.lock().unwrap()[0].body["status"], "done");
}

#[tokio::test]
async fn unreachable_webhook_is_contained() {
    let image_url = serve_image(StatusCode::OK).await;
    let pool = test_pool().await;

    let model = ScriptedModel::new(vec![Ok(r#"{"category": "other"}"#.to_string())]);
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(test_pipeline(model, dir.path()));
    let sink = test_sink(pool.clone());

    let (jobs, job_rx) = JobQueue::new(8);
    let last_error = Arc::new(tokio::sync::RwLock::new(None));
    job_queue::spawn_workers(1, job_rx, pipeline, sink, last_error);

    let session_id = Uuid::new_v4();
    // Nothing listens on this port; delivery fails, session still terminates
    jobs.enqueue(AnalysisJob {
        session_id,
        submission: sample_submission(&image_url, "http://127.0.0.1:9/webhook-receiver"),
    })
    .await
    .expect("enqueue");

    // The record lands even though the callback could not be delivered
    let session = session_id.to_string();
    let mut found = false;
    for _ in 0..100 {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM machine_analyses WHERE session_id = ?")
                .bind(&session)
                .fetch_one(&pool)
                .await
                .unwrap();
        if count == 1 {
            found = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(found, "session did not reach its terminal state");
}

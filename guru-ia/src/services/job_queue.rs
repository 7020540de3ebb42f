//! Analysis job queue and worker pool
//!
//! The front door enqueues one job per accepted submission and returns its
//! acknowledgment immediately; a fixed pool of workers drains the queue and
//! runs sessions to completion. Ordering contract: the acknowledgment is
//! observable before or concurrently with the session's callback, never
//! after it. No cancellation is exposed — a dequeued session always reaches
//! its terminal state unless the process dies.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use uuid::Uuid;

use crate::models::{AnalysisResult, AnalyzeRequest};
use crate::services::pipeline::ClassificationPipeline;
use crate::services::result_sink::ResultSink;

/// Bound on pending submissions; enqueue backpressures beyond this
pub const QUEUE_CAPACITY: usize = 64;

/// One scheduled pipeline run
#[derive(Debug)]
pub struct AnalysisJob {
    pub session_id: Uuid,
    pub submission: AnalyzeRequest,
}

/// Cloneable producer handle held in application state
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<AnalysisJob>,
}

impl JobQueue {
    /// Create the queue, returning the consumer end for the worker pool
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AnalysisJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue a job; fails only when the worker pool is gone
    pub async fn enqueue(&self, job: AnalysisJob) -> Result<(), AnalysisJob> {
        self.tx.send(job).await.map_err(|e| e.0)
    }
}

/// Spawn the worker pool draining `rx`.
///
/// Workers share the single receiver behind a mutex; each dequeued job runs
/// on exactly one worker. `last_error` feeds the health endpoint.
pub fn spawn_workers(
    count: usize,
    rx: mpsc::Receiver<AnalysisJob>,
    pipeline: Arc<ClassificationPipeline>,
    sink: Arc<ResultSink>,
    last_error: Arc<RwLock<Option<String>>>,
) {
    let rx = Arc::new(Mutex::new(rx));
    for worker_id in 0..count {
        let rx = rx.clone();
        let pipeline = pipeline.clone();
        let sink = sink.clone();
        let last_error = last_error.clone();
        tokio::spawn(async move {
            tracing::info!(worker_id, "Analysis worker started");
            loop {
                // Hold the lock only while waiting for the next job so a
                // long-running session never blocks the other workers.
                let job = { rx.lock().await.recv().await };
                match job {
                    Some(job) => {
                        process_job(worker_id, job, &pipeline, &sink, &last_error).await
                    }
                    None => {
                        tracing::info!(worker_id, "Job queue closed; worker exiting");
                        break;
                    }
                }
            }
        });
    }
}

/// Run one session to its terminal state.
///
/// Error containment boundary: the pipeline result and both sink side
/// effects are fully handled here; nothing can take down the worker.
async fn process_job(
    worker_id: usize,
    job: AnalysisJob,
    pipeline: &ClassificationPipeline,
    sink: &ResultSink,
    last_error: &RwLock<Option<String>>,
) {
    let AnalysisJob {
        session_id,
        submission,
    } = job;

    tracing::info!(
        worker_id,
        session_id = %session_id,
        image_id = %submission.image_id,
        "Analysis session started"
    );

    let result = match pipeline.run(session_id, &submission).await {
        Ok(analysis) => AnalysisResult::done(analysis),
        Err(e) => {
            let message = e.to_string();
            tracing::error!(
                session_id = %session_id,
                error = %message,
                "Analysis session failed"
            );
            *last_error.write().await = Some(message.clone());
            AnalysisResult::failed(message)
        }
    };

    sink.deliver(session_id, &submission, &result).await;

    tracing::info!(
        worker_id,
        session_id = %session_id,
        status = ?result.status,
        "Analysis session completed"
    );
}

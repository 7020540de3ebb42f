//! Shared helpers for guru-ia integration tests

// Each test binary compiles this module separately and uses a different
// subset of it.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use guru_ia::models::AnalyzeRequest;
use guru_ia::services::model_gateway::{ChatMessage, ChatModel, MessageContent, ModelError};
use guru_ia::services::{ClassificationPipeline, PromptLibrary, ReferenceTables};

/// One recorded model invocation
pub struct RecordedCall {
    pub temperature: f32,
    pub system_prompt: String,
}

/// Chat model returning pre-scripted responses in order
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
    pub calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<String, ModelError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn system_prompt_of_call(&self, index: usize) -> String {
        self.calls.lock().unwrap()[index].system_prompt.clone()
    }

    pub fn temperature_of_call(&self, index: usize) -> f32 {
        self.calls.lock().unwrap()[index].temperature
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(
        &self,
        _session_id: Uuid,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, ModelError> {
        let system_prompt = messages
            .first()
            .map(|m| match &m.content {
                MessageContent::Text(text) => text.clone(),
                MessageContent::Blocks(_) => String::new(),
            })
            .unwrap_or_default();

        self.calls.lock().unwrap().push(RecordedCall {
            temperature,
            system_prompt,
        });

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Network("no scripted response left".to_string())))
    }
}

/// Write the minimal prompt template set into `dir`
pub fn write_test_prompts(dir: &Path) {
    let templates = [
        ("dispatcher", "Classify the image."),
        ("authenticity", "Decide whether the photo is real."),
        ("error_codes", "Extract fault codes. Answer in {language_name}."),
        (
            "error_codes_prompt",
            "Explain these fault codes in {target_language}: {final_json_str}",
        ),
        ("general", "Describe the machine in {language_name}."),
        ("part_classifier", "Pick part categories."),
    ];
    for (name, body) in templates {
        std::fs::write(dir.join(format!("{}.md", name)), body).unwrap();
    }
}

/// Reference tables with a couple of known codes
pub fn test_reference_tables() -> ReferenceTables {
    let cid = HashMap::from([(100_i64, "Engine Oil Pressure Sensor".to_string())]);
    let fmi = HashMap::from([(2_i64, "Data erratic, intermittent, or incorrect".to_string())]);
    let eid = HashMap::from([(172_i64, "High Air Filter Restriction".to_string())]);
    ReferenceTables::new(cid, fmi, eid)
}

/// Build a pipeline around a scripted model, writing prompts into `dir`
pub fn test_pipeline(model: Arc<ScriptedModel>, prompts_dir: &Path) -> ClassificationPipeline {
    write_test_prompts(prompts_dir);
    let prompts = Arc::new(PromptLibrary::load(prompts_dir).unwrap());
    let reference = Arc::new(test_reference_tables());
    ClassificationPipeline::new(model, prompts, reference).unwrap()
}

/// Serve a fake JPEG at `/machine.jpg` on an ephemeral port, returning its URL
pub async fn serve_image(status: StatusCode) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().route(
        "/machine.jpg",
        get(move || async move { (status, b"\xff\xd8fake-jpeg-bytes".to_vec()) }),
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/machine.jpg", addr)
}

/// One callback received by the test webhook
pub struct ReceivedCallback {
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

pub type CallbackStore = Arc<Mutex<Vec<ReceivedCallback>>>;

/// Spin up a webhook receiver on an ephemeral port
pub async fn callback_receiver() -> (String, CallbackStore) {
    let store: CallbackStore = Arc::new(Mutex::new(Vec::new()));

    async fn receive(
        State(store): State<CallbackStore>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        store.lock().unwrap().push(ReceivedCallback { headers, body });
        StatusCode::OK
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/webhook-receiver", post(receive))
        .with_state(store.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/webhook-receiver", addr), store)
}

/// Poll until `predicate` holds or the timeout elapses
pub async fn wait_until(timeout: Duration, predicate: impl Fn() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// A well-formed submission pointing at the given image and webhook URLs
pub fn sample_submission(image_url: &str, webhook_url: &str) -> AnalyzeRequest {
    serde_json::from_value(serde_json::json!({
        "image_url": image_url,
        "image_id": "img-1",
        "serial_number": "SN-42",
        "form_id": "form-7",
        "question_id": "q-3",
        "webhook_url": webhook_url,
        "language": "tr"
    }))
    .unwrap()
}

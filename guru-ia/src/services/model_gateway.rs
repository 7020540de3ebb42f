//! Model gateway for vision chat completions
//!
//! Wraps a single chat-completions call behind the [`ChatModel`] trait so the
//! pipeline can be exercised with scripted models in tests. The production
//! implementation targets an Azure OpenAI deployment.
//!
//! Retry policy is deliberately absent here: the pipeline decides which
//! stages tolerate a failed call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use guru_common::config::ModelConfig;

/// Request timeout for a single model call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Default sampling temperature for analysis calls
pub const DEFAULT_TEMPERATURE: f32 = 0.5;

/// Model gateway errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model call failed: {0}")]
    Network(String),

    #[error("Model API error {0}: {1}")]
    Api(u16, String),

    #[error("Model response malformed: {0}")]
    Malformed(String),
}

/// Message role in a chat exchange
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One content block inside a user message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Message content: plain text for system prompts, block list for user turns
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One role-tagged message
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn image(data_uri: impl Into<String>) -> Self {
        ContentBlock::ImageUrl {
            image_url: ImageUrl { url: data_uri.into() },
        }
    }
}

/// Seam between the pipeline and the model provider
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one chat completion request and return the raw answer text.
    ///
    /// Emits one structured log line per attempt, keyed by session id.
    async fn chat(
        &self,
        session_id: Uuid,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, ModelError>;
}

/// Chat-completions response (only the fields we read)
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Azure OpenAI chat-completions client
pub struct AzureChatModel {
    http_client: reqwest::Client,
    url: String,
    api_key: String,
    deployment: String,
}

impl AzureChatModel {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            config.endpoint, config.deployment, config.api_version
        );

        Ok(Self {
            http_client,
            url,
            api_key: config.api_key.clone(),
            deployment: config.deployment.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for AzureChatModel {
    async fn chat(
        &self,
        session_id: Uuid,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, ModelError> {
        let body = serde_json::json!({
            "model": self.deployment,
            "messages": messages,
            "temperature": temperature,
            "top_p": 1,
        });

        let response = self
            .http_client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(session_id = %session_id, error = %e, "Model call failed");
                ModelError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                session_id = %session_id,
                status = status.as_u16(),
                "Model call failed"
            );
            return Err(ModelError::Api(status.as_u16(), error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::Malformed("response carried no content".to_string()))?;

        tracing::info!(session_id = %session_id, "Model call successful");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_serializes_to_block_list() {
        let message = ChatMessage::user_blocks(vec![
            ContentBlock::image("data:image/jpeg;base64,AAAA"),
            ContentBlock::text("describe this"),
        ]);

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "image_url");
        assert_eq!(json["content"][0]["image_url"]["url"], "data:image/jpeg;base64,AAAA");
        assert_eq!(json["content"][1]["type"], "text");
        assert_eq!(json["content"][1]["text"], "describe this");
    }

    #[test]
    fn system_message_serializes_to_plain_string() {
        let message = ChatMessage::system("You are a dispatcher.");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "You are a dispatcher.");
    }

    #[test]
    fn client_builds_deployment_url() {
        let config = ModelConfig {
            endpoint: "https://res.openai.azure.com".to_string(),
            api_key: "k".to_string(),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-02-01".to_string(),
        };
        let client = AzureChatModel::new(&config).unwrap();
        assert_eq!(
            client.url,
            "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-01"
        );
    }
}

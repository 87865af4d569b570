//! Ollama provider implementation (`/api/chat`, non-streaming)

use super::types::{LlmRequest, LlmResponse, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Ollama endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama chat service for one local model
pub struct OllamaService {
    client: Client,
    model: String,
    endpoint: String,
}

impl OllamaService {
    pub fn new(base_url: &str, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            model: model.into(),
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
        }
    }

    fn translate_request(&self, request: &LlmRequest) -> OllamaRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if !request.system.is_empty() {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: request.system_text(),
            });
        }

        for msg in &request.messages {
            messages.push(OllamaMessage {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
            });
        }

        OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options: request.max_tokens.map(|n| OllamaOptions { num_predict: n }),
        }
    }

    fn normalize_response(body: &str) -> Result<LlmResponse, LlmError> {
        let resp: OllamaResponse = serde_json::from_str(body).map_err(|e| {
            tracing::debug!(body = %body, "Unparseable Ollama response");
            LlmError::malformed(format!("Failed to parse response: {e}"))
        })?;

        let message = resp
            .message
            .ok_or_else(|| LlmError::malformed("Response has no message"))?;

        Ok(LlmResponse {
            text: message.content,
            end_turn: resp.done,
            usage: Usage {
                input_tokens: resp.prompt_eval_count.unwrap_or(0),
                output_tokens: resp.eval_count.unwrap_or(0),
            },
        })
    }
}

#[async_trait]
impl LlmService for OllamaService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let ollama_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OllamaErrorResponse>(&body)
                .map_or(body, |err| err.error);
            return Err(LlmError::from_status(status.as_u16(), &message));
        }

        Self::normalize_response(&body)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

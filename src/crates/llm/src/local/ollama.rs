//! Ollama client implementation.
//!
//! Provides integration with Ollama, a popular local LLM runner, as the
//! local-provider counterpart to [`crate::remote::OpenAiClient`].
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::local::OllamaClient;
//! use llm::config::LocalLlmConfig;
//! use llm::chat::{ChatModel, ChatRequest, Message};
//!
//! let config = LocalLlmConfig::new("http://localhost:11434", "llama2");
//! let client = OllamaClient::new(config);
//! let response = client.chat(ChatRequest::new(vec![Message::human("Hello!")])).await?;
//! ```

use crate::chat::{ChatModel, ChatRequest, ChatResponse, Message, Role, StreamCallback};
use crate::config::LocalLlmConfig;
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Ollama client for local LLM inference.
#[derive(Clone)]
pub struct OllamaClient {
    config: LocalLlmConfig,
    client: Client,
}

impl OllamaClient {
    pub fn new(config: LocalLlmConfig) -> Self {
        let client = Client::builder().timeout(config.timeout).build().expect("failed to build HTTP client");
        Self { config, client }
    }

    /// Check whether the Ollama server is reachable.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        matches!(self.client.get(&url).send().await, Ok(response) if response.status().is_success())
    }

    fn convert_message(message: &Message) -> OllamaMessage {
        OllamaMessage {
            role: match message.role {
                Role::System => "system",
                Role::Human => "user",
                Role::Assistant => "assistant",
            }
            .to_string(),
            content: message.content.clone(),
        }
    }

    /// Ollama has no top-level stop-sequence field; it lives under `options`
    /// (spec §4.2, "Stop sequence"; §6, "a list of stop sequences").
    fn options(request: &ChatRequest) -> Option<OllamaOptions> {
        if request.stop.is_empty() {
            None
        } else {
            Some(OllamaOptions { stop: request.stop.clone() })
        }
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.config.base_url);
        let body = OllamaRequest {
            model: self.config.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            stream: false,
            options: Self::options(&request),
        };

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ProviderError(format!("ollama error {status}: {text}")));
        }

        let parsed: OllamaResponse = response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(ChatResponse { content: parsed.message.content })
    }

    async fn stream(&self, request: ChatRequest, callback: &(dyn StreamCallback + Send + Sync)) -> Result<()> {
        let url = format!("{}/api/chat", self.config.base_url);
        let body = OllamaRequest {
            model: self.config.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            stream: true,
            options: Self::options(&request),
        };

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                callback.on_error(&err.to_string());
                return Err(err.into());
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let error = LlmError::ProviderError(format!("ollama error {status}: {text}"));
            callback.on_error(&error.to_string());
            return Err(error);
        }

        let mut byte_stream = response.bytes_stream();
        let mut line_buffer = String::new();
        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    callback.on_error(&err.to_string());
                    return Err(err.into());
                }
            };
            line_buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = line_buffer.find('\n') {
                let line = line_buffer[..pos].trim().to_string();
                line_buffer.drain(..=pos);
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<OllamaResponse>(&line) {
                    Ok(parsed) => {
                        if !parsed.message.content.is_empty() {
                            callback.on_token(&parsed.message.content);
                        }
                        if parsed.done {
                            callback.on_end();
                            return Ok(());
                        }
                    }
                    Err(err) => {
                        callback.on_error(&err.to_string());
                        return Err(err.into());
                    }
                }
            }
        }
        callback.on_end();
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    stop: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
}

//! OpenAI-compatible remote client implementation.
//!
//! Targets the `/chat/completions` endpoint shape shared by OpenAI and most
//! OpenAI-compatible hosts (e.g. OpenRouter, local proxy servers). Supports
//! both the non-streaming call the joinner uses and the token-streaming call
//! the planner uses.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::remote::OpenAiClient;
//! use llm::config::RemoteLlmConfig;
//! use llm::chat::{ChatModel, ChatRequest, Message};
//!
//! let config = RemoteLlmConfig::from_env("OPENAI_API_KEY", "https://api.openai.com/v1", "gpt-4")?;
//! let client = OpenAiClient::new(config);
//! let response = client.chat(ChatRequest::new(vec![Message::human("Hello!")])).await?;
//! ```

use crate::chat::{ChatModel, ChatRequest, ChatResponse, Message, Role, StreamCallback};
use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible API client.
#[derive(Clone)]
pub struct OpenAiClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: RemoteLlmConfig) -> Self {
        let client = Client::builder().timeout(config.timeout).build().expect("failed to build HTTP client");
        Self { config, client }
    }

    fn convert_message(message: &Message) -> OpenAiMessage {
        OpenAiMessage {
            role: match message.role {
                Role::System => "system",
                Role::Human => "user",
                Role::Assistant => "assistant",
            }
            .to_string(),
            content: message.content.clone(),
        }
    }

    fn request_body(&self, request: &ChatRequest, stream: bool) -> OpenAiRequest {
        OpenAiRequest {
            model: self.config.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            temperature: request.temperature,
            stop: if request.stop.is_empty() { None } else { Some(request.stop.clone()) },
            stream,
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Authorization", format!("Bearer {}", self.config.api_key));
        match &self.config.organization {
            Some(org) => request.header("OpenAI-Organization", org),
            None => request,
        }
    }

    fn status_error(status: reqwest::StatusCode, body: String) -> LlmError {
        match status.as_u16() {
            401 => LlmError::AuthenticationError(body),
            429 => LlmError::RateLimitExceeded(body),
            _ => LlmError::ProviderError(format!("{status}: {body}")),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = self.request_body(&request, false);
        let response = self.authorized(self.client.post(&url).json(&body)).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, text));
        }

        let parsed: OpenAiResponse = response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(ChatResponse { content })
    }

    async fn stream(&self, request: ChatRequest, callback: &(dyn StreamCallback + Send + Sync)) -> Result<()> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = self.request_body(&request, true);
        let response = match self.authorized(self.client.post(&url).json(&body)).send().await {
            Ok(response) => response,
            Err(err) => {
                callback.on_error(&err.to_string());
                return Err(err.into());
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let error = Self::status_error(status, text);
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
                let Some(data) = line.strip_prefix("data:") else { continue };
                let data = data.trim();
                if data == "[DONE]" {
                    callback.on_end();
                    return Ok(());
                }
                match serde_json::from_str::<OpenAiStreamChunk>(data) {
                    Ok(parsed) => {
                        if let Some(token) = parsed.choices.first().and_then(|c| c.delta.content.clone()) {
                            callback.on_token(&token);
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
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_construction_does_not_panic() {
        let config = RemoteLlmConfig::new("test-key", "https://api.openai.com/v1", "gpt-4");
        let _client = OpenAiClient::new(config);
    }

    #[test]
    fn message_conversion_maps_roles() {
        let converted = OpenAiClient::convert_message(&Message::human("hi"));
        assert_eq!(converted.role, "user");
        assert_eq!(converted.content, "hi");
    }

    #[test]
    fn stream_chunk_with_no_content_delta_is_parseable() {
        let parsed: OpenAiStreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{}}]}"#).unwrap();
        assert!(parsed.choices[0].delta.content.is_none());
    }
}

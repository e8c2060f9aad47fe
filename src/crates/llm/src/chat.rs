//! The planner/joinner LLM contract consumed by the orchestration core
//! (spec §6, "Planner LLM contract"): a streaming chat call used by the
//! planner and a non-streaming completion call used by the joinner.

use crate::error::Result;
use async_trait::async_trait;

/// Who authored a message in a chat-style prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    Human,
    Assistant,
}

/// One message in a `ChatRequest`.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self { role: Role::Human, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A chat call: the message pair plus any stop sequences.
///
/// The core always sends exactly a system and a human message, but the type
/// stays a plain `Vec` rather than a fixed pair so a replan round's
/// accumulated context can be appended as additional human turns without a
/// shape change.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Stop sequences, e.g. `<END_OF_PLAN>` for the planner call.
    pub stop: Vec<String>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages, stop: Vec::new(), temperature: None }
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// The result of a non-streaming completion call.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
}

/// Token callbacks for a streaming chat call (spec §6: "yields tokens via
/// callbacks (`on_token`, `on_end`, `on_error`)").
///
/// A trait rather than three closures so the streaming planner can hold one
/// object that is simultaneously the Plan Parser feed and the Streaming
/// Output Channel echo.
pub trait StreamCallback: Send + Sync {
    fn on_token(&self, token: &str);
    fn on_end(&self);
    fn on_error(&self, error: &str);
}

/// The model interface the core depends on. Implementations talk to a
/// concrete provider; the core only ever sees this trait.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Non-streaming completion, used by the joinner.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Streaming completion, used by the planner. Implementations must call
    /// `callback.on_token` for every token in arrival order, then exactly one
    /// of `callback.on_end` (clean finish) or `callback.on_error` (transport
    /// failure), and return accordingly.
    async fn stream(&self, request: ChatRequest, callback: &(dyn StreamCallback + Send + Sync)) -> Result<()>;
}

//! A deterministic in-memory [`ChatModel`] for exercising the planner,
//! joinner, and orchestrator loop without a network call.

use crate::chat::{ChatModel, ChatRequest, ChatResponse, StreamCallback};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays a fixed queue of responses, one per call, regardless of request
/// content. An exhausted queue is a test-authoring bug, so it panics rather
/// than silently repeating the last response.
pub struct MockChatModel {
    responses: Mutex<VecDeque<String>>,
}

impl MockChatModel {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { responses: Mutex::new(responses.into_iter().map(Into::into).collect()) }
    }

    fn next_response(&self) -> String {
        self.responses.lock().unwrap().pop_front().expect("MockChatModel response queue exhausted")
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
        Ok(ChatResponse { content: self.next_response() })
    }

    async fn stream(&self, _request: ChatRequest, callback: &(dyn StreamCallback + Send + Sync)) -> Result<()> {
        let response = self.next_response();
        for line in split_keeping_newlines(&response) {
            callback.on_token(line);
        }
        callback.on_end();
        Ok(())
    }
}

/// Split into line-sized chunks, each including its trailing `\n` where
/// present, so a mocked plan streams the way the planner's line-oriented
/// parser expects.
fn split_keeping_newlines(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (i, b) in text.as_bytes().iter().enumerate() {
        if *b == b'\n' {
            tokens.push(&text[start..=i]);
            start = i + 1;
        }
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Message;

    struct Recorder(Mutex<Vec<String>>);
    impl StreamCallback for Recorder {
        fn on_token(&self, token: &str) {
            self.0.lock().unwrap().push(token.to_string());
        }
        fn on_end(&self) {
            self.0.lock().unwrap().push("<end>".to_string());
        }
        fn on_error(&self, error: &str) {
            self.0.lock().unwrap().push(format!("<error:{error}>"));
        }
    }

    #[tokio::test]
    async fn chat_returns_queued_responses_in_order() {
        let model = MockChatModel::new(["first", "second"]);
        let request = ChatRequest::new(vec![Message::human("hi")]);
        assert_eq!(model.chat(request.clone()).await.unwrap().content, "first");
        assert_eq!(model.chat(request).await.unwrap().content, "second");
    }

    #[tokio::test]
    async fn stream_emits_line_tokens_then_end() {
        let model = MockChatModel::new(["1. A()\n2. join()\n"]);
        let recorder = Recorder(Mutex::new(Vec::new()));
        model.stream(ChatRequest::new(vec![]), &recorder).await.unwrap();
        let tokens = recorder.0.into_inner().unwrap();
        assert_eq!(tokens, vec!["1. A()\n".to_string(), "2. join()\n".to_string(), "<end>".to_string()]);
    }

    #[tokio::test]
    #[should_panic(expected = "response queue exhausted")]
    async fn exhausting_the_queue_panics() {
        let model = MockChatModel::new(Vec::<String>::new());
        let _ = model.chat(ChatRequest::new(vec![])).await;
    }
}

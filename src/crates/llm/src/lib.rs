//! LLM provider implementations for the LLM Compiler core.
//!
//! This crate owns the [`chat::ChatModel`] trait the planner and joinner
//! depend on, plus concrete providers:
//!
//! - [`local::OllamaClient`] for localhost-hosted models,
//! - [`remote::OpenAiClient`] for OpenAI-compatible hosted APIs,
//! - [`mock::MockChatModel`] for tests.
//!
//! `llm-compiler-core` has no dependency on this crate or any notion of a
//! language model; it only knows about tools and plan text. This crate is
//! consumed one layer up, by the `orchestrator` crate's planner and joinner.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::remote::OpenAiClient;
//! use llm::config::RemoteLlmConfig;
//! use llm::chat::{ChatModel, ChatRequest, Message};
//!
//! # async fn run() -> llm::error::Result<()> {
//! let config = RemoteLlmConfig::from_env("OPENAI_API_KEY", "https://api.openai.com/v1", "gpt-4")?;
//! let client = OpenAiClient::new(config);
//! let response = client.chat(ChatRequest::new(vec![Message::human("What is Rust?")])).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod mock;

#[cfg(feature = "local")]
pub mod local;

#[cfg(feature = "remote")]
pub mod remote;

pub use chat::{ChatModel, ChatRequest, ChatResponse, Message, Role, StreamCallback};
pub use config::{LocalLlmConfig, RemoteLlmConfig};
pub use error::{LlmError, Result};
pub use mock::MockChatModel;

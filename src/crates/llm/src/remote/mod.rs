//! Remote LLM provider implementations.
//!
//! Cloud-hosted, OpenAI-compatible chat completion APIs.

pub mod openai;

pub use openai::OpenAiClient;

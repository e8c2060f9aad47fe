//! Error type for the orchestration loop.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors surfaced by the orchestrator while driving a query through the
/// plan/execute/join/replan loop.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The plan parser or task fetching unit failed.
    #[error(transparent)]
    Core(#[from] llm_compiler_core::CoreError),

    /// The chat model failed (transport, auth, provider-side error).
    #[error(transparent)]
    Llm(#[from] llm::LlmError),

    /// A query was submitted against a registry with no tools registered.
    #[error("tool registry is empty")]
    EmptyRegistry,

    /// `OrchestratorConfig::validate` rejected the configuration (e.g.
    /// `planner_stream = false`).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The spawned task driving [`crate::LlmCompiler::run`] to completion
    /// panicked or was cancelled.
    #[error("orchestrator task failed: {0}")]
    TaskJoin(String),
}

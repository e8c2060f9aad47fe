//! Error types for the streaming planner, plan parser, and task fetching unit.
//!
//! All errors implement `std::error::Error` via `thiserror`. The taxonomy mirrors
//! the error handling design of the core: a hallucinated tool name is a
//! [`CoreError::ToolHallucination`] that the planner converts into a synthetic
//! failing `join` rather than aborting the process; a malformed plan line is a
//! [`CoreError::ParseError`]; everything else is a `CoreError::Execution` or a
//! wrapped lower-level error.

use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while parsing plans and fetching tasks.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    /// An action line referenced a tool name that isn't in the registry.
    ///
    /// This is the canonical "tool hallucination" case from the error handling
    /// design: the planner catches this and converts it into a synthetic join
    /// task carrying the phrase "try again" so the joinner can decide to replan.
    #[error("tool '{0}' is not registered")]
    ToolHallucination(String),

    /// A line matched the action grammar but could not be fully interpreted,
    /// e.g. an action index that goes backwards, or a `$k` reference to a
    /// task index that doesn't exist yet in the same plan.
    #[error("failed to parse plan line: {0}")]
    ParseError(String),

    /// `"join"` was used as an ordinary tool name, which is reserved.
    #[error("tool name 'join' is reserved and cannot be registered")]
    ReservedToolName,

    /// A tool name was registered more than once.
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    /// Generic execution-time failure not covered by a more specific variant.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The task-input channel closed unexpectedly before a join task arrived.
    #[error("task channel closed before a join task was received")]
    ChannelClosed,
}

impl CoreError {
    /// Build the observation text the streaming planner stores on a synthetic
    /// join task after a tool-hallucination error, per the error-recovery
    /// contract in §4.2: the joinner recognizes the literal phrase "try again"
    /// as a signal that the failure is fixable by replanning.
    pub fn as_join_observation(&self, failed_fragment: &str) -> String {
        format!(
            "plan generation stopped due to error in tool `{failed_fragment}`; error: {self}. You MUST correct this error and try again."
        )
    }
}

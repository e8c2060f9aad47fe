//! Configuration options recognized by the orchestrator (spec §6,
//! "Configuration options recognized by the orchestrator").

use serde::{Deserialize, Serialize};

/// Default literal the planner is told to stop on and the parser treats as
/// the plan terminator.
pub const DEFAULT_END_OF_PLAN_TOKEN: &str = "<END_OF_PLAN>";

/// Orchestrator-level configuration for one LLM Compiler instance.
///
/// Unlike the teacher's YAML-driven pattern/router/workflow configuration,
/// this has a small, fixed shape: the core exposes exactly the four options
/// named in the spec, nothing more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of replan rounds after the first. Defaults to 2, so up
    /// to 3 planning rounds total.
    #[serde(default = "default_max_replans")]
    pub max_replans: u32,
    /// Free-text appended verbatim to the planner prompt. May be empty.
    #[serde(default)]
    pub custom_instructions: String,
    /// The literal stop sequence and plan terminator.
    #[serde(default = "default_end_of_plan_token")]
    pub end_of_plan_token: String,
    /// Must be `true` for this core: the orchestrator only implements the
    /// streaming-planner contract (§4.2), never a batch-only planner. Kept
    /// as an explicit, validated field (rather than silently assumed)
    /// because the spec names it as a recognized configuration option in
    /// its own right (§6).
    #[serde(default = "default_planner_stream")]
    pub planner_stream: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_replans: default_max_replans(),
            custom_instructions: String::new(),
            end_of_plan_token: default_end_of_plan_token(),
            planner_stream: default_planner_stream(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_replans(mut self, max_replans: u32) -> Self {
        self.max_replans = max_replans;
        self
    }

    pub fn with_custom_instructions(mut self, custom_instructions: impl Into<String>) -> Self {
        self.custom_instructions = custom_instructions.into();
        self
    }

    /// Validate the options that aren't simply "whatever the caller put
    /// here": `planner_stream = false` asks for a contract (a non-streaming
    /// planner) this core does not implement (§6).
    pub fn validate(&self) -> Result<(), String> {
        if !self.planner_stream {
            return Err("planner_stream must be true; this core only implements the streaming planner contract".to_string());
        }
        Ok(())
    }
}

fn default_max_replans() -> u32 {
    2
}

fn default_end_of_plan_token() -> String {
    DEFAULT_END_OF_PLAN_TOKEN.to_string()
}

fn default_planner_stream() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_replans, 2);
        assert_eq!(config.end_of_plan_token, "<END_OF_PLAN>");
        assert!(config.custom_instructions.is_empty());
        assert!(config.planner_stream);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_streaming_planner_is_rejected() {
        let mut config = OrchestratorConfig::default();
        config.planner_stream = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_from_partial_yaml() {
        let config: OrchestratorConfig = serde_yaml::from_str("max_replans: 0\n").unwrap();
        assert_eq!(config.max_replans, 0);
        assert_eq!(config.end_of_plan_token, "<END_OF_PLAN>");
    }
}

//! Common configuration structures for LLM providers.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for local LLM providers (Ollama and compatible servers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalLlmConfig {
    /// Base URL for the local LLM server, e.g. `"http://localhost:11434"`.
    pub base_url: String,
    /// Model name/identifier.
    pub model: String,
    /// Request timeout.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl LocalLlmConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), model: model.into(), timeout: default_timeout() }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration for remote LLM providers (OpenAI-compatible APIs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API, e.g. `"https://api.openai.com/v1"`.
    pub base_url: String,
    /// Model name/identifier.
    pub model: String,
    /// Request timeout.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
    /// Organization ID, for providers that support it.
    pub organization: Option<String>,
}

impl RemoteLlmConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: default_timeout(),
            organization: None,
        }
    }

    /// Create configuration from an environment variable holding the API key.
    pub fn from_env(env_var: &str, base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| LlmError::ApiKeyNotFound(format!("environment variable: {env_var}")))?;
        Ok(Self::new(api_key, base_url, model))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_config_builder() {
        let config = LocalLlmConfig::new("http://localhost:11434", "llama2").with_timeout(Duration::from_secs(30));
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn remote_config_builder() {
        let config = RemoteLlmConfig::new("test-key", "https://api.openai.com/v1", "gpt-4")
            .with_organization("org-123");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.organization, Some("org-123".to_string()));
    }
}

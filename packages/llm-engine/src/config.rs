/// Configuration for the inference engine
use serde::{Deserialize, Serialize};

/// Default model identifier (small instruction-tuned Llama, q4f16 quantization)
pub const DEFAULT_MODEL: &str = "Llama-3.2-1B-Instruct-q4f16_1-MLC";

/// Default OpenAI-compatible endpoint exposed by LM Studio
pub const DEFAULT_BASE_URL: &str = "http://localhost:1234/v1";

/// Upper bound on request timeouts; generations longer than this are treated as hung
const MAX_REQUEST_TIMEOUT_SECS: u64 = 3600;

/// Configuration for an OpenAI-compatible chat completion server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Base URL including the API version segment (e.g. `http://localhost:1234/v1`)
    pub base_url: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Optional bearer token (LM Studio ignores it, hosted servers may not)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Timeout applied to each HTTP request, including the full streamed body
    pub request_timeout_secs: u64,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            request_timeout_secs: 300,
            temperature: 0.7,
        }
    }
}

impl EngineConfig {
    /// Build a config for a given server and model, keeping the other defaults
    pub fn for_server(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Endpoint URL for a path relative to the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model cannot be empty".to_string());
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!(
                "base_url must start with http:// or https:// (got '{}')",
                self.base_url
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".to_string());
        }

        if self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            return Err(format!(
                "request_timeout_secs cannot exceed {}",
                MAX_REQUEST_TIMEOUT_SECS
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err("temperature must be between 0.0 and 2.0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.base_url, "http://localhost:1234/v1");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(config.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.model = "  ".to_string();
        assert!(config.validate().is_err());

        config.model = "local-model".to_string();
        config.base_url = "localhost:1234".to_string();
        assert!(config.validate().is_err());

        config.base_url = "https://example.test/v1".to_string();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.request_timeout_secs = 10_000;
        assert!(config.validate().is_err());

        config.request_timeout_secs = 30;
        config.temperature = 3.5;
        assert!(config.validate().is_err());

        config.temperature = 0.2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = EngineConfig::for_server("http://localhost:1234/v1/", "m");
        assert_eq!(
            config.endpoint("/chat/completions"),
            "http://localhost:1234/v1/chat/completions"
        );
        assert_eq!(config.endpoint("models"), "http://localhost:1234/v1/models");
    }
}

//! Model server client - blocking HTTP to the `/api/generate` protocol

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

/// Default local model server
pub const DEFAULT_HOST: &str = "http://localhost:11434";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from the LLM layer
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection refused, read timeout, broken socket
    #[error("transport error: {0}")]
    Transport(String),
    /// Server answered with a non-2xx status
    #[error("model server error ({status}): {body}")]
    Api { status: u16, body: String },
    /// 2xx but no usable `response` text
    #[error("model server returned no response text")]
    EmptyResponse,
    /// No JSON object could be located in model output
    #[error("no JSON object in model output: {0}")]
    Parse(String),
    /// Bad or missing configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Connection settings for a model backend
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub host: String,
    pub model: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl LlmConfig {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            model: model.into(),
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
        }
    }

    /// Read `MODEL_HOST` (default local server) and `MODEL_NAME` (required)
    pub fn from_env() -> Result<Self, LlmError> {
        let host = std::env::var("MODEL_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let model = std::env::var("MODEL_NAME")
            .map_err(|_| LlmError::Config("MODEL_NAME is not set".to_string()))?;
        Ok(Self::new(host, model))
    }

    /// Override the model name (e.g. from `MODEL_NAME_P2`)
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// The textual generation surface all LLM consumers go through.
///
/// Implementations are blocking; the caller decides call frequency. Tests
/// inject fakes through this trait.
pub trait TextGenerator: Send {
    /// Generate a completion for `prompt`, returning the raw response text.
    /// JSON validation is the caller's concern (see [`crate::json`]).
    fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// The model identifier used for reporting
    fn model_name(&self) -> &str;
}

/// Blocking client for the local model server protocol
pub struct HttpClient {
    agent: ureq::Agent,
    config: LlmConfig,
}

impl HttpClient {
    pub fn new(config: LlmConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout_read(config.read_timeout)
            .build();
        Self { agent, config }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

impl TextGenerator for HttpClient {
    fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.config.host);
        let body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
        });

        let response = self.agent.post(&url).send_json(body).map_err(|e| match e {
            ureq::Error::Status(status, resp) => {
                let body = resp.into_string().unwrap_or_default();
                LlmError::Api {
                    status,
                    body: truncate(&body, 200),
                }
            }
            other => LlmError::Transport(other.to_string()),
        })?;

        let value: Value = response
            .into_json()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        match value.get("response").and_then(Value::as_str) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(LlmError::EmptyResponse),
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env_requires_model() {
        // Run with the variable absent: expect a Config error
        std::env::remove_var("MODEL_NAME");
        let err = LlmConfig::from_env().unwrap_err();
        assert!(matches!(err, LlmError::Config(_)));
    }

    #[test]
    fn test_config_with_model() {
        let config = LlmConfig::new("http://localhost:11434", "llama3.1:8b")
            .with_model("qwen3:4b");
        assert_eq!(config.model, "qwen3:4b");
        assert_eq!(config.host, "http://localhost:11434");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 200), "short");
        let long = "x".repeat(300);
        let t = truncate(&long, 200);
        assert_eq!(t.len(), 203);
        assert!(t.ends_with("..."));
    }

    #[test]
    fn test_generate_against_dead_port_is_transport_error() {
        // Nothing listens on this port; the client must surface a transport
        // error rather than panic or hang past the connect timeout.
        let mut config = LlmConfig::new("http://127.0.0.1:1", "test-model");
        config.connect_timeout = Duration::from_millis(200);
        let client = HttpClient::new(config);
        let err = client.generate("hello").unwrap_err();
        assert!(matches!(err, LlmError::Transport(_)));
    }
}

//! Cloud proxy - serves the local model protocol, forwards to hosted APIs
//!
//! Agents only speak the local `/api/generate` protocol. Pointing
//! `MODEL_HOST` at this proxy lets them use hosted OpenAI-compatible
//! providers unchanged: the proxy translates each generate request into a
//! chat-completions call and wraps the answer back into the local response
//! shape, preserving upstream status codes on error.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::client::LlmError;

/// Sampling temperature used for all proxied calls
const UPSTREAM_TEMPERATURE: f64 = 0.3;
const UPSTREAM_MAX_TOKENS: u32 = 1024;

/// Supported OpenAI-compatible providers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Deepseek,
    Openai,
    Openrouter,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Deepseek, Provider::Openai, Provider::Openrouter];

    pub fn name(self) -> &'static str {
        match self {
            Provider::Deepseek => "deepseek",
            Provider::Openai => "openai",
            Provider::Openrouter => "openrouter",
        }
    }

    pub fn parse(s: &str) -> Option<Provider> {
        Provider::ALL.into_iter().find(|p| p.name() == s.to_ascii_lowercase())
    }

    /// Chat-completions endpoint
    pub fn base_url(self) -> &'static str {
        match self {
            Provider::Deepseek => "https://api.deepseek.com/chat/completions",
            Provider::Openai => "https://api.openai.com/v1/chat/completions",
            Provider::Openrouter => "https://openrouter.ai/api/v1/chat/completions",
        }
    }

    /// Environment variable holding the credential
    pub fn env_key(self) -> &'static str {
        match self {
            Provider::Deepseek => "DEEPSEEK_API_KEY",
            Provider::Openai => "OPENAI_API_KEY",
            Provider::Openrouter => "OPENROUTER_API_KEY",
        }
    }

    /// Models advertised on `/api/tags`
    pub fn models(self) -> &'static [&'static str] {
        match self {
            Provider::Deepseek => &["deepseek-chat", "deepseek-reasoner"],
            Provider::Openai => &["gpt-4o", "gpt-4o-mini"],
            Provider::Openrouter => &["anthropic/claude-sonnet-4", "google/gemini-2.5-pro"],
        }
    }
}

/// Proxy settings
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    pub provider: Provider,
    pub api_key: String,
    pub port: u16,
}

impl ProxyConfig {
    /// Build from provider + optional explicit key, falling back to the
    /// provider's environment variable.
    pub fn resolve(provider: Provider, api_key: Option<String>, port: u16) -> Result<Self, LlmError> {
        let api_key = api_key
            .or_else(|| std::env::var(provider.env_key()).ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                LlmError::Config(format!("no API key: set {} or pass --api-key", provider.env_key()))
            })?;
        Ok(Self {
            provider,
            api_key,
            port,
        })
    }
}

#[derive(Debug, Default)]
struct ProxyStats {
    requests: u64,
    errors: u64,
    total_ms: u64,
}

/// Shared proxy state
pub struct ProxyState {
    config: ProxyConfig,
    agent: ureq::Agent,
    stats: Mutex<ProxyStats>,
}

impl ProxyState {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            agent: ureq::AgentBuilder::new()
                .timeout(std::time::Duration::from_secs(60))
                .build(),
            stats: Mutex::new(ProxyStats::default()),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Incoming request in the local protocol shape
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub format: Option<String>,
}

/// Outgoing response in the local protocol shape
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub model: String,
    pub created_at: String,
    pub response: String,
    pub done: bool,
    pub total_duration: u64,
    pub eval_count: u64,
    pub prompt_eval_count: u64,
}

// ============================================================================
// Router
// ============================================================================

/// Create the proxy router
pub fn create_router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route("/api/generate", post(handle_generate))
        .route("/api/tags", get(handle_tags).post(handle_tags))
        .route("/", get(handle_health))
        .with_state(state)
}

/// Bind and serve until the task is dropped
pub async fn serve(config: ProxyConfig) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", config.port);
    info!(
        "proxy for {} on http://{} (set MODEL_HOST=http://{addr})",
        config.provider.name(),
        addr
    );
    let state = Arc::new(ProxyState::new(config));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, create_router(state)).await
}

async fn handle_health() -> &'static str {
    "gridwar model proxy running\n"
}

async fn handle_tags(State(state): State<Arc<ProxyState>>) -> Json<Value> {
    let models: Vec<Value> = state
        .config
        .provider
        .models()
        .iter()
        .map(|m| json!({"name": m, "size": 0}))
        .collect();
    Json(json!({ "models": models }))
}

async fn handle_generate(
    State(state): State<Arc<ProxyState>>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    let started = Instant::now();
    let shared = state.clone();

    let result = tokio::task::spawn_blocking(move || forward_generate(&shared, &request)).await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(Ok(mut response)) => {
            response.total_duration = elapsed_ms * 1_000_000;
            let mut stats = state.stats.lock().expect("stats lock");
            stats.requests += 1;
            stats.total_ms += elapsed_ms;
            info!(
                "proxied {} in {}ms (req #{}, {} errors so far)",
                response.model, elapsed_ms, stats.requests, stats.errors
            );
            Json(response).into_response()
        }
        Ok(Err(err)) => {
            let mut stats = state.stats.lock().expect("stats lock");
            stats.errors += 1;
            drop(stats);
            warn!("proxy error: {err}");
            match err {
                LlmError::Api { status, body } => {
                    let code =
                        StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                    (code, body).into_response()
                }
                other => (StatusCode::BAD_GATEWAY, other.to_string()).into_response(),
            }
        }
        Err(join_err) => {
            warn!("proxy worker panicked: {join_err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "proxy worker failed").into_response()
        }
    }
}

// ============================================================================
// Upstream call
// ============================================================================

/// Build the OpenAI-compatible request body for a generate request
pub fn build_chat_request(model: &str, prompt: &str, json_mode: bool) -> Value {
    let mut body = json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
        "stream": false,
        "temperature": UPSTREAM_TEMPERATURE,
        "max_tokens": UPSTREAM_MAX_TOKENS,
    });
    if json_mode {
        body["response_format"] = json!({"type": "json_object"});
    }
    body
}

fn forward_generate(
    state: &ProxyState,
    request: &GenerateRequest,
) -> Result<GenerateResponse, LlmError> {
    let json_mode = request.format.as_deref() == Some("json");
    let body = build_chat_request(&request.model, &request.prompt, json_mode);

    let response = state
        .agent
        .post(state.config.provider.base_url())
        .set("Content-Type", "application/json")
        .set("Authorization", &format!("Bearer {}", state.config.api_key))
        .send_json(body)
        .map_err(|e| match e {
            ureq::Error::Status(status, resp) => LlmError::Api {
                status,
                body: resp.into_string().unwrap_or_default().chars().take(200).collect(),
            },
            other => LlmError::Transport(other.to_string()),
        })?;

    let upstream: Value = response
        .into_json()
        .map_err(|e| LlmError::Transport(e.to_string()))?;

    let text = upstream["choices"][0]["message"]["content"]
        .as_str()
        .ok_or(LlmError::EmptyResponse)?
        .to_string();

    let usage = &upstream["usage"];
    Ok(GenerateResponse {
        model: request.model.clone(),
        created_at: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        response: text,
        done: true,
        total_duration: 0,
        eval_count: usage["completion_tokens"].as_u64().unwrap_or(0),
        prompt_eval_count: usage["prompt_tokens"].as_u64().unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!(Provider::parse("deepseek"), Some(Provider::Deepseek));
        assert_eq!(Provider::parse("OpenAI"), Some(Provider::Openai));
        assert_eq!(Provider::parse("nope"), None);
    }

    #[test]
    fn test_provider_env_keys() {
        assert_eq!(Provider::Deepseek.env_key(), "DEEPSEEK_API_KEY");
        assert_eq!(Provider::Openai.env_key(), "OPENAI_API_KEY");
        assert_eq!(Provider::Openrouter.env_key(), "OPENROUTER_API_KEY");
    }

    #[test]
    fn test_build_chat_request_json_mode() {
        let body = build_chat_request("deepseek-chat", "pick a goal", true);
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "pick a goal");
        assert_eq!(body["stream"], false);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_build_chat_request_plain() {
        let body = build_chat_request("gpt-4o-mini", "hello", false);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_config_resolve_requires_key() {
        std::env::remove_var("OPENROUTER_API_KEY");
        let err = ProxyConfig::resolve(Provider::Openrouter, None, 11435).unwrap_err();
        assert!(matches!(err, LlmError::Config(_)));

        let ok = ProxyConfig::resolve(Provider::Openrouter, Some("sk-test".into()), 11435);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_generate_request_tolerates_extra_fields() {
        let raw = r#"{"model":"m","prompt":"p","stream":false,"format":"json","options":{"x":1}}"#;
        let req: GenerateRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.model, "m");
        assert_eq!(req.format.as_deref(), Some("json"));
    }
}

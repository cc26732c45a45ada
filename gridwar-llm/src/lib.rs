//! GRIDWAR LLM - the single textual I/O surface for model-guided agents
//!
//! This crate provides:
//! - A blocking client for the local model server protocol (`/api/generate`)
//! - Lenient JSON extraction from model output (code fences, chatter)
//! - Degraded-channel tracking (consecutive-failure state machine)
//! - Tick-interval refresh scheduling
//! - A cloud proxy that serves the local protocol and forwards to
//!   OpenAI-compatible providers
//!
//! The client is deliberately blocking and single-flight: each agent owns its
//! own client instance and issues at most one request at a time, so no
//! synchronization is needed and tests can inject a fake through the
//! `TextGenerator` trait.

pub mod channel;
pub mod client;
pub mod json;
pub mod proxy;
pub mod schedule;

pub use channel::{ChannelHealth, ChannelState};
pub use client::{HttpClient, LlmConfig, LlmError, TextGenerator};
pub use json::extract_json_object;
pub use proxy::{create_router, Provider, ProxyConfig, ProxyState};
pub use schedule::{env_ticks, RefreshSchedule};

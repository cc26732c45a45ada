//! Proxy command - serve the local model protocol from a cloud provider

use clap::Args;

use gridwar_llm::{proxy, Provider, ProxyConfig};

use crate::CliError;

#[derive(Args)]
pub struct ProxyArgs {
    /// Cloud provider: deepseek, openai or openrouter
    #[arg(long, default_value = "deepseek")]
    pub provider: String,

    /// Port to listen on (point MODEL_HOST at it)
    #[arg(long, default_value = "11435")]
    pub port: u16,

    /// API key (falls back to the provider's environment variable)
    #[arg(long)]
    pub api_key: Option<String>,
}

pub fn run(args: ProxyArgs) -> Result<(), CliError> {
    let provider = Provider::parse(&args.provider).ok_or_else(|| {
        CliError::Config(format!(
            "unknown provider '{}' (expected deepseek, openai or openrouter)",
            args.provider
        ))
    })?;

    let config = ProxyConfig::resolve(provider, args.api_key, args.port)
        .map_err(|err| CliError::Config(err.to_string()))?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|err| CliError::Other(anyhow::anyhow!("tokio runtime: {err}")))?;
    runtime
        .block_on(proxy::serve(config))
        .map_err(|err| CliError::Other(anyhow::anyhow!("proxy server: {err}")))
}

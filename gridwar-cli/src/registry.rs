//! Agent registry - class names to live agents

use std::sync::Arc;

use anyhow::{bail, Result};

use gridwar_agents::{
    Agent, HybridAgent, HybridConfig, RandomBiased, ScriptedAgent, StrategyKind,
};
use gridwar_llm::{HttpClient, LlmConfig};
use gridwar_mcts::{SearchAgent, SearchConfig};

/// LLM contestants selected by `--agents all`
pub const CONTESTANTS: &[&str] = &["hybrid-llm", "mcts-llm"];

/// Every class the arena can instantiate
pub const KNOWN_AGENTS: &[&str] = &[
    "random-biased",
    "worker-rush",
    "light-rush",
    "heavy-rush",
    "ranged-rush",
    "turtle-defense",
    "boom-economy",
    "counter-attack",
    "harass",
    "hybrid-llm",
    "mcts-llm",
];

/// Architecture label used in reports and the leaderboard key
pub fn architecture(class: &str) -> &'static str {
    match class {
        "hybrid-llm" => "Hybrid",
        "mcts-llm" => "Search+LLM",
        _ => "Scripted",
    }
}

pub fn is_llm_class(class: &str) -> bool {
    matches!(class, "hybrid-llm" | "mcts-llm")
}

/// Display name: model-qualified for LLM agents, the class label otherwise
pub fn display_name(class: &str) -> String {
    if is_llm_class(class) {
        let model = std::env::var("MODEL_NAME").unwrap_or_else(|_| "unknown-model".to_string());
        format!("{} ({})", model, architecture(class))
    } else {
        class.to_string()
    }
}

/// Instantiate an agent. `model_override` swaps the model name for LLM
/// classes (the second side of an LLM-vs-LLM game).
pub fn build_agent(
    class: &str,
    seed: u64,
    model_override: Option<&str>,
) -> Result<Box<dyn Agent>> {
    let scripted = |kind: StrategyKind| -> Box<dyn Agent> { Box::new(ScriptedAgent::new(kind)) };

    Ok(match class {
        "random-biased" => Box::new(RandomBiased::new(seed)),
        "worker-rush" => scripted(StrategyKind::WorkerRush),
        "light-rush" => scripted(StrategyKind::LightRush),
        "heavy-rush" => scripted(StrategyKind::HeavyRush),
        "ranged-rush" => scripted(StrategyKind::RangedRush),
        "turtle-defense" => scripted(StrategyKind::TurtleDefense),
        "boom-economy" => scripted(StrategyKind::BoomEconomy),
        "counter-attack" => scripted(StrategyKind::CounterAttack),
        "harass" => scripted(StrategyKind::Harass),
        "hybrid-llm" => {
            let config = llm_config(model_override)?;
            Box::new(HybridAgent::new(
                Box::new(HttpClient::new(config)),
                HybridConfig::from_env(),
            ))
        }
        "mcts-llm" => {
            let config = llm_config(model_override)?;
            Box::new(SearchAgent::new(
                Arc::new(HttpClient::new(config)),
                SearchConfig::from_env().with_seed(seed),
            ))
        }
        other => bail!("unknown agent class '{other}'"),
    })
}

fn llm_config(model_override: Option<&str>) -> Result<LlmConfig> {
    let config = LlmConfig::from_env()?;
    Ok(match model_override {
        Some(model) => config.with_model(model),
        None => config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scripted_classes_buildable() {
        for class in KNOWN_AGENTS {
            if is_llm_class(class) {
                continue; // needs MODEL_NAME
            }
            let agent = build_agent(class, 1, None).unwrap();
            assert!(!agent.name().is_empty());
        }
    }

    #[test]
    fn test_unknown_class_rejected() {
        assert!(build_agent("skynet", 1, None).is_err());
    }

    #[test]
    fn test_architecture_labels() {
        assert_eq!(architecture("hybrid-llm"), "Hybrid");
        assert_eq!(architecture("mcts-llm"), "Search+LLM");
        assert_eq!(architecture("worker-rush"), "Scripted");
    }

    #[test]
    fn test_contestants_are_known() {
        for class in CONTESTANTS {
            assert!(KNOWN_AGENTS.contains(class));
        }
    }
}

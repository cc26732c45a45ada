//! Hybrid LLM agent - a state machine over rule strategies
//!
//! The agent executes the current rule strategy every tick and consults the
//! model at a fixed interval (shorter while fighting) to pick the next
//! strategy plus four tactical scalars. Model failures never stall a turn:
//! the last accepted strategy and parameters simply stay in force.

use gridwar_llm::{extract_json_object, ChannelHealth, TextGenerator};
use gridwar_sim::{GameState, PlayerAction, Side, UnitKind};
use tracing::{debug, warn};

use crate::strategy::{GameStrategy, StrategyKind, TargetPriority};
use crate::tactics::{count_kind, in_combat, military_strength};
use crate::Agent;

/// Consultation intervals and phase estimation
#[derive(Clone, Debug)]
pub struct HybridConfig {
    /// Ticks between consultations out of combat
    pub base_interval: u32,
    /// Ticks between consultations while in combat
    pub combat_interval: u32,
    /// Tick cap used only to phrase the game phase in prompts
    pub tick_cap: u32,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            base_interval: 200,
            combat_interval: 100,
            tick_cap: 3000,
        }
    }
}

impl HybridConfig {
    /// Read `HYBRID_INTERVAL_TICKS` / `HYBRID_COMBAT_INTERVAL_TICKS` /
    /// `TICK_CAP` with the defaults above.
    pub fn from_env() -> Self {
        Self {
            base_interval: gridwar_llm::env_ticks("HYBRID_INTERVAL_TICKS", 200),
            combat_interval: gridwar_llm::env_ticks("HYBRID_COMBAT_INTERVAL_TICKS", 100),
            tick_cap: gridwar_llm::env_ticks("TICK_CAP", 3000),
        }
    }
}

/// LLM-guided finite state machine over the named rule strategies
pub struct HybridAgent {
    display: String,
    generator: Box<dyn TextGenerator>,
    config: HybridConfig,
    health: ChannelHealth,
    strategies: Vec<Box<dyn GameStrategy>>,
    current: StrategyKind,
    aggression: f64,
    economy_priority: f64,
    retreat_threshold: f64,
    primary_target: TargetPriority,
    last_consult: Option<u32>,
    consultations: u32,
    strategy_changes: u32,
}

impl HybridAgent {
    pub fn new(generator: Box<dyn TextGenerator>, config: HybridConfig) -> Self {
        let display = format!("{} (Hybrid)", generator.model_name());
        Self {
            display,
            generator,
            config,
            health: ChannelHealth::default(),
            strategies: StrategyKind::ALL.iter().map(|k| k.build()).collect(),
            current: StrategyKind::LightRush,
            aggression: 0.5,
            economy_priority: 0.5,
            retreat_threshold: 0.3,
            primary_target: TargetPriority::Base,
            last_consult: None,
            consultations: 0,
            strategy_changes: 0,
        }
    }

    pub fn current_strategy(&self) -> StrategyKind {
        self.current
    }

    pub fn aggression(&self) -> f64 {
        self.aggression
    }

    pub fn economy_priority(&self) -> f64 {
        self.economy_priority
    }

    pub fn retreat_threshold(&self) -> f64 {
        self.retreat_threshold
    }

    pub fn primary_target(&self) -> TargetPriority {
        self.primary_target
    }

    fn switch(&mut self, next: StrategyKind, tick: u32) {
        if next == self.current {
            return;
        }
        debug!("T={tick}: strategy switch {} -> {}", self.current.name(), next.name());
        self.current = next;
        self.strategy_changes += 1;
        // Fresh bookkeeping so queued intents of the old plan don't leak
        self.strategies[next.index()].reset();
    }

    fn consult(&mut self, side: Side, state: &GameState) {
        self.consultations += 1;
        let prompt = build_strategy_prompt(
            side,
            state,
            self.config.tick_cap,
            self.current,
            self.aggression,
            self.economy_priority,
            self.retreat_threshold,
            self.primary_target,
        );
        match self.generator.generate(&prompt) {
            Ok(text) => {
                if self.apply_response(&text, state.tick()) {
                    self.health.record_success();
                } else {
                    warn!("strategy response unusable: {}", text.chars().take(120).collect::<String>());
                    self.health.record_failure();
                }
            }
            Err(err) => {
                warn!("strategy consultation failed: {err}");
                self.health.record_failure();
            }
        }
    }

    /// Apply a model response; unknown enum values are skipped, valid fields
    /// kept. Returns false when nothing usable was found.
    fn apply_response(&mut self, text: &str, tick: u32) -> bool {
        if let Ok(json) = extract_json_object(text) {
            let mut applied = false;
            if let Some(s) = json.get("strategy").and_then(|v| v.as_str()) {
                if let Some(kind) = StrategyKind::parse(s) {
                    self.switch(kind, tick);
                    applied = true;
                }
            }
            if let Some(v) = json.get("aggression").and_then(|v| v.as_f64()) {
                self.aggression = v.clamp(0.0, 1.0);
                applied = true;
            }
            if let Some(v) = json.get("economy_priority").and_then(|v| v.as_f64()) {
                self.economy_priority = v.clamp(0.0, 1.0);
                applied = true;
            }
            if let Some(v) = json.get("retreat_threshold").and_then(|v| v.as_f64()) {
                self.retreat_threshold = v.clamp(0.0, 1.0);
                applied = true;
            }
            if let Some(t) = json.get("primary_target").and_then(|v| v.as_str()) {
                if let Some(target) = TargetPriority::parse(t) {
                    self.primary_target = target;
                    applied = true;
                }
            }
            if applied {
                return true;
            }
        }
        // Plain-text fallback: any recognized strategy name in the body
        let upper = text.to_ascii_uppercase();
        for kind in StrategyKind::ALL {
            if upper.contains(kind.name()) {
                self.switch(kind, tick);
                return true;
            }
        }
        false
    }
}

impl Agent for HybridAgent {
    fn name(&self) -> &str {
        &self.display
    }

    fn get_action(&mut self, side: Side, state: &GameState) -> PlayerAction {
        let tick = state.tick();
        let combat = in_combat(state, side);
        let interval = if combat {
            self.config.combat_interval
        } else {
            self.config.base_interval
        };

        let due = self
            .last_consult
            .map_or(true, |last| tick >= last.saturating_add(interval));
        if due {
            if self.health.should_attempt() {
                self.consult(side, state);
            }
            self.last_consult = Some(tick);
        }

        // Retreat override: badly outmatched mid-fight -> regroup, whatever
        // the model last said
        if combat && self.retreat_threshold > 0.0 {
            let mine = military_strength(state, side) as f64;
            let theirs = military_strength(state, side.opponent()) as f64;
            if theirs > 0.0 && mine < self.retreat_threshold * theirs {
                if !matches!(
                    self.current,
                    StrategyKind::CounterAttack | StrategyKind::TurtleDefense
                ) {
                    debug!("T={tick}: retreat override ({mine} vs {theirs})");
                    self.switch(StrategyKind::CounterAttack, tick);
                }
            }
        }

        self.strategies[self.current.index()].act(side, state)
    }

    fn reset(&mut self) {
        self.strategies = StrategyKind::ALL.iter().map(|k| k.build()).collect();
        self.current = StrategyKind::LightRush;
        self.last_consult = None;
    }

    fn statistics(&self) -> String {
        format!(
            "strategy={} aggression={:.2} economy={:.2} retreat={:.2} target={} changes={} consultations={} channel={}",
            self.current.name(),
            self.aggression,
            self.economy_priority,
            self.retreat_threshold,
            self.primary_target.name(),
            self.strategy_changes,
            self.consultations,
            self.health.describe(),
        )
    }
}

/// Summarize the position and ask for a strategy plus tactical parameters.
#[allow(clippy::too_many_arguments)]
fn build_strategy_prompt(
    side: Side,
    state: &GameState,
    tick_cap: u32,
    current: StrategyKind,
    aggression: f64,
    economy_priority: f64,
    retreat_threshold: f64,
    primary_target: TargetPriority,
) -> String {
    let enemy = side.opponent();
    let phase = game_phase(state.tick(), tick_cap);
    let mine = military_strength(state, side);
    let theirs = military_strength(state, enemy);

    let count = |s: Side, k: UnitKind| count_kind(state, s, k);

    let mut p = String::new();
    p.push_str("You are a strategic advisor for a real-time strategy game.\n\n");
    p.push_str("STRATEGIES (pick one):\n");
    p.push_str("- WORKER_RUSH: Fast early attack with workers (no barracks needed)\n");
    p.push_str("- LIGHT_RUSH: Build barracks, train light units (fast, balanced)\n");
    p.push_str("- HEAVY_RUSH: Train heavy units (high HP, counters light infantry)\n");
    p.push_str("- RANGED_RUSH: Train ranged units (attack from distance, counters melee)\n");
    p.push_str("- TURTLE_DEFENSE: Defensive build with heavy units, attack when strong\n");
    p.push_str("- BOOM_ECONOMY: Economy first, maximize workers before military\n");
    p.push_str("- COUNTER_ATTACK: Defend then push (good when behind)\n");
    p.push_str("- HARASS: Worker raids while building up\n\n");
    p.push_str("TACTICAL PARAMETERS (0.0 to 1.0):\n");
    p.push_str("- aggression: attack intensity (0=passive, 1=all-in)\n");
    p.push_str("- economy_priority: economy vs military focus\n");
    p.push_str("- retreat_threshold: retreat when strength falls below this fraction of the enemy's\n\n");
    p.push_str("TARGET PRIORITY (pick one): BASE, WORKERS, ARMY\n\n");
    p.push_str("GAME STATE:\n");
    p.push_str(&format!("- Phase: {} ({}/{})\n", phase, state.tick(), tick_cap));
    p.push_str(&format!("- Your resources: {}\n", state.resources(side)));
    p.push_str(&format!(
        "- Your forces: {} workers, {} light, {} heavy, {} ranged\n",
        count(side, UnitKind::Worker),
        count(side, UnitKind::Light),
        count(side, UnitKind::Heavy),
        count(side, UnitKind::Ranged),
    ));
    p.push_str(&format!(
        "- Your buildings: {} base, {} barracks\n",
        count(side, UnitKind::Base),
        count(side, UnitKind::Barracks),
    ));
    p.push_str(&format!(
        "- Enemy forces: {} workers, {} light, {} heavy, {} ranged\n",
        count(enemy, UnitKind::Worker),
        count(enemy, UnitKind::Light),
        count(enemy, UnitKind::Heavy),
        count(enemy, UnitKind::Ranged),
    ));
    p.push_str(&format!("- Strength comparison: you={mine}, enemy={theirs}\n"));
    p.push_str(&format!("- In combat: {}\n\n", if in_combat(state, side) { "YES" } else { "NO" }));
    p.push_str(&format!("Current strategy: {}\n", current.name()));
    p.push_str(&format!(
        "Current params: aggression={aggression:.1}, economy={economy_priority:.1}, retreat={retreat_threshold:.1}, target={}\n\n",
        primary_target.name()
    ));
    p.push_str("Reply with JSON:\n");
    p.push_str("{\n  \"strategy\": \"LIGHT_RUSH\",\n  \"aggression\": 0.7,\n  \"economy_priority\": 0.3,\n  \"retreat_threshold\": 0.3,\n  \"primary_target\": \"BASE\"\n}\n");
    p
}

/// EARLY before a quarter of the cap, LATE after three quarters
fn game_phase(tick: u32, tick_cap: u32) -> &'static str {
    let cap = tick_cap.max(1);
    if tick < cap / 4 {
        "EARLY"
    } else if tick < cap * 3 / 4 {
        "MID"
    } else {
        "LATE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwar_llm::LlmError;
    use gridwar_sim::GameMap;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct FakeGenerator {
        responses: Mutex<VecDeque<Result<String, String>>>,
    }

    impl FakeGenerator {
        fn new(responses: Vec<Result<&str, &str>>) -> Box<Self> {
            Box::new(Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(String::from).map_err(String::from))
                        .collect(),
                ),
            })
        }
    }

    impl TextGenerator for FakeGenerator {
        fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(LlmError::Transport(e)),
                None => Err(LlmError::Transport("out of responses".into())),
            }
        }

        fn model_name(&self) -> &str {
            "fake-model"
        }
    }

    fn quiet_state() -> GameState {
        GameState::bases_workers_8x8()
    }

    fn advance_ticks(state: &mut GameState, n: u32) {
        for _ in 0..n {
            state.advance(&PlayerAction::empty(), &PlayerAction::empty());
        }
    }

    #[test]
    fn test_first_consult_applies_strategy_and_clamps() {
        let gen = FakeGenerator::new(vec![Ok(
            r#"{"strategy": "HEAVY_RUSH", "aggression": 3.7, "economy_priority": -1.0, "retreat_threshold": 0.4, "primary_target": "WORKERS"}"#,
        )]);
        let mut agent = HybridAgent::new(gen, HybridConfig::default());
        let state = quiet_state();
        let _ = agent.get_action(Side::P0, &state);

        assert_eq!(agent.current_strategy(), StrategyKind::HeavyRush);
        assert_eq!(agent.aggression(), 1.0);
        assert_eq!(agent.economy_priority(), 0.0);
        assert_eq!(agent.retreat_threshold(), 0.4);
        assert_eq!(agent.primary_target(), TargetPriority::Workers);
    }

    #[test]
    fn test_unknown_enum_skipped_scalars_kept() {
        let gen = FakeGenerator::new(vec![Ok(
            r#"{"strategy": "ZERG_RUSH", "aggression": 0.9, "primary_target": "TOWERS"}"#,
        )]);
        let mut agent = HybridAgent::new(gen, HybridConfig::default());
        let state = quiet_state();
        let before = agent.current_strategy();
        let _ = agent.get_action(Side::P0, &state);

        assert_eq!(agent.current_strategy(), before);
        assert_eq!(agent.aggression(), 0.9);
        assert_eq!(agent.primary_target(), TargetPriority::Base);
    }

    #[test]
    fn test_error_keeps_last_accepted_state() {
        let gen = FakeGenerator::new(vec![
            Ok(r#"{"strategy": "BOOM_ECONOMY", "aggression": 0.2}"#),
            Err("connection refused"),
        ]);
        let mut config = HybridConfig::default();
        config.base_interval = 1;
        let mut agent = HybridAgent::new(gen, config);
        let mut state = quiet_state();

        let _ = agent.get_action(Side::P0, &state);
        assert_eq!(agent.current_strategy(), StrategyKind::BoomEconomy);

        advance_ticks(&mut state, 2);
        let _ = agent.get_action(Side::P0, &state);
        assert_eq!(agent.current_strategy(), StrategyKind::BoomEconomy);
        assert_eq!(agent.aggression(), 0.2);
    }

    #[test]
    fn test_plain_text_fallback() {
        let gen = FakeGenerator::new(vec![Ok(
            "Given the situation I would recommend RANGED_RUSH here.",
        )]);
        let mut agent = HybridAgent::new(gen, HybridConfig::default());
        let state = quiet_state();
        let _ = agent.get_action(Side::P0, &state);
        assert_eq!(agent.current_strategy(), StrategyKind::RangedRush);
    }

    #[test]
    fn test_degraded_after_three_failures() {
        let gen = FakeGenerator::new(vec![Err("down"), Err("down"), Err("down")]);
        let mut config = HybridConfig::default();
        config.base_interval = 1;
        config.combat_interval = 1;
        let mut agent = HybridAgent::new(gen, config);
        let mut state = quiet_state();

        for _ in 0..3 {
            let _ = agent.get_action(Side::P0, &state);
            advance_ticks(&mut state, 1);
        }
        assert!(agent.statistics().contains("DEGRADED"));
    }

    #[test]
    fn test_retreat_override() {
        // P0 one worker vs two enemy workers in combat range: 1 < 0.9 * 2,
        // so the override fires on the very turn the threshold is accepted.
        let map = GameMap::parse(
            "w . W W\n\
             . . . .",
            20,
        )
        .unwrap();
        let state = GameState::from_map(&map);
        let gen = FakeGenerator::new(vec![Ok(
            r#"{"strategy": "WORKER_RUSH", "retreat_threshold": 0.9}"#,
        )]);
        let mut agent = HybridAgent::new(gen, HybridConfig::default());
        let _ = agent.get_action(Side::P0, &state);

        assert_eq!(agent.retreat_threshold(), 0.9);
        assert_eq!(agent.current_strategy(), StrategyKind::CounterAttack);
    }

    #[test]
    fn test_consult_interval_respected() {
        let gen = FakeGenerator::new(vec![
            Ok(r#"{"strategy": "HARASS"}"#),
            Ok(r#"{"strategy": "BOOM_ECONOMY"}"#),
        ]);
        let mut agent = HybridAgent::new(gen, HybridConfig::default());
        let mut state = quiet_state();

        let _ = agent.get_action(Side::P0, &state);
        assert_eq!(agent.current_strategy(), StrategyKind::Harass);

        // Well inside the 200-tick window: no second consultation
        advance_ticks(&mut state, 10);
        let _ = agent.get_action(Side::P0, &state);
        assert_eq!(agent.current_strategy(), StrategyKind::Harass);
    }

    #[test]
    fn test_game_phase() {
        assert_eq!(game_phase(0, 3000), "EARLY");
        assert_eq!(game_phase(1500, 3000), "MID");
        assert_eq!(game_phase(2400, 3000), "LATE");
    }
}

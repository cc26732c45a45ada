//! The search agent - scheduled model refreshes around a budgeted search
//!
//! `get_action` refreshes the policy priors and strategic goals when their
//! windows expire (off the critical path; only the very first goal call is
//! synchronous so the evaluator starts from a model-chosen pair), then runs
//! one budgeted search and returns the most-visited root action.

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use tracing::{debug, warn};

use gridwar_agents::Agent;
use gridwar_llm::{
    extract_json_object, ChannelHealth, ChannelState, LlmError, RefreshSchedule, TextGenerator,
};
use gridwar_sim::{GameState, PlayerAction, Side, UnitKind};

use crate::eval::{StrategicEvaluator, StrategicGoal};
use crate::priors::PolicyPriorCache;
use crate::refresh::SingleFlight;
use crate::search::run_search;
use crate::SearchConfig;

/// Goal refresh lifecycle: initial -> ready on first success, ready ->
/// degraded after consecutive failures, degraded -> ready on one success.
struct GoalController {
    schedule: RefreshSchedule,
    health: ChannelHealth,
    flight: SingleFlight<Result<Value, LlmError>>,
    consultations: u32,
    errors: u32,
}

impl GoalController {
    fn new(interval_ticks: u32) -> Self {
        Self {
            schedule: RefreshSchedule::new(interval_ticks),
            health: ChannelHealth::default(),
            flight: SingleFlight::new(),
            consultations: 0,
            errors: 0,
        }
    }

    fn maybe_refresh(
        &mut self,
        generator: &Arc<dyn TextGenerator + Send + Sync>,
        side: Side,
        state: &GameState,
        tick_cap: u32,
        eval: &mut StrategicEvaluator,
    ) {
        if let Some(result) = self.flight.poll() {
            self.absorb(result, eval);
        }

        let tick = state.tick();
        if !self.schedule.due(tick) || self.flight.in_flight() {
            return;
        }
        if !self.health.should_attempt() {
            self.schedule.mark(tick);
            return;
        }

        self.consultations += 1;
        self.schedule.mark(tick);
        let prompt = build_goal_prompt(side, state, tick_cap, eval);

        if self.health.state() == ChannelState::Initial {
            // First call seeds the goal pair before any search runs
            let result = generator
                .generate(&prompt)
                .and_then(|text| extract_json_object(&text));
            self.absorb(result, eval);
        } else {
            let generator = Arc::clone(generator);
            self.flight.spawn(move || {
                generator
                    .generate(&prompt)
                    .and_then(|text| extract_json_object(&text))
            });
        }
    }

    /// Apply a finished refresh. Unknown goal names are skipped (the other
    /// field still applies); transport and parse errors leave goals as-is.
    fn absorb(&mut self, result: Result<Value, LlmError>, eval: &mut StrategicEvaluator) {
        match result {
            Ok(json) => {
                let primary = json
                    .get("primary_goal")
                    .and_then(Value::as_str)
                    .and_then(StrategicGoal::parse);
                let secondary = json
                    .get("secondary_goal")
                    .and_then(Value::as_str)
                    .and_then(StrategicGoal::parse);

                let new_primary = primary.unwrap_or(eval.primary_goal());
                let new_secondary = secondary.unwrap_or(eval.secondary_goal());
                if new_primary != eval.primary_goal() {
                    debug!(
                        "primary goal: {} -> {}",
                        eval.primary_goal().name(),
                        new_primary.name()
                    );
                }
                eval.set_goals(new_primary, new_secondary);
                self.health.record_success();
            }
            Err(err) => {
                warn!("goal refresh failed: {err}");
                self.errors += 1;
                self.health.record_failure();
            }
        }
    }
}

/// MCTS agent with model-supplied priors and goals
pub struct SearchAgent {
    display: String,
    generator: Arc<dyn TextGenerator + Send + Sync>,
    config: SearchConfig,
    priors: PolicyPriorCache,
    eval: StrategicEvaluator,
    goals: GoalController,
    rng: ChaCha8Rng,
    total_playouts: u64,
    total_cycles: u64,
    total_actions: u64,
    total_time_ms: u64,
    max_branching: usize,
}

impl SearchAgent {
    pub fn new(generator: Arc<dyn TextGenerator + Send + Sync>, config: SearchConfig) -> Self {
        let display = format!("{} (Search+LLM)", generator.model_name());
        Self {
            display,
            priors: PolicyPriorCache::new(config.prior_interval),
            goals: GoalController::new(config.goal_interval),
            eval: StrategicEvaluator::default(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            generator,
            config,
            total_playouts: 0,
            total_cycles: 0,
            total_actions: 0,
            total_time_ms: 0,
            max_branching: 0,
        }
    }

    pub fn evaluator(&self) -> &StrategicEvaluator {
        &self.eval
    }

    pub fn priors(&self) -> &PolicyPriorCache {
        &self.priors
    }

    pub fn goal_consultations(&self) -> u32 {
        self.goals.consultations
    }

    pub fn goal_errors(&self) -> u32 {
        self.goals.errors
    }
}

impl Agent for SearchAgent {
    fn name(&self) -> &str {
        &self.display
    }

    fn get_action(&mut self, side: Side, state: &GameState) -> PlayerAction {
        if !state.can_act(side) {
            return PlayerAction::empty();
        }

        // Refreshes happen here, never inside the search loop
        self.priors.maybe_refresh(&self.generator, state);
        self.goals
            .maybe_refresh(&self.generator, side, state, self.config.tick_cap, &mut self.eval);

        match run_search(state, side, &self.config, &self.priors, &self.eval, &mut self.rng) {
            Ok(outcome) => {
                self.total_playouts += outcome.iterations;
                self.total_cycles += 1;
                self.total_actions += 1;
                self.total_time_ms += outcome.elapsed.as_millis() as u64;
                self.max_branching = self.max_branching.max(outcome.max_branching);
                outcome.action
            }
            Err(err) => {
                warn!("search failed, returning empty action: {err}");
                PlayerAction::empty()
            }
        }
    }

    fn reset(&mut self) {
        self.priors = PolicyPriorCache::new(self.config.prior_interval);
        self.goals = GoalController::new(self.config.goal_interval);
        self.eval = StrategicEvaluator::default();
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.total_playouts = 0;
        self.total_cycles = 0;
        self.total_actions = 0;
        self.total_time_ms = 0;
        self.max_branching = 0;
    }

    fn statistics(&self) -> String {
        let per_action = if self.total_actions > 0 {
            self.total_playouts as f64 / self.total_actions as f64
        } else {
            0.0
        };
        let avg_ms = if self.total_cycles > 0 {
            self.total_time_ms as f64 / self.total_cycles as f64
        } else {
            0.0
        };
        format!(
            "playouts={} per_action={:.1} avg_cycle_ms={:.1} max_branching={} goals: {} consultations, {} errors, channel {}; {}",
            self.total_playouts,
            per_action,
            avg_ms,
            self.max_branching,
            self.goals.consultations,
            self.goals.errors,
            self.goals.health.describe(),
            self.priors.describe(),
        )
    }
}

/// Summarize the position and ask for a primary/secondary goal pair
fn build_goal_prompt(
    side: Side,
    state: &GameState,
    tick_cap: u32,
    eval: &StrategicEvaluator,
) -> String {
    let enemy = side.opponent();
    let count = |s: Side, pred: &dyn Fn(UnitKind) -> bool| {
        state.units_of(s).filter(|u| pred(u.kind)).count()
    };
    let workers = |s: Side| count(s, &|k: UnitKind| k.can_harvest());
    let military = |s: Side| count(s, &|k: UnitKind| k.is_military());
    let bases = |s: Side| count(s, &|k: UnitKind| k.is_stockpile());
    let barracks = |s: Side| count(s, &|k: UnitKind| k == UnitKind::Barracks);

    let cap = tick_cap.max(1);
    let phase = if state.tick() < cap / 4 {
        "EARLY"
    } else if state.tick() < cap * 3 / 4 {
        "MID"
    } else {
        "LATE"
    };

    let mut p = String::new();
    p.push_str("You are a strategic advisor for an RTS game using tree search with policy priors.\n\n");
    p.push_str("Select strategic goals to guide the search.\n\n");
    p.push_str("GAME STATE:\n");
    p.push_str(&format!("- Phase: {phase}\n"));
    p.push_str(&format!("- Resources: {}\n", state.resources(side)));
    p.push_str(&format!(
        "- Your units: {} workers, {} military, {} bases, {} barracks\n",
        workers(side),
        military(side),
        bases(side),
        barracks(side)
    ));
    p.push_str(&format!(
        "- Enemy: {} workers, {} military, {} bases\n\n",
        workers(enemy),
        military(enemy),
        bases(enemy)
    ));
    p.push_str("GOALS:\n");
    p.push_str("- EXPAND_ECONOMY: resource gathering and worker production\n");
    p.push_str("- BUILD_ARMY: military unit production\n");
    p.push_str("- ATTACK_BASE: focus on destroying the enemy base\n");
    p.push_str("- ATTACK_WORKERS: kill enemy workers\n");
    p.push_str("- DEFEND: protect your own base\n");
    p.push_str("- CONTROL_RESOURCES: control resource nodes\n\n");
    p.push_str(&format!(
        "Current goals: primary={}, secondary={}\n\n",
        eval.primary_goal().name(),
        eval.secondary_goal().name()
    ));
    p.push_str("Reply with JSON:\n");
    p.push_str("{\"primary_goal\": \"BUILD_ARMY\", \"secondary_goal\": \"EXPAND_ECONOMY\"}\n");
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priors::{PriorTable, Situation};
    use gridwar_sim::ActionKind;
    use std::time::{Duration, Instant};

    struct StaticGenerator {
        reply: Result<String, String>,
    }

    impl TextGenerator for StaticGenerator {
        fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(LlmError::Transport(e.clone())),
            }
        }

        fn model_name(&self) -> &str {
            "static-model"
        }
    }

    fn arc_gen(reply: Result<&str, &str>) -> Arc<dyn TextGenerator + Send + Sync> {
        Arc::new(StaticGenerator {
            reply: reply.map(String::from).map_err(String::from),
        })
    }

    fn advance_ticks(state: &mut GameState, n: u32) {
        for _ in 0..n {
            state.advance(&PlayerAction::empty(), &PlayerAction::empty());
        }
    }

    #[test]
    fn test_turn_within_budget_despite_dead_backend() {
        let generator = arc_gen(Err("connection refused"));
        let config = SearchConfig {
            time_budget_ms: 200,
            ..SearchConfig::default()
        };
        let mut agent = SearchAgent::new(generator, config);
        let state = GameState::bases_workers_8x8();

        let started = Instant::now();
        let action = agent.get_action(Side::P0, &state);
        let wall = started.elapsed();

        assert!(wall < Duration::from_millis(250), "took {wall:?}");
        assert!(!action.is_empty());
    }

    #[test]
    fn test_first_goal_refresh_seeds_goals() {
        let generator = arc_gen(Ok(
            r#"{"primary_goal": "ATTACK_BASE", "secondary_goal": "BUILD_ARMY"}"#,
        ));
        let config = SearchConfig {
            time_budget_ms: 10,
            ..SearchConfig::default()
        };
        let mut agent = SearchAgent::new(generator, config);
        let state = GameState::bases_workers_8x8();

        let _ = agent.get_action(Side::P0, &state);
        assert_eq!(agent.evaluator().primary_goal(), StrategicGoal::AttackBase);
        assert_eq!(agent.evaluator().secondary_goal(), StrategicGoal::BuildArmy);
        assert_eq!(agent.goal_consultations(), 1);
    }

    #[test]
    fn test_unknown_goal_skipped_other_kept() {
        let generator = arc_gen(Ok(
            r#"{"primary_goal": "CONQUER_GALAXY", "secondary_goal": "DEFEND"}"#,
        ));
        let config = SearchConfig {
            time_budget_ms: 10,
            ..SearchConfig::default()
        };
        let mut agent = SearchAgent::new(generator, config);
        let state = GameState::bases_workers_8x8();

        let before = agent.evaluator().primary_goal();
        let _ = agent.get_action(Side::P0, &state);
        assert_eq!(agent.evaluator().primary_goal(), before);
        assert_eq!(agent.evaluator().secondary_goal(), StrategicGoal::Defend);
    }

    #[test]
    fn test_malformed_refreshes_degrade_and_leave_priors_untouched() {
        // The model keeps answering prose: every refresh is a miss, the cache
        // keeps its built-in defaults and the channels degrade after three
        // consecutive failures
        let generator = arc_gen(Ok("I am sorry, I cannot help with that."));
        let config = SearchConfig {
            time_budget_ms: 5,
            prior_interval: 1,
            goal_interval: 1,
            ..SearchConfig::default()
        };
        let mut agent = SearchAgent::new(generator, config);
        let mut state = GameState::bases_workers_8x8();

        for _ in 0..12 {
            let _ = agent.get_action(Side::P0, &state);
            advance_ticks(&mut state, 1);
            // Allow the background prior workers to finish
            std::thread::sleep(Duration::from_millis(10));
        }

        assert!(agent.priors().errors() >= 3, "errors={}", agent.priors().errors());
        assert!(agent.priors().is_degraded());
        assert!(agent.goal_errors() >= 3);
        assert!(agent.statistics().contains("DEGRADED"));

        // Built-in defaults untouched
        let defaults = PriorTable::default();
        assert_eq!(
            agent.priors().table().weight(Situation::BaseEconomy, ActionKind::Produce),
            defaults.weight(Situation::BaseEconomy, ActionKind::Produce)
        );
    }

    #[test]
    fn test_goal_window_prevents_repeat_consultations() {
        let generator = arc_gen(Ok(r#"{"primary_goal": "DEFEND"}"#));
        let config = SearchConfig {
            time_budget_ms: 5,
            ..SearchConfig::default()
        };
        let mut agent = SearchAgent::new(generator, config);
        let mut state = GameState::bases_workers_8x8();

        let _ = agent.get_action(Side::P0, &state);
        advance_ticks(&mut state, 10);
        let _ = agent.get_action(Side::P0, &state);

        // Window is 500 ticks: still one consultation
        assert_eq!(agent.goal_consultations(), 1);
    }
}

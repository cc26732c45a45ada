//! Baseline opponents

use gridwar_sim::{ActionKind, GameState, PlayerAction, Side};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::strategy::StrategyKind;
use crate::Agent;

/// Legal-action sampler biased toward useful actions.
///
/// Doubles as the MCTS playout policy: cheap, stochastic, and strong enough
/// to punish idle play.
pub struct RandomBiased {
    rng: ChaCha8Rng,
    seed: u64,
}

/// Probability of taking a harvest/return/attack/produce action when one exists
const BIAS: f64 = 0.8;

impl RandomBiased {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// One biased joint action for `side`: prefers harvest/return/attack/produce
/// over walking and idling. Shared by the baseline agent and search playouts.
pub fn biased_action<R: Rng>(rng: &mut R, side: Side, state: &GameState) -> PlayerAction {
    let mut pa = PlayerAction::empty();
    for unit in state.units_of(side) {
        let legal = state.legal_actions(unit.id);
        if legal.len() <= 1 {
            continue;
        }
        let preferred: Vec<_> = legal
            .iter()
            .copied()
            .filter(|a| {
                matches!(
                    a.kind(),
                    ActionKind::Harvest
                        | ActionKind::Return
                        | ActionKind::Attack
                        | ActionKind::Produce
                )
            })
            .collect();
        let pick = if !preferred.is_empty() && rng.gen_bool(BIAS) {
            preferred.choose(rng).copied()
        } else {
            legal.choose(rng).copied()
        };
        if let Some(action) = pick {
            pa.push(unit.id, action);
        }
    }
    pa
}

impl Agent for RandomBiased {
    fn name(&self) -> &str {
        "RandomBiased"
    }

    fn get_action(&mut self, side: Side, state: &GameState) -> PlayerAction {
        biased_action(&mut self.rng, side, state)
    }

    fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }
}

/// A rule strategy wrapped as a standalone agent (the opponent ladder)
pub struct ScriptedAgent {
    kind: StrategyKind,
    strategy: Box<dyn crate::strategy::GameStrategy>,
}

impl ScriptedAgent {
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            strategy: kind.build(),
        }
    }
}

impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        self.kind.label()
    }

    fn get_action(&mut self, side: Side, state: &GameState) -> PlayerAction {
        self.strategy.act(side, state)
    }

    fn reset(&mut self) {
        self.strategy = self.kind.build();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_biased_acts_and_is_reproducible() {
        let state = GameState::bases_workers_8x8();
        let mut a = RandomBiased::new(42);
        let mut b = RandomBiased::new(42);

        let pa_a = a.get_action(Side::P0, &state);
        let pa_b = b.get_action(Side::P0, &state);
        assert_eq!(pa_a, pa_b);
        assert!(!pa_a.is_empty(), "base and worker both have choices");
    }

    #[test]
    fn test_random_biased_reset_restores_seed() {
        let state = GameState::bases_workers_8x8();
        let mut agent = RandomBiased::new(7);
        let first = agent.get_action(Side::P0, &state);
        let _ = agent.get_action(Side::P0, &state);
        agent.reset();
        assert_eq!(agent.get_action(Side::P0, &state), first);
    }

    #[test]
    fn test_scripted_agent_wraps_strategy() {
        let state = GameState::bases_workers_8x8();
        let mut agent = ScriptedAgent::new(StrategyKind::WorkerRush);
        assert_eq!(agent.name(), "WorkerRush");
        let pa = agent.get_action(Side::P0, &state);
        assert!(!pa.is_empty());
    }
}

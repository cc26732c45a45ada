//! Stochastic playouts with a fixed lookahead

use rand::Rng;

use gridwar_agents::biased_action;
use gridwar_sim::{GameResult, GameState, PlayerAction, Side};

/// Roll a state forward with biased-random play on both sides until terminal
/// or `lookahead` ticks have passed. Returns the final state.
pub fn rollout<R: Rng>(state: &GameState, lookahead: u32, rng: &mut R) -> GameState {
    let mut current = state.clone();
    let horizon = state.tick() + lookahead;
    while current.result() == GameResult::Ongoing && current.tick() < horizon {
        let p0 = biased_action(rng, Side::P0, &current);
        let p1 = biased_action(rng, Side::P1, &current);
        current.advance(&p0, &p1);
    }
    current
}

/// The opponent model used for tree transitions: one biased joint action.
pub fn opponent_action<R: Rng>(rng: &mut R, side: Side, state: &GameState) -> PlayerAction {
    biased_action(rng, side, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_rollout_respects_lookahead() {
        let state = GameState::bases_workers_8x8();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let end = rollout(&state, 25, &mut rng);
        assert!(end.tick() <= state.tick() + 25);
    }

    #[test]
    fn test_rollout_does_not_mutate_input() {
        let state = GameState::bases_workers_8x8();
        let units_before = state.units().len();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let _ = rollout(&state, 50, &mut rng);
        assert_eq!(state.units().len(), units_before);
        assert_eq!(state.tick(), 0);
    }

    #[test]
    fn test_rollout_stops_at_terminal() {
        // Single worker vs nothing: terminal immediately, rollout is a no-op
        let map = gridwar_sim::GameMap::parse("w .", 5).unwrap();
        let state = GameState::from_map(&map);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let end = rollout(&state, 100, &mut rng);
        assert_eq!(end.tick(), 0);
    }
}

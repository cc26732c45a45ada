//! Epsilon-greedy informed search loop
//!
//! One iteration = selection, expansion, simulation, backpropagation. The
//! loop polls a monotonic clock after every iteration and exits when the
//! wall-clock budget elapses; unreachable states surface as `SearchError`
//! values so the outer loop can stop cleanly instead of panicking.
//!
//! Selection at an internal node: with probability epsilon_0 sample an
//! unexpanded candidate by prior weight; otherwise with probability
//! epsilon_local descend into the child with the best per-unit local value;
//! otherwise the global bandit picks: a uniformly random child with
//! probability epsilon_global (zero by default, so pure greedy), else the
//! child with the best global mean evaluation. Ties break by visit count,
//! then prior weight.

use std::time::{Duration, Instant};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use gridwar_sim::{GameState, PlayerAction, Side};

use crate::eval::StrategicEvaluator;
use crate::priors::PolicyPriorCache;
use crate::rollout::{opponent_action, rollout};
use crate::tree::{Candidate, Node, NodeId, Tree};
use crate::SearchConfig;

/// Per-tick discount so earlier wins evaluate higher
const TIME_DISCOUNT: f64 = 0.99;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("selection found no child to descend into")]
    NoLeaf,
}

/// Result of one search: the chosen action plus statistics and the tree
#[derive(Debug)]
pub struct SearchOutcome {
    pub action: PlayerAction,
    pub iterations: u64,
    pub root_visits: u32,
    pub best_child_visits: u32,
    pub max_branching: usize,
    pub elapsed: Duration,
    pub tree: Tree,
}

/// Run one budgeted search from `root_state` for `side`.
pub fn run_search(
    root_state: &GameState,
    side: Side,
    config: &SearchConfig,
    priors: &PolicyPriorCache,
    eval: &StrategicEvaluator,
    rng: &mut ChaCha8Rng,
) -> Result<SearchOutcome, SearchError> {
    let started = Instant::now();
    let budget = Duration::from_millis(config.time_budget_ms);

    let root_candidates = sample_candidates(root_state, side, priors, rng, config.candidate_width);
    let max_branching = root_candidates.len();
    let mut tree = Tree::new(Node::new(root_state.clone(), None, None, 0, root_candidates));
    let mut iterations = 0u64;

    while started.elapsed() < budget {
        if let Some(cap) = config.iteration_cap {
            if iterations >= cap {
                break;
            }
        }
        if tree.get(NodeId::ROOT).candidates.is_empty() {
            break;
        }
        run_iteration(&mut tree, root_state.tick(), side, config, priors, eval, rng)?;
        iterations += 1;
    }

    let root = tree.get(NodeId::ROOT);
    let best = root.expanded_children().max_by(|a, b| {
        let na = tree.get(a.1);
        let nb = tree.get(b.1);
        na.visits.cmp(&nb.visits).then(
            na.mean_eval()
                .partial_cmp(&nb.mean_eval())
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });
    let (action, best_child_visits) = match best {
        Some((idx, id)) => (root.candidates[idx].action.clone(), tree.get(id).visits),
        None => (PlayerAction::empty(), 0),
    };
    let root_visits = root.visits;

    Ok(SearchOutcome {
        action,
        iterations,
        root_visits,
        best_child_visits,
        max_branching,
        elapsed: started.elapsed(),
        tree,
    })
}

/// One selection/expansion/simulation/backpropagation cycle
fn run_iteration(
    tree: &mut Tree,
    root_tick: u32,
    side: Side,
    config: &SearchConfig,
    priors: &PolicyPriorCache,
    eval: &StrategicEvaluator,
    rng: &mut ChaCha8Rng,
) -> Result<(), SearchError> {
    // Selection and expansion
    let mut current = NodeId::ROOT;
    let leaf = loop {
        let node = tree.get(current);
        if node.is_terminal() || node.depth >= config.max_depth || node.candidates.is_empty() {
            break current;
        }

        let unexpanded = node.unexpanded();
        let has_children = node.expanded_children().next().is_some();
        let expand =
            !unexpanded.is_empty() && (!has_children || rng.gen::<f64>() < config.epsilon_0);

        if expand {
            let idx = pick_weighted(&unexpanded, node, rng);
            let ours = node.candidates[idx].action.clone();
            let mut child_state = node.state.clone();
            let theirs = opponent_action(rng, side.opponent(), &child_state);
            match side {
                Side::P0 => child_state.advance(&ours, &theirs),
                Side::P1 => child_state.advance(&theirs, &ours),
            }
            let child_candidates =
                sample_candidates(&child_state, side, priors, rng, config.candidate_width);
            break tree.add_child(current, idx, child_state, child_candidates);
        }

        current = select_child(tree, current, config, rng).ok_or(SearchError::NoLeaf)?;
    };

    // Simulation
    let final_state = rollout(&tree.get(leaf).state, config.lookahead, rng);
    let elapsed_ticks = final_state.tick().saturating_sub(root_tick);
    let value = eval.evaluate(side, side.opponent(), &final_state)
        * TIME_DISCOUNT.powf(elapsed_ticks as f64 / 10.0);

    // Backpropagation
    tree.backpropagate(leaf, value);
    Ok(())
}

/// Sample an unexpanded candidate proportionally to its prior weight
fn pick_weighted(unexpanded: &[usize], node: &Node, rng: &mut ChaCha8Rng) -> usize {
    let total: f64 = unexpanded.iter().map(|i| node.candidates[*i].weight).sum();
    if total <= 0.0 {
        return unexpanded[0];
    }
    let mut r = rng.gen::<f64>() * total;
    for &i in unexpanded {
        r -= node.candidates[i].weight;
        if r <= 0.0 {
            return i;
        }
    }
    *unexpanded.last().expect("non-empty")
}

/// Epsilon-greedy descent among expanded children
fn select_child(
    tree: &Tree,
    id: NodeId,
    config: &SearchConfig,
    rng: &mut ChaCha8Rng,
) -> Option<NodeId> {
    let node = tree.get(id);
    let children: Vec<(usize, NodeId)> = node.expanded_children().collect();
    if children.is_empty() {
        return None;
    }

    let r: f64 = rng.gen();
    let chosen = if r < config.epsilon_local {
        argmax_child(tree, node, &children, |idx, _| node.local_value(idx))
    } else if config.epsilon_global > 0.0 && rng.gen::<f64>() < config.epsilon_global {
        // Global bandit exploration: any child, regardless of value
        children[rng.gen_range(0..children.len())].1
    } else {
        argmax_child(tree, node, &children, |_, child| tree.get(child).mean_eval())
    };
    Some(chosen)
}

/// Best child by `score`, ties broken by visit count then prior weight
fn argmax_child(
    tree: &Tree,
    node: &Node,
    children: &[(usize, NodeId)],
    score: impl Fn(usize, NodeId) -> f64,
) -> NodeId {
    let mut best = children[0];
    let mut best_key = (
        score(best.0, best.1),
        tree.get(best.1).visits,
        node.candidates[best.0].weight,
    );
    for &entry in &children[1..] {
        let key = (
            score(entry.0, entry.1),
            tree.get(entry.1).visits,
            node.candidates[entry.0].weight,
        );
        let better = key.0 > best_key.0
            || (key.0 == best_key.0
                && (key.1 > best_key.1 || (key.1 == best_key.1 && key.2 > best_key.2)));
        if better {
            best = entry;
            best_key = key;
        }
    }
    best.1
}

/// Sample up to `width` distinct joint actions for `side`, one action per
/// unit drawn from its prior distribution; each candidate's weight is the
/// product of its per-unit probabilities, normalized over the sampled set.
pub fn sample_candidates(
    state: &GameState,
    side: Side,
    priors: &PolicyPriorCache,
    rng: &mut ChaCha8Rng,
    width: usize,
) -> Vec<Candidate> {
    let units: Vec<(gridwar_sim::UnitId, Vec<gridwar_sim::UnitAction>, Vec<f64>)> = state
        .units_of(side)
        .map(|u| {
            let legal = state.legal_actions(u.id);
            let dist = priors.distribution(u, state, &legal);
            (u.id, legal, dist)
        })
        .filter(|(_, legal, _)| !legal.is_empty())
        .collect();
    if units.is_empty() {
        return Vec::new();
    }

    let mut out: Vec<Candidate> = Vec::with_capacity(width);
    for _ in 0..width * 2 {
        if out.len() >= width {
            break;
        }
        let mut action = PlayerAction::empty();
        let mut weight = 1.0;
        for (id, legal, dist) in &units {
            let idx = sample_index(dist, rng);
            action.push(*id, legal[idx]);
            weight *= dist[idx];
        }
        if out.iter().any(|c| c.action == action) {
            continue;
        }
        out.push(Candidate {
            action,
            weight,
            child: None,
        });
    }

    let total: f64 = out.iter().map(|c| c.weight).sum();
    if total > 0.0 {
        for c in &mut out {
            c.weight /= total;
        }
    } else if !out.is_empty() {
        let uniform = 1.0 / out.len() as f64;
        for c in &mut out {
            c.weight = uniform;
        }
    }
    out
}

fn sample_index(dist: &[f64], rng: &mut ChaCha8Rng) -> usize {
    let mut r = rng.gen::<f64>();
    for (i, p) in dist.iter().enumerate() {
        r -= p;
        if r <= 0.0 {
            return i;
        }
    }
    dist.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn quick_config() -> SearchConfig {
        SearchConfig {
            time_budget_ms: 50,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_budget_respected() {
        let state = GameState::bases_workers_8x8();
        let priors = PolicyPriorCache::new(300);
        let eval = StrategicEvaluator::default();
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        let config = SearchConfig {
            time_budget_ms: 200,
            ..SearchConfig::default()
        };
        let started = Instant::now();
        let outcome = run_search(&state, Side::P0, &config, &priors, &eval, &mut rng).unwrap();
        let wall = started.elapsed();

        assert!(wall < Duration::from_millis(250), "took {wall:?}");
        assert!(outcome.root_visits > 0);
        assert!(outcome.best_child_visits > 0);
        assert!(!outcome.action.is_empty());
    }

    #[test]
    fn test_visit_invariant() {
        let state = GameState::bases_workers_8x8();
        let priors = PolicyPriorCache::new(300);
        let eval = StrategicEvaluator::default();
        let mut rng = ChaCha8Rng::seed_from_u64(10);

        let outcome =
            run_search(&state, Side::P0, &quick_config(), &priors, &eval, &mut rng).unwrap();

        // Every node: visits >= sum of children's visits
        for i in 0..outcome.tree.len() {
            let node = outcome.tree.get(NodeId(i));
            let child_sum: u32 = node
                .expanded_children()
                .map(|(_, id)| outcome.tree.get(id).visits)
                .sum();
            assert!(
                node.visits >= child_sum,
                "node {i}: {} < {child_sum}",
                node.visits
            );
        }
    }

    #[test]
    fn test_no_units_yields_empty_action() {
        // P0 fields nothing: the root is terminal and the search returns the
        // empty action without spinning
        let map = gridwar_sim::GameMap::parse("W .", 5).unwrap();
        let state = GameState::from_map(&map);
        let priors = PolicyPriorCache::new(300);
        let eval = StrategicEvaluator::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let outcome =
            run_search(&state, Side::P0, &quick_config(), &priors, &eval, &mut rng).unwrap();
        assert!(outcome.action.is_empty());
        assert_eq!(outcome.best_child_visits, 0);
    }

    #[test]
    fn test_iteration_cap() {
        let state = GameState::bases_workers_8x8();
        let priors = PolicyPriorCache::new(300);
        let eval = StrategicEvaluator::default();
        let mut rng = ChaCha8Rng::seed_from_u64(12);

        let config = SearchConfig {
            time_budget_ms: 10_000,
            iteration_cap: Some(5),
            ..SearchConfig::default()
        };
        let outcome = run_search(&state, Side::P0, &config, &priors, &eval, &mut rng).unwrap();
        assert_eq!(outcome.iterations, 5);
    }

    #[test]
    fn test_global_exploration_keeps_invariants() {
        // With full global exploration the descent is uniformly random; the
        // search must still terminate and keep its visit accounting intact
        let state = GameState::bases_workers_8x8();
        let priors = PolicyPriorCache::new(300);
        let eval = StrategicEvaluator::default();
        let mut rng = ChaCha8Rng::seed_from_u64(14);

        let config = SearchConfig {
            time_budget_ms: 50,
            epsilon_global: 1.0,
            ..SearchConfig::default()
        };
        let outcome = run_search(&state, Side::P0, &config, &priors, &eval, &mut rng).unwrap();

        assert!(outcome.root_visits > 0);
        for i in 0..outcome.tree.len() {
            let node = outcome.tree.get(NodeId(i));
            let child_sum: u32 = node
                .expanded_children()
                .map(|(_, id)| outcome.tree.get(id).visits)
                .sum();
            assert!(node.visits >= child_sum);
        }
    }

    #[test]
    fn test_sample_candidates_distinct_and_normalized() {
        let state = GameState::bases_workers_8x8();
        let priors = PolicyPriorCache::new(300);
        let mut rng = ChaCha8Rng::seed_from_u64(13);

        let candidates = sample_candidates(&state, Side::P0, &priors, &mut rng, 12);
        assert!(!candidates.is_empty());
        assert!(candidates.len() <= 12);

        for (i, a) in candidates.iter().enumerate() {
            for b in candidates.iter().skip(i + 1) {
                assert_ne!(a.action, b.action, "duplicate joint action sampled");
            }
        }
        let total: f64 = candidates.iter().map(|c| c.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}

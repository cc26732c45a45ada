//! Search tree - arena allocation, candidate actions, statistics
//!
//! Nodes live in a flat vector and refer to each other by index, so the tree
//! is cycle-free by construction and dropped in one shot when a new search
//! starts. Each node carries a bounded list of candidate joint actions with
//! their policy-prior weights; children hang off expanded candidates.

use std::collections::HashMap;

use gridwar_sim::{GameResult, GameState, PlayerAction, UnitAction, UnitId};

/// Index into the tree arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

/// A sampled joint action at a node, with its product-normalized prior weight
#[derive(Clone, Debug)]
pub struct Candidate {
    pub action: PlayerAction,
    pub weight: f64,
    pub child: Option<NodeId>,
}

/// Per-(unit, action) statistics for the local-value selection branch
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStat {
    pub visits: u32,
    pub accum: f64,
}

impl LocalStat {
    pub fn mean(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.accum / self.visits as f64
        }
    }
}

/// One node of the search tree
#[derive(Debug)]
pub struct Node {
    pub state: GameState,
    pub parent: Option<NodeId>,
    /// Candidate index in the parent that produced this node
    pub incoming: Option<usize>,
    pub depth: u32,
    pub candidates: Vec<Candidate>,
    pub visits: u32,
    pub accum_eval: f64,
    /// Cached terminal result, if the state is decided
    pub terminal: Option<GameResult>,
    /// Local per-unit action statistics, fed by backpropagation
    local: HashMap<(UnitId, UnitAction), LocalStat>,
}

impl Node {
    pub fn new(
        state: GameState,
        parent: Option<NodeId>,
        incoming: Option<usize>,
        depth: u32,
        candidates: Vec<Candidate>,
    ) -> Self {
        let result = state.result();
        let terminal = (result != GameResult::Ongoing).then_some(result);
        Self {
            state,
            parent,
            incoming,
            depth,
            candidates: if terminal.is_some() { Vec::new() } else { candidates },
            visits: 0,
            accum_eval: 0.0,
            terminal,
            local: HashMap::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn mean_eval(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.accum_eval / self.visits as f64
        }
    }

    /// Candidate indices without a child yet
    pub fn unexpanded(&self) -> Vec<usize> {
        self.candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.child.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn expanded_children(&self) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.candidates
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.child.map(|id| (i, id)))
    }

    /// Sum of per-unit mean values for a candidate's assignments
    pub fn local_value(&self, candidate: usize) -> f64 {
        self.candidates[candidate]
            .action
            .assignments
            .iter()
            .map(|key| self.local.get(key).map(LocalStat::mean).unwrap_or(0.0))
            .sum()
    }

    fn record_local(&mut self, candidate: usize, eval: f64) {
        // Candidate lists are fixed after creation, so the index stays valid
        let assignments = self.candidates[candidate].action.assignments.clone();
        for key in assignments {
            let stat = self.local.entry(key).or_default();
            stat.visits += 1;
            stat.accum += eval;
        }
    }
}

/// Arena-backed search tree
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new(root: Node) -> Self {
        Self { nodes: vec![root] }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Attach a child under `parent` at `candidate` and return its id
    pub fn add_child(
        &mut self,
        parent: NodeId,
        candidate: usize,
        state: GameState,
        candidates: Vec<Candidate>,
    ) -> NodeId {
        let depth = self.get(parent).depth + 1;
        let id = NodeId(self.nodes.len());
        self.nodes
            .push(Node::new(state, Some(parent), Some(candidate), depth, candidates));
        self.get_mut(parent).candidates[candidate].child = Some(id);
        id
    }

    /// Update visit counts, accumulated evaluation and the parents' local
    /// statistics along the leaf-to-root path.
    pub fn backpropagate(&mut self, leaf: NodeId, eval: f64) {
        let mut current = Some(leaf);
        while let Some(id) = current {
            let (parent, incoming) = {
                let node = self.get_mut(id);
                node.visits += 1;
                node.accum_eval += eval;
                (node.parent, node.incoming)
            };
            if let (Some(pid), Some(candidate)) = (parent, incoming) {
                self.get_mut(pid).record_local(candidate, eval);
            }
            current = parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwar_sim::Side;

    fn leaf_candidates() -> Vec<Candidate> {
        vec![
            Candidate {
                action: PlayerAction::empty(),
                weight: 0.7,
                child: None,
            },
            Candidate {
                action: PlayerAction::empty(),
                weight: 0.3,
                child: None,
            },
        ]
    }

    fn test_tree() -> Tree {
        let state = GameState::bases_workers_8x8();
        Tree::new(Node::new(state, None, None, 0, leaf_candidates()))
    }

    #[test]
    fn test_new_tree_has_root() {
        let tree = test_tree();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(NodeId::ROOT).depth, 0);
        assert!(!tree.get(NodeId::ROOT).is_terminal());
        assert_eq!(tree.get(NodeId::ROOT).unexpanded(), vec![0, 1]);
    }

    #[test]
    fn test_add_child_links_candidate() {
        let mut tree = test_tree();
        let child_state = tree.get(NodeId::ROOT).state.clone();
        let child = tree.add_child(NodeId::ROOT, 0, child_state, leaf_candidates());

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get(child).parent, Some(NodeId::ROOT));
        assert_eq!(tree.get(child).depth, 1);
        assert_eq!(tree.get(NodeId::ROOT).candidates[0].child, Some(child));
        assert_eq!(tree.get(NodeId::ROOT).unexpanded(), vec![1]);
    }

    #[test]
    fn test_backpropagation_counts() {
        let mut tree = test_tree();
        let child_state = tree.get(NodeId::ROOT).state.clone();
        let a = tree.add_child(NodeId::ROOT, 0, child_state.clone(), leaf_candidates());
        let b = tree.add_child(NodeId::ROOT, 1, child_state, leaf_candidates());

        tree.backpropagate(a, 0.5);
        tree.backpropagate(a, 0.7);
        tree.backpropagate(b, -0.2);

        let root = tree.get(NodeId::ROOT);
        assert_eq!(root.visits, 3);
        assert!((root.accum_eval - 1.0).abs() < 1e-9);
        assert_eq!(tree.get(a).visits, 2);
        assert_eq!(tree.get(b).visits, 1);

        // Invariant: parent visits >= sum of child visits
        let child_sum: u32 = root.expanded_children().map(|(_, id)| tree.get(id).visits).sum();
        assert!(root.visits >= child_sum);
    }

    #[test]
    fn test_local_stats_follow_candidate_assignments() {
        let state = GameState::bases_workers_8x8();
        let worker = state.units_of(Side::P0).next().unwrap().id;
        let mut action = PlayerAction::empty();
        action.push(worker, gridwar_sim::UnitAction::None);

        let candidates = vec![Candidate {
            action,
            weight: 1.0,
            child: None,
        }];
        let mut tree = Tree::new(Node::new(state.clone(), None, None, 0, candidates));
        let child = tree.add_child(NodeId::ROOT, 0, state, Vec::new());
        tree.backpropagate(child, 0.8);

        let root = tree.get(NodeId::ROOT);
        assert!((root.local_value(0) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_terminal_node_drops_candidates() {
        // A state with a single side alive is terminal
        let map = gridwar_sim::GameMap::parse("w .", 5).unwrap();
        let state = GameState::from_map(&map);
        let node = Node::new(state, None, None, 0, leaf_candidates());
        assert!(node.is_terminal());
        assert!(node.candidates.is_empty());
    }
}

//! Game state, legal action enumeration, and tick resolution
//!
//! `advance` is the only mutating entry point: it takes one joint action per
//! side and resolves a single tick deterministically (attacks, harvests,
//! returns, production, then movement; units processed in id order within
//! each phase). Invalid or conflicting assignments are dropped, never errors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::grid::{Dir, Pos, DIRS};
use crate::map::GameMap;
use crate::units::{stats, UnitKind};

pub type UnitId = u32;

/// One of the two playing sides
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    P0,
    P1,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::P0 => Side::P1,
            Side::P1 => Side::P0,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::P0 => 0,
            Side::P1 => 1,
        }
    }

    pub fn from_index(i: usize) -> Option<Side> {
        match i {
            0 => Some(Side::P0),
            1 => Some(Side::P1),
            _ => None,
        }
    }
}

/// A unit on the board (or a neutral resource node, `owner == None`)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub kind: UnitKind,
    pub owner: Option<Side>,
    pub pos: Pos,
    pub hp: i32,
    /// Resources carried by a harvester
    pub carried: u32,
    /// Remaining amount on a resource node
    pub amount: u32,
}

impl Unit {
    pub fn max_hp(&self) -> i32 {
        stats(self.kind).max_hp
    }
}

/// A single unit's action for one tick
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitAction {
    None,
    Move(Dir),
    Harvest(Dir),
    Return(Dir),
    Produce(Dir, UnitKind),
    Attack(Pos),
}

impl UnitAction {
    /// Coarse classification used by policy priors
    pub fn kind(&self) -> ActionKind {
        match self {
            UnitAction::None => ActionKind::None,
            UnitAction::Move(_) => ActionKind::Move,
            UnitAction::Harvest(_) => ActionKind::Harvest,
            UnitAction::Return(_) => ActionKind::Return,
            UnitAction::Produce(_, _) => ActionKind::Produce,
            UnitAction::Attack(_) => ActionKind::Attack,
        }
    }
}

/// The six action classes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    None,
    Move,
    Harvest,
    Return,
    Produce,
    Attack,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::None,
        ActionKind::Move,
        ActionKind::Harvest,
        ActionKind::Return,
        ActionKind::Produce,
        ActionKind::Attack,
    ];

    /// Canonical lowercase name (prior-table keys, prompts)
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::None => "none",
            ActionKind::Move => "move",
            ActionKind::Harvest => "harvest",
            ActionKind::Return => "return",
            ActionKind::Produce => "produce",
            ActionKind::Attack => "attack",
        }
    }

    pub fn parse(s: &str) -> Option<ActionKind> {
        ActionKind::ALL.into_iter().find(|k| k.name() == s.to_ascii_lowercase())
    }
}

/// Joint action for one side: per-unit assignments for a single tick
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerAction {
    pub assignments: Vec<(UnitId, UnitAction)>,
}

impl PlayerAction {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn push(&mut self, id: UnitId, action: UnitAction) {
        self.assignments.push((id, action));
    }

    pub fn get(&self, id: UnitId) -> Option<UnitAction> {
        self.assignments
            .iter()
            .find(|(uid, _)| *uid == id)
            .map(|(_, a)| *a)
    }
}

/// Terminal status of a game
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    Ongoing,
    Winner(Side),
    Draw,
}

/// Full game state (clone for lookahead)
#[derive(Clone, Debug)]
pub struct GameState {
    width: i32,
    height: i32,
    walls: Vec<bool>,
    units: Vec<Unit>,
    resources: [u32; 2],
    tick: u32,
    next_id: UnitId,
}

impl GameState {
    /// Build the initial state from a map
    pub fn from_map(map: &GameMap) -> Self {
        let mut state = Self {
            width: map.width,
            height: map.height,
            walls: map.walls.clone(),
            units: Vec::new(),
            resources: [map.starting_resources; 2],
            tick: 0,
            next_id: 0,
        };
        for placement in &map.units {
            state.spawn(placement.kind, placement.owner, placement.pos, placement.amount);
        }
        state
    }

    /// Default two-base map used by tests and when no map file is given
    pub fn bases_workers_8x8() -> Self {
        Self::from_map(&GameMap::bases_workers_8x8())
    }

    fn spawn(&mut self, kind: UnitKind, owner: Option<Side>, pos: Pos, amount: u32) -> UnitId {
        let id = self.next_id;
        self.next_id += 1;
        self.units.push(Unit {
            id,
            kind,
            owner,
            pos,
            hp: stats(kind).max_hp,
            carried: 0,
            amount,
        });
        id
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn units_of(&self, side: Side) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(move |u| u.owner == Some(side))
    }

    /// Stockpiled resources for a side
    pub fn resources(&self, side: Side) -> u32 {
        self.resources[side.index()]
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn is_wall(&self, pos: Pos) -> bool {
        self.in_bounds(pos) && self.walls[(pos.y * self.width + pos.x) as usize]
    }

    pub fn unit_at(&self, pos: Pos) -> Option<&Unit> {
        self.units.iter().find(|u| u.pos == pos)
    }

    /// Cell exists, has no wall and no unit
    pub fn is_free(&self, pos: Pos) -> bool {
        self.in_bounds(pos) && !self.is_wall(pos) && self.unit_at(pos).is_none()
    }

    /// Closest resource node to `from` (lowest id on ties)
    pub fn nearest_resource(&self, from: Pos) -> Option<&Unit> {
        self.units
            .iter()
            .filter(|u| u.kind.is_resource() && u.amount > 0)
            .min_by_key(|u| (u.pos.manhattan(from), u.id))
    }

    /// Closest enemy unit of `side` to `from` (lowest id on ties)
    pub fn nearest_enemy(&self, side: Side, from: Pos) -> Option<&Unit> {
        self.units
            .iter()
            .filter(|u| u.owner == Some(side.opponent()))
            .min_by_key(|u| (u.pos.manhattan(from), u.id))
    }

    /// Win/loss query: a side with no units has lost
    pub fn result(&self) -> GameResult {
        let p0_alive = self.units.iter().any(|u| u.owner == Some(Side::P0));
        let p1_alive = self.units.iter().any(|u| u.owner == Some(Side::P1));
        match (p0_alive, p1_alive) {
            (true, true) => GameResult::Ongoing,
            (true, false) => GameResult::Winner(Side::P0),
            (false, true) => GameResult::Winner(Side::P1),
            (false, false) => GameResult::Draw,
        }
    }

    /// Does this side have any unit with a choice beyond idling?
    pub fn can_act(&self, side: Side) -> bool {
        self.units_of(side)
            .any(|u| self.legal_actions(u.id).iter().any(|a| *a != UnitAction::None))
    }

    // ========================================================================
    // Legal action enumeration
    // ========================================================================

    /// Enumerate legal actions for a unit. Neutral nodes and unknown ids get
    /// an empty set; every live owned unit can at least idle.
    pub fn legal_actions(&self, id: UnitId) -> Vec<UnitAction> {
        let Some(unit) = self.unit(id) else {
            return Vec::new();
        };
        let Some(side) = unit.owner else {
            return Vec::new();
        };
        let st = stats(unit.kind);
        let mut actions = vec![UnitAction::None];

        if !unit.kind.is_building() {
            for dir in DIRS {
                if self.is_free(unit.pos.step(dir)) {
                    actions.push(UnitAction::Move(dir));
                }
            }
        }

        if unit.kind.can_harvest() {
            if unit.carried == 0 {
                for dir in DIRS {
                    if let Some(target) = self.unit_at(unit.pos.step(dir)) {
                        if target.kind.is_resource() && target.amount > 0 {
                            actions.push(UnitAction::Harvest(dir));
                        }
                    }
                }
            } else {
                for dir in DIRS {
                    if let Some(target) = self.unit_at(unit.pos.step(dir)) {
                        if target.kind.is_stockpile() && target.owner == Some(side) {
                            actions.push(UnitAction::Return(dir));
                        }
                    }
                }
            }
        }

        for &kind in st.produces {
            if self.resources[side.index()] >= stats(kind).cost {
                for dir in DIRS {
                    if self.is_free(unit.pos.step(dir)) {
                        actions.push(UnitAction::Produce(dir, kind));
                    }
                }
            }
        }

        if st.attack_damage > 0 {
            for target in self.units.iter() {
                if target.owner == Some(side.opponent())
                    && unit.pos.manhattan(target.pos) <= st.attack_range
                {
                    actions.push(UnitAction::Attack(target.pos));
                }
            }
        }

        actions
    }

    // ========================================================================
    // Tick resolution
    // ========================================================================

    /// Resolve one tick from both sides' joint actions.
    ///
    /// Phases: attacks (simultaneous damage, so mutual kills happen), then
    /// harvest, return, production, movement. Within each phase units are
    /// processed in id order; a later unit whose action became invalid
    /// (target died, cell filled) simply loses the action for this tick.
    pub fn advance(&mut self, p0: &PlayerAction, p1: &PlayerAction) {
        let mut assigned: HashMap<UnitId, UnitAction> = HashMap::new();
        for (side, pa) in [(Side::P0, p0), (Side::P1, p1)] {
            for &(id, action) in &pa.assignments {
                let valid_owner = self
                    .unit(id)
                    .map(|u| u.owner == Some(side))
                    .unwrap_or(false);
                if valid_owner {
                    assigned.entry(id).or_insert(action);
                }
            }
        }

        let mut order: Vec<UnitId> = assigned.keys().copied().collect();
        order.sort_unstable();

        self.resolve_attacks(&order, &assigned);
        self.resolve_harvests(&order, &assigned);
        self.resolve_returns(&order, &assigned);
        self.resolve_production(&order, &assigned);
        self.resolve_moves(&order, &assigned);

        self.tick += 1;
    }

    fn resolve_attacks(&mut self, order: &[UnitId], assigned: &HashMap<UnitId, UnitAction>) {
        let mut damage: HashMap<UnitId, i32> = HashMap::new();
        for &id in order {
            let Some(UnitAction::Attack(target_pos)) = assigned.get(&id).copied() else {
                continue;
            };
            let Some(attacker) = self.unit(id) else { continue };
            let st = stats(attacker.kind);
            if st.attack_damage == 0 || attacker.pos.manhattan(target_pos) > st.attack_range {
                continue;
            }
            let Some(target) = self.unit_at(target_pos) else { continue };
            if target.owner.is_none() || target.owner == attacker.owner {
                continue;
            }
            *damage.entry(target.id).or_insert(0) += st.attack_damage;
        }
        for unit in &mut self.units {
            if let Some(d) = damage.get(&unit.id) {
                unit.hp -= d;
            }
        }
        self.units.retain(|u| u.kind.is_resource() || u.hp > 0);
    }

    fn resolve_harvests(&mut self, order: &[UnitId], assigned: &HashMap<UnitId, UnitAction>) {
        for &id in order {
            let Some(UnitAction::Harvest(dir)) = assigned.get(&id).copied() else {
                continue;
            };
            let Some(unit) = self.unit(id) else { continue };
            if !unit.kind.can_harvest() || unit.carried > 0 {
                continue;
            }
            let take = stats(unit.kind).harvest_amount;
            let target_pos = unit.pos.step(dir);
            let Some(node) = self
                .units
                .iter_mut()
                .find(|u| u.pos == target_pos && u.kind.is_resource() && u.amount > 0)
            else {
                continue;
            };
            let taken = take.min(node.amount);
            node.amount -= taken;
            if let Some(worker) = self.units.iter_mut().find(|u| u.id == id) {
                worker.carried += taken;
            }
        }
        self.units.retain(|u| !u.kind.is_resource() || u.amount > 0);
    }

    fn resolve_returns(&mut self, order: &[UnitId], assigned: &HashMap<UnitId, UnitAction>) {
        for &id in order {
            let Some(UnitAction::Return(dir)) = assigned.get(&id).copied() else {
                continue;
            };
            let Some(unit) = self.unit(id) else { continue };
            let (side, carried, drop_pos) = match (unit.owner, unit.carried) {
                (Some(side), carried) if carried > 0 => (side, carried, unit.pos.step(dir)),
                _ => continue,
            };
            let ok = self
                .unit_at(drop_pos)
                .map(|t| t.kind.is_stockpile() && t.owner == Some(side))
                .unwrap_or(false);
            if !ok {
                continue;
            }
            self.resources[side.index()] += carried;
            if let Some(worker) = self.units.iter_mut().find(|u| u.id == id) {
                worker.carried = 0;
            }
        }
    }

    fn resolve_production(&mut self, order: &[UnitId], assigned: &HashMap<UnitId, UnitAction>) {
        for &id in order {
            let Some(UnitAction::Produce(dir, kind)) = assigned.get(&id).copied() else {
                continue;
            };
            let Some(producer) = self.unit(id) else { continue };
            let Some(side) = producer.owner else { continue };
            if !stats(producer.kind).produces.contains(&kind) {
                continue;
            }
            let cost = stats(kind).cost;
            let target = producer.pos.step(dir);
            if self.resources[side.index()] < cost || !self.is_free(target) {
                continue;
            }
            self.resources[side.index()] -= cost;
            self.spawn(kind, Some(side), target, 0);
        }
    }

    fn resolve_moves(&mut self, order: &[UnitId], assigned: &HashMap<UnitId, UnitAction>) {
        for &id in order {
            let Some(UnitAction::Move(dir)) = assigned.get(&id).copied() else {
                continue;
            };
            let Some(unit) = self.unit(id) else { continue };
            if unit.kind.is_building() {
                continue;
            }
            let target = unit.pos.step(dir);
            if !self.is_free(target) {
                continue;
            }
            if let Some(mover) = self.units.iter_mut().find(|u| u.id == id) {
                mover.pos = target;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duel_state() -> GameState {
        // Two workers face to face on an empty strip, a resource behind P0
        let map = GameMap::parse(
            "R w . . W .\n\
             . . . . . .",
            5,
        )
        .unwrap();
        GameState::from_map(&map)
    }

    #[test]
    fn test_initial_state() {
        let state = GameState::bases_workers_8x8();
        assert_eq!(state.tick(), 0);
        assert_eq!(state.result(), GameResult::Ongoing);
        assert_eq!(state.units_of(Side::P0).count(), 2); // base + worker
        assert_eq!(state.units_of(Side::P1).count(), 2);
        assert!(state.units().iter().any(|u| u.kind.is_resource()));
    }

    #[test]
    fn test_legal_actions_total() {
        // Every owned unit maps to a non-empty action set
        let state = GameState::bases_workers_8x8();
        for unit in state.units() {
            let actions = state.legal_actions(unit.id);
            if unit.owner.is_some() {
                assert!(!actions.is_empty(), "unit {:?} has no actions", unit.kind);
                assert!(actions.contains(&UnitAction::None));
            } else {
                assert!(actions.is_empty());
            }
        }
    }

    #[test]
    fn test_base_produces_worker() {
        let mut state = GameState::bases_workers_8x8();
        let base_id = state
            .units_of(Side::P0)
            .find(|u| u.kind == UnitKind::Base)
            .unwrap()
            .id;
        let produce = state
            .legal_actions(base_id)
            .into_iter()
            .find(|a| matches!(a, UnitAction::Produce(_, UnitKind::Worker)))
            .expect("base with starting resources can train a worker");

        let before = state.units_of(Side::P0).count();
        let mut pa = PlayerAction::empty();
        pa.push(base_id, produce);
        let spent = stats(UnitKind::Worker).cost;
        let budget = state.resources(Side::P0);
        state.advance(&pa, &PlayerAction::empty());

        assert_eq!(state.units_of(Side::P0).count(), before + 1);
        assert_eq!(state.resources(Side::P0), budget - spent);
        assert_eq!(state.tick(), 1);
    }

    #[test]
    fn test_harvest_then_return() {
        let map = GameMap::parse("R w b", 5).unwrap();
        let mut state = GameState::from_map(&map);
        let worker_id = state
            .units_of(Side::P0)
            .find(|u| u.kind == UnitKind::Worker)
            .unwrap()
            .id;

        let mut pa = PlayerAction::empty();
        pa.push(worker_id, UnitAction::Harvest(Dir::West));
        state.advance(&pa, &PlayerAction::empty());
        assert_eq!(state.unit(worker_id).unwrap().carried, 1);

        let before = state.resources(Side::P0);
        let mut pa = PlayerAction::empty();
        pa.push(worker_id, UnitAction::Return(Dir::East));
        state.advance(&pa, &PlayerAction::empty());
        assert_eq!(state.unit(worker_id).unwrap().carried, 0);
        assert_eq!(state.resources(Side::P0), before + 1);
    }

    #[test]
    fn test_mutual_kill() {
        let mut state = duel_state();
        let w0 = state.units_of(Side::P0).next().unwrap().id;
        let w1 = state.units_of(Side::P1).next().unwrap().id;

        // March them adjacent, then both attack: workers have 1 hp
        let p0_pos = state.unit(w0).unwrap().pos;
        let mut pa0 = PlayerAction::empty();
        pa0.push(w0, UnitAction::Move(Dir::East));
        state.advance(&pa0, &PlayerAction::empty());
        assert_eq!(state.unit(w0).unwrap().pos, p0_pos.step(Dir::East));

        let mut pa0 = PlayerAction::empty();
        pa0.push(w0, UnitAction::Move(Dir::East));
        state.advance(&pa0, &PlayerAction::empty());

        let p0 = state.unit(w0).unwrap().pos;
        let p1 = state.unit(w1).unwrap().pos;
        assert_eq!(p0.manhattan(p1), 1);

        let mut pa0 = PlayerAction::empty();
        pa0.push(w0, UnitAction::Attack(p1));
        let mut pa1 = PlayerAction::empty();
        pa1.push(w1, UnitAction::Attack(p0));
        state.advance(&pa0, &pa1);

        assert!(state.unit(w0).is_none());
        assert!(state.unit(w1).is_none());
        assert_eq!(state.result(), GameResult::Draw);
    }

    #[test]
    fn test_move_conflict_lower_id_wins() {
        let map = GameMap::parse(
            "w . W\n\
             . . .",
            5,
        )
        .unwrap();
        let mut state = GameState::from_map(&map);
        let w0 = state.units_of(Side::P0).next().unwrap().id;
        let w1 = state.units_of(Side::P1).next().unwrap().id;
        assert!(w0 < w1);

        let contested = Pos::new(1, 0);
        let mut pa0 = PlayerAction::empty();
        pa0.push(w0, UnitAction::Move(Dir::East));
        let mut pa1 = PlayerAction::empty();
        pa1.push(w1, UnitAction::Move(Dir::West));
        state.advance(&pa0, &pa1);

        assert_eq!(state.unit(w0).unwrap().pos, contested);
        assert_eq!(state.unit(w1).unwrap().pos, Pos::new(2, 0));
    }

    #[test]
    fn test_win_by_elimination() {
        let map = GameMap::parse("w W", 5).unwrap();
        let mut state = GameState::from_map(&map);
        let w0 = state.units_of(Side::P0).next().unwrap().id;
        let target = state.units_of(Side::P1).next().unwrap().pos;

        let mut pa0 = PlayerAction::empty();
        pa0.push(w0, UnitAction::Attack(target));
        state.advance(&pa0, &PlayerAction::empty());

        assert_eq!(state.result(), GameResult::Winner(Side::P0));
    }

    #[test]
    fn test_assignments_for_foreign_units_dropped() {
        let mut state = duel_state();
        let w1 = state.units_of(Side::P1).next().unwrap().id;
        let before = state.unit(w1).unwrap().pos;

        // P0 tries to order P1's worker around
        let mut pa0 = PlayerAction::empty();
        pa0.push(w1, UnitAction::Move(Dir::West));
        state.advance(&pa0, &PlayerAction::empty());

        assert_eq!(state.unit(w1).unwrap().pos, before);
    }

    #[test]
    fn test_advance_deterministic() {
        let mut a = GameState::bases_workers_8x8();
        let mut b = GameState::bases_workers_8x8();
        let base = a
            .units_of(Side::P0)
            .find(|u| u.kind == UnitKind::Base)
            .unwrap()
            .id;
        let action = a
            .legal_actions(base)
            .into_iter()
            .find(|x| x.kind() == ActionKind::Produce)
            .unwrap();
        let mut pa = PlayerAction::empty();
        pa.push(base, action);

        a.advance(&pa, &PlayerAction::empty());
        b.advance(&pa, &PlayerAction::empty());

        assert_eq!(a.units().len(), b.units().len());
        assert_eq!(a.resources(Side::P0), b.resources(Side::P0));
    }
}

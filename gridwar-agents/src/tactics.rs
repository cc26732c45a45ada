//! Shared rule-strategy building blocks
//!
//! Strategies compose these helpers; none of them issues more than one action
//! per unit, and all of them tolerate blocked cells and missing targets by
//! simply emitting nothing for that unit.

use gridwar_sim::{
    stats, Dir, GameState, PlayerAction, Pos, Side, Unit, UnitAction, UnitKind, DIRS,
};

use crate::strategy::TargetPriority;

/// Strength weights per unit kind: worker=1, light=2, heavy=4, ranged=2
pub fn unit_strength(kind: UnitKind) -> u32 {
    match kind {
        UnitKind::Worker => 1,
        UnitKind::Light => 2,
        UnitKind::Heavy => 4,
        UnitKind::Ranged => 2,
        _ => 0,
    }
}

/// Summed strength of a side's mobile units
pub fn military_strength(state: &GameState, side: Side) -> u32 {
    state.units_of(side).map(|u| unit_strength(u.kind)).sum()
}

/// Any attacker-capable unit within Manhattan-5 of an enemy unit
pub fn in_combat(state: &GameState, side: Side) -> bool {
    state
        .units_of(side)
        .filter(|u| u.kind.is_combat_capable())
        .any(|u| {
            state
                .units_of(side.opponent())
                .any(|e| u.pos.manhattan(e.pos) <= 5)
        })
}

pub fn count_kind(state: &GameState, side: Side, kind: UnitKind) -> usize {
    state.units_of(side).filter(|u| u.kind == kind).count()
}

pub fn military_count(state: &GameState, side: Side) -> usize {
    state.units_of(side).filter(|u| u.kind.is_military()).count()
}

/// This side's first stockpile position
pub fn home_base(state: &GameState, side: Side) -> Option<Pos> {
    state
        .units_of(side)
        .find(|u| u.kind.is_stockpile())
        .map(|u| u.pos)
}

/// Direction of an adjacent cell whose occupant satisfies `pred`
fn adjacent_dir(state: &GameState, from: Pos, pred: impl Fn(&Unit) -> bool) -> Option<Dir> {
    DIRS.into_iter()
        .find(|dir| state.unit_at(from.step(*dir)).map(&pred).unwrap_or(false))
}

/// A free-cell move that reduces Manhattan distance to `target`; when fully
/// blocked and still far away, any free sidestep.
pub fn move_toward(state: &GameState, unit: &Unit, target: Pos) -> Option<UnitAction> {
    let current = unit.pos.manhattan(target);
    let mut best: Option<(i32, Dir)> = None;
    for dir in DIRS {
        let next = unit.pos.step(dir);
        if !state.is_free(next) {
            continue;
        }
        let d = next.manhattan(target);
        if d < current && best.map(|(bd, _)| d < bd).unwrap_or(true) {
            best = Some((d, dir));
        }
    }
    if let Some((_, dir)) = best {
        return Some(UnitAction::Move(dir));
    }
    if current > 2 {
        return DIRS
            .into_iter()
            .find(|dir| state.is_free(unit.pos.step(*dir)))
            .map(UnitAction::Move);
    }
    None
}

/// Attack the best enemy in range, favouring `priority` targets, then lowest
/// hp, then lowest id.
pub fn best_attack(
    state: &GameState,
    side: Side,
    unit: &Unit,
    priority: Option<TargetPriority>,
) -> Option<UnitAction> {
    let st = stats(unit.kind);
    if st.attack_damage == 0 {
        return None;
    }
    state
        .units_of(side.opponent())
        .filter(|e| unit.pos.manhattan(e.pos) <= st.attack_range)
        .min_by_key(|e| {
            let preferred = match priority {
                Some(TargetPriority::Base) => !e.kind.is_stockpile(),
                Some(TargetPriority::Workers) => !e.kind.can_harvest(),
                Some(TargetPriority::Army) => !e.kind.is_military(),
                None => false,
            };
            (preferred, e.hp, e.id)
        })
        .map(|e| UnitAction::Attack(e.pos))
}

/// Attack in range, otherwise close on `target`
pub fn attack_move(
    state: &GameState,
    side: Side,
    unit: &Unit,
    target: Pos,
    priority: Option<TargetPriority>,
    pa: &mut PlayerAction,
) {
    if let Some(attack) = best_attack(state, side, unit, priority) {
        pa.push(unit.id, attack);
    } else if let Some(step) = move_toward(state, unit, target) {
        pa.push(unit.id, step);
    }
}

/// Preferred assault position for `priority` (nearest matching enemy, falling
/// back to the nearest enemy of any kind).
pub fn pick_target(
    state: &GameState,
    side: Side,
    from: Pos,
    priority: Option<TargetPriority>,
) -> Option<Pos> {
    let matches_priority = |u: &&Unit| match priority {
        Some(TargetPriority::Base) => u.kind.is_stockpile(),
        Some(TargetPriority::Workers) => u.kind.can_harvest(),
        Some(TargetPriority::Army) => u.kind.is_military(),
        None => true,
    };
    state
        .units_of(side.opponent())
        .filter(matches_priority)
        .min_by_key(|u| (u.pos.manhattan(from), u.id))
        .map(|u| u.pos)
        .or_else(|| state.nearest_enemy(side, from).map(|u| u.pos))
}

/// Full harvest cycle for one worker: harvest when empty and adjacent, return
/// when carrying and adjacent, otherwise walk toward the relevant target.
pub fn worker_economy(state: &GameState, side: Side, worker: &Unit, pa: &mut PlayerAction) {
    if worker.carried == 0 {
        if let Some(dir) = adjacent_dir(state, worker.pos, |u| u.kind.is_resource() && u.amount > 0)
        {
            pa.push(worker.id, UnitAction::Harvest(dir));
        } else if let Some(node) = state.nearest_resource(worker.pos) {
            if let Some(step) = move_toward(state, worker, node.pos) {
                pa.push(worker.id, step);
            }
        }
    } else if let Some(dir) = adjacent_dir(state, worker.pos, |u| {
        u.kind.is_stockpile() && u.owner == Some(side)
    }) {
        pa.push(worker.id, UnitAction::Return(dir));
    } else if let Some(base) = home_base(state, side) {
        if let Some(step) = move_toward(state, worker, base) {
            pa.push(worker.id, step);
        }
    }
}

/// Order `producer` to train `kind` into the first free adjacent cell,
/// keeping `reserve` resources untouched. Returns false when unaffordable,
/// not producible, or fully blocked.
pub fn train(
    state: &GameState,
    side: Side,
    producer: &Unit,
    kind: UnitKind,
    reserve: u32,
    pa: &mut PlayerAction,
) -> bool {
    if !stats(producer.kind).produces.contains(&kind) {
        return false;
    }
    if state.resources(side) < stats(kind).cost + reserve {
        return false;
    }
    for dir in DIRS {
        if state.is_free(producer.pos.step(dir)) {
            pa.push(producer.id, UnitAction::Produce(dir, kind));
            return true;
        }
    }
    false
}

/// Have one worker place a barracks next to itself (first empty-handed
/// worker). Returns the builder's id if an order was issued.
pub fn build_barracks(
    state: &GameState,
    side: Side,
    reserve: u32,
    skip: Option<gridwar_sim::UnitId>,
    pa: &mut PlayerAction,
) -> Option<gridwar_sim::UnitId> {
    if count_kind(state, side, UnitKind::Barracks) > 0 {
        return None;
    }
    let builder = state
        .units_of(side)
        .find(|u| u.kind == UnitKind::Worker && Some(u.id) != skip && u.carried == 0)?;
    if train(state, side, builder, UnitKind::Barracks, reserve, pa) {
        Some(builder.id)
    } else {
        None
    }
}

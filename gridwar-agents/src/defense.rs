//! Defensive rule strategies

use gridwar_sim::{stats, GameState, PlayerAction, Side, UnitKind};

use crate::strategy::GameStrategy;
use crate::tactics::{
    attack_move, best_attack, build_barracks, count_kind, military_count, military_strength,
    move_toward, pick_target, train, worker_economy, home_base,
};

/// Heavy defense: garrison near the base and only push out with a full army.
#[derive(Default)]
pub struct TurtleDefense;

/// Army size that releases the garrison
const TURTLE_PUSH_ARMY: usize = 5;
/// Garrison radius around the home base
const TURTLE_RADIUS: i32 = 3;

impl GameStrategy for TurtleDefense {
    fn act(&mut self, side: Side, state: &GameState) -> PlayerAction {
        let mut pa = PlayerAction::empty();
        let have_barracks = count_kind(state, side, UnitKind::Barracks) > 0;
        let reserve = if have_barracks { 0 } else { stats(UnitKind::Barracks).cost };

        for base in state.units_of(side).filter(|u| u.kind == UnitKind::Base) {
            if count_kind(state, side, UnitKind::Worker) <= 2 {
                train(state, side, base, UnitKind::Worker, reserve, &mut pa);
            }
        }

        let mut builder = None;
        if !have_barracks && count_kind(state, side, UnitKind::Worker) > 2 {
            builder = build_barracks(state, side, 0, None, &mut pa);
        }

        for barracks in state.units_of(side).filter(|u| u.kind == UnitKind::Barracks) {
            train(state, side, barracks, UnitKind::Heavy, 0, &mut pa);
        }

        for worker in state
            .units_of(side)
            .filter(|u| u.kind == UnitKind::Worker && Some(u.id) != builder)
        {
            if pa.get(worker.id).is_none() {
                worker_economy(state, side, worker, &mut pa);
            }
        }

        let home = home_base(state, side);
        let push = military_count(state, side) >= TURTLE_PUSH_ARMY;
        for soldier in state.units_of(side).filter(|u| u.kind.is_military()) {
            if push {
                if let Some(target) = pick_target(state, side, soldier.pos, None) {
                    attack_move(state, side, soldier, target, None, &mut pa);
                }
            } else if let Some(attack) = best_attack(state, side, soldier, None) {
                pa.push(soldier.id, attack);
            } else if let Some(home) = home {
                if soldier.pos.manhattan(home) > TURTLE_RADIUS {
                    if let Some(step) = move_toward(state, soldier, home) {
                        pa.push(soldier.id, step);
                    }
                }
            }
        }

        pa
    }
}

/// Defend, then punch back: engage only intruders near the base and switch to
/// a full push once clearly ahead on material.
#[derive(Default)]
pub struct CounterAttack;

/// Intruders inside this radius are engaged
const ENGAGE_RADIUS: i32 = 6;
/// Strength ratio that triggers the counter-push
const PUSH_RATIO: f64 = 1.25;

impl GameStrategy for CounterAttack {
    fn act(&mut self, side: Side, state: &GameState) -> PlayerAction {
        let mut pa = PlayerAction::empty();
        let have_barracks = count_kind(state, side, UnitKind::Barracks) > 0;
        let reserve = if have_barracks { 0 } else { stats(UnitKind::Barracks).cost };

        for base in state.units_of(side).filter(|u| u.kind == UnitKind::Base) {
            if count_kind(state, side, UnitKind::Worker) <= 2 {
                train(state, side, base, UnitKind::Worker, reserve, &mut pa);
            }
        }

        let mut builder = None;
        if !have_barracks && count_kind(state, side, UnitKind::Worker) > 2 {
            builder = build_barracks(state, side, 0, None, &mut pa);
        }

        for barracks in state.units_of(side).filter(|u| u.kind == UnitKind::Barracks) {
            // Mixed army: heavy line with ranged support
            let ranged = count_kind(state, side, UnitKind::Ranged);
            let heavy = count_kind(state, side, UnitKind::Heavy);
            let kind = if ranged * 2 < heavy { UnitKind::Ranged } else { UnitKind::Heavy };
            train(state, side, barracks, kind, 0, &mut pa);
        }

        for worker in state
            .units_of(side)
            .filter(|u| u.kind == UnitKind::Worker && Some(u.id) != builder)
        {
            if pa.get(worker.id).is_none() {
                worker_economy(state, side, worker, &mut pa);
            }
        }

        let mine = military_strength(state, side) as f64;
        let theirs = military_strength(state, side.opponent()) as f64;
        let push = theirs == 0.0 || mine >= PUSH_RATIO * theirs;
        let home = home_base(state, side);

        for soldier in state.units_of(side).filter(|u| u.kind.is_military()) {
            if push {
                if let Some(target) = pick_target(state, side, soldier.pos, None) {
                    attack_move(state, side, soldier, target, None, &mut pa);
                }
                continue;
            }
            // Hold: engage only intruders that crossed the home perimeter
            let intruder = home.and_then(|h| {
                state
                    .units_of(side.opponent())
                    .filter(|e| e.pos.manhattan(h) <= ENGAGE_RADIUS)
                    .min_by_key(|e| (e.pos.manhattan(soldier.pos), e.id))
                    .map(|e| e.pos)
            });
            if let Some(target) = intruder {
                attack_move(state, side, soldier, target, None, &mut pa);
            } else if let Some(home) = home {
                if soldier.pos.manhattan(home) > TURTLE_RADIUS + 1 {
                    if let Some(step) = move_toward(state, soldier, home) {
                        pa.push(soldier.id, step);
                    }
                }
            }
        }

        pa
    }
}

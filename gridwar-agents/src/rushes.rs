//! Offensive rule strategies - the rush family

use gridwar_sim::{stats, GameState, PlayerAction, Side, UnitKind};

use crate::strategy::GameStrategy;
use crate::tactics::{
    attack_move, build_barracks, count_kind, pick_target, train, worker_economy,
};

/// All-in worker aggression: one harvester keeps the economy alive, every
/// other worker (and the base's continuous production) attacks.
#[derive(Default)]
pub struct WorkerRush;

impl GameStrategy for WorkerRush {
    fn act(&mut self, side: Side, state: &GameState) -> PlayerAction {
        let mut pa = PlayerAction::empty();

        for base in state.units_of(side).filter(|u| u.kind == UnitKind::Base) {
            train(state, side, base, UnitKind::Worker, 0, &mut pa);
        }

        let workers: Vec<_> = state
            .units_of(side)
            .filter(|u| u.kind == UnitKind::Worker)
            .collect();
        for (i, worker) in workers.iter().enumerate() {
            if i == 0 {
                worker_economy(state, side, worker, &mut pa);
            } else if let Some(target) = pick_target(state, side, worker.pos, None) {
                attack_move(state, side, worker, target, None, &mut pa);
            }
        }

        pa
    }
}

/// Shared plan for barracks-based rushes: stable worker economy, one
/// barracks, continuous production of `kind`, army attacks the nearest enemy.
fn barracks_rush(side: Side, state: &GameState, kind: UnitKind) -> PlayerAction {
    let mut pa = PlayerAction::empty();
    let harvesters = 2usize;
    let have_barracks = count_kind(state, side, UnitKind::Barracks) > 0;
    let barracks_reserve = if have_barracks {
        0
    } else {
        stats(UnitKind::Barracks).cost
    };

    for base in state.units_of(side).filter(|u| u.kind == UnitKind::Base) {
        if count_kind(state, side, UnitKind::Worker) <= harvesters {
            train(state, side, base, UnitKind::Worker, barracks_reserve, &mut pa);
        }
    }

    let mut builder = None;
    if !have_barracks && count_kind(state, side, UnitKind::Worker) > harvesters {
        builder = build_barracks(state, side, 0, None, &mut pa);
    }

    for barracks in state.units_of(side).filter(|u| u.kind == UnitKind::Barracks) {
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

    for soldier in state.units_of(side).filter(|u| u.kind.is_military()) {
        if let Some(target) = pick_target(state, side, soldier.pos, None) {
            attack_move(state, side, soldier, target, None, &mut pa);
        }
    }

    pa
}

/// Barracks + light units: fast, balanced pressure
#[derive(Default)]
pub struct LightRush;

impl GameStrategy for LightRush {
    fn act(&mut self, side: Side, state: &GameState) -> PlayerAction {
        barracks_rush(side, state, UnitKind::Light)
    }
}

/// Barracks + heavy units: slow tanky push
#[derive(Default)]
pub struct HeavyRush;

impl GameStrategy for HeavyRush {
    fn act(&mut self, side: Side, state: &GameState) -> PlayerAction {
        barracks_rush(side, state, UnitKind::Heavy)
    }
}

/// Barracks + ranged units: standoff damage
#[derive(Default)]
pub struct RangedRush;

impl GameStrategy for RangedRush {
    fn act(&mut self, side: Side, state: &GameState) -> PlayerAction {
        barracks_rush(side, state, UnitKind::Ranged)
    }
}

//! Economic rule strategies

use gridwar_sim::{stats, GameState, PlayerAction, Side, UnitKind};

use crate::strategy::{GameStrategy, TargetPriority};
use crate::tactics::{
    attack_move, build_barracks, count_kind, pick_target, train, worker_economy,
};

/// Economy first: max out workers on the available nodes before any military.
#[derive(Default)]
pub struct BoomEconomy;

/// Workers per remaining resource node
const WORKERS_PER_NODE: usize = 2;
const BOOM_WORKER_CAP: usize = 6;

impl GameStrategy for BoomEconomy {
    fn act(&mut self, side: Side, state: &GameState) -> PlayerAction {
        let mut pa = PlayerAction::empty();
        let nodes = state
            .units()
            .iter()
            .filter(|u| u.kind.is_resource() && u.amount > 0)
            .count();
        let worker_target = BOOM_WORKER_CAP.min((nodes * WORKERS_PER_NODE).max(1));
        let workers = count_kind(state, side, UnitKind::Worker);
        let boomed = workers >= worker_target;

        for base in state.units_of(side).filter(|u| u.kind == UnitKind::Base) {
            if !boomed {
                train(state, side, base, UnitKind::Worker, 0, &mut pa);
            }
        }

        // Military only once the economy is saturated
        let mut builder = None;
        if boomed {
            builder = build_barracks(state, side, 0, None, &mut pa);
            for barracks in state.units_of(side).filter(|u| u.kind == UnitKind::Barracks) {
                train(state, side, barracks, UnitKind::Light, 0, &mut pa);
            }
        }

        for worker in state
            .units_of(side)
            .filter(|u| u.kind == UnitKind::Worker && Some(u.id) != builder)
        {
            if pa.get(worker.id).is_none() {
                worker_economy(state, side, worker, &mut pa);
            }
        }

        // Whatever military exists screens the base
        for soldier in state.units_of(side).filter(|u| u.kind.is_military()) {
            if let Some(target) = pick_target(state, side, soldier.pos, Some(TargetPriority::Army))
            {
                attack_move(state, side, soldier, target, Some(TargetPriority::Army), &mut pa);
            }
        }

        pa
    }
}

/// Worker raids on the enemy economy while a barracks goes up in the back.
#[derive(Default)]
pub struct Harass;

impl GameStrategy for Harass {
    fn act(&mut self, side: Side, state: &GameState) -> PlayerAction {
        let mut pa = PlayerAction::empty();
        let have_barracks = count_kind(state, side, UnitKind::Barracks) > 0;
        let reserve = if have_barracks { 0 } else { stats(UnitKind::Barracks).cost };

        for base in state.units_of(side).filter(|u| u.kind == UnitKind::Base) {
            train(state, side, base, UnitKind::Worker, reserve, &mut pa);
        }

        let mut builder = None;
        if !have_barracks && count_kind(state, side, UnitKind::Worker) > 2 {
            builder = build_barracks(state, side, 0, None, &mut pa);
        }

        for barracks in state.units_of(side).filter(|u| u.kind == UnitKind::Barracks) {
            train(state, side, barracks, UnitKind::Ranged, 0, &mut pa);
        }

        // One worker harvests; the rest raid the enemy economy
        let workers: Vec<_> = state
            .units_of(side)
            .filter(|u| u.kind == UnitKind::Worker && Some(u.id) != builder)
            .collect();
        for (i, worker) in workers.iter().enumerate() {
            if pa.get(worker.id).is_some() {
                continue;
            }
            if i == 0 {
                worker_economy(state, side, worker, &mut pa);
            } else if let Some(target) =
                pick_target(state, side, worker.pos, Some(TargetPriority::Workers))
            {
                attack_move(
                    state,
                    side,
                    worker,
                    target,
                    Some(TargetPriority::Workers),
                    &mut pa,
                );
            }
        }

        for soldier in state.units_of(side).filter(|u| u.kind.is_military()) {
            if let Some(target) =
                pick_target(state, side, soldier.pos, Some(TargetPriority::Workers))
            {
                attack_move(
                    state,
                    side,
                    soldier,
                    target,
                    Some(TargetPriority::Workers),
                    &mut pa,
                );
            }
        }

        pa
    }
}

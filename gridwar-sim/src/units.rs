//! Unit kinds and their static stats table

use serde::{Deserialize, Serialize};

/// Kind of unit (or neutral resource node)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Worker,
    Light,
    Heavy,
    Ranged,
    Base,
    Barracks,
    Resource,
}

/// Static stats for a unit kind
#[derive(Clone, Copy, Debug)]
pub struct UnitStats {
    /// Resource cost to produce
    pub cost: u32,
    /// Hit points when spawned
    pub max_hp: i32,
    /// Damage dealt per attack (0 = cannot attack)
    pub attack_damage: i32,
    /// Attack range in Manhattan distance
    pub attack_range: i32,
    /// Resources picked up per harvest action (0 = cannot harvest)
    pub harvest_amount: u32,
    /// Kinds this unit can produce
    pub produces: &'static [UnitKind],
    /// Whether produced units / returned resources go through this unit
    pub stockpile: bool,
}

const WORKER: UnitStats = UnitStats {
    cost: 1,
    max_hp: 1,
    attack_damage: 1,
    attack_range: 1,
    harvest_amount: 1,
    produces: &[UnitKind::Barracks],
    stockpile: false,
};

const LIGHT: UnitStats = UnitStats {
    cost: 2,
    max_hp: 4,
    attack_damage: 2,
    attack_range: 1,
    harvest_amount: 0,
    produces: &[],
    stockpile: false,
};

const HEAVY: UnitStats = UnitStats {
    cost: 3,
    max_hp: 8,
    attack_damage: 4,
    attack_range: 1,
    harvest_amount: 0,
    produces: &[],
    stockpile: false,
};

const RANGED: UnitStats = UnitStats {
    cost: 2,
    max_hp: 1,
    attack_damage: 1,
    attack_range: 3,
    harvest_amount: 0,
    produces: &[],
    stockpile: false,
};

const BASE: UnitStats = UnitStats {
    cost: 10,
    max_hp: 10,
    attack_damage: 0,
    attack_range: 0,
    harvest_amount: 0,
    produces: &[UnitKind::Worker],
    stockpile: true,
};

const BARRACKS: UnitStats = UnitStats {
    cost: 5,
    max_hp: 4,
    attack_damage: 0,
    attack_range: 0,
    harvest_amount: 0,
    produces: &[UnitKind::Light, UnitKind::Heavy, UnitKind::Ranged],
    stockpile: false,
};

const RESOURCE: UnitStats = UnitStats {
    cost: 0,
    max_hp: 1,
    attack_damage: 0,
    attack_range: 0,
    harvest_amount: 0,
    produces: &[],
    stockpile: false,
};

/// Look up the stats table for a unit kind
pub fn stats(kind: UnitKind) -> &'static UnitStats {
    match kind {
        UnitKind::Worker => &WORKER,
        UnitKind::Light => &LIGHT,
        UnitKind::Heavy => &HEAVY,
        UnitKind::Ranged => &RANGED,
        UnitKind::Base => &BASE,
        UnitKind::Barracks => &BARRACKS,
        UnitKind::Resource => &RESOURCE,
    }
}

impl UnitKind {
    /// Can this kind pick up resources?
    pub fn can_harvest(self) -> bool {
        stats(self).harvest_amount > 0
    }

    /// Can this kind deal damage?
    pub fn can_attack(self) -> bool {
        stats(self).attack_damage > 0
    }

    /// Is this a resource drop-off / production hub?
    pub fn is_stockpile(self) -> bool {
        stats(self).stockpile
    }

    /// Can this kind produce other units?
    pub fn is_producer(self) -> bool {
        !stats(self).produces.is_empty()
    }

    /// Is this a neutral resource node?
    pub fn is_resource(self) -> bool {
        self == UnitKind::Resource
    }

    /// Is this an immobile structure?
    pub fn is_building(self) -> bool {
        matches!(self, UnitKind::Base | UnitKind::Barracks | UnitKind::Resource)
    }

    /// Attacker that is not a building (workers count; bases do not)
    pub fn is_combat_capable(self) -> bool {
        self.can_attack() && !self.is_building()
    }

    /// Military unit: attacks but does not harvest
    pub fn is_military(self) -> bool {
        self.can_attack() && !self.can_harvest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(UnitKind::Worker.can_harvest());
        assert!(UnitKind::Worker.can_attack());
        assert!(!UnitKind::Worker.is_military());

        assert!(UnitKind::Heavy.is_military());
        assert!(!UnitKind::Heavy.can_harvest());

        assert!(UnitKind::Base.is_stockpile());
        assert!(UnitKind::Base.is_producer());
        assert!(!UnitKind::Base.can_attack());

        assert!(UnitKind::Barracks.is_producer());
        assert!(!UnitKind::Barracks.is_stockpile());

        assert!(UnitKind::Resource.is_resource());
        assert!(UnitKind::Resource.is_building());
    }

    #[test]
    fn test_production_chains() {
        assert_eq!(stats(UnitKind::Base).produces, &[UnitKind::Worker]);
        assert!(stats(UnitKind::Barracks).produces.contains(&UnitKind::Heavy));
        assert!(stats(UnitKind::Worker).produces.contains(&UnitKind::Barracks));
    }

    #[test]
    fn test_ranged_outranges_melee() {
        assert!(stats(UnitKind::Ranged).attack_range > stats(UnitKind::Light).attack_range);
    }
}

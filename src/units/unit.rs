//! Mobile population tokens

use std::collections::BTreeMap;

use crate::core::grid::TilePos;
use crate::core::types::{Behavior, Faction, FightId, SettlementId, UnitClass, UnitId};
use crate::movement::agent::UnitAgent;

/// A unit: strength is the number of followers it carries
#[derive(Debug, Clone)]
pub struct Unit {
    pub id: UnitId,
    pub faction: Faction,
    pub class: UnitClass,
    strength: u32,
    pub tile: TilePos,
    pub agent: UnitAgent,
    pub fight: Option<FightId>,
    /// Settlement that released this unit
    pub origin: Option<SettlementId>,
    /// Ticks left before the unit may re-enter its origin
    pub entry_cooldown: u32,
    /// Roam steps taken, drives strength decay
    pub roam_steps: u32,
}

impl Unit {
    pub fn new(
        id: UnitId,
        faction: Faction,
        class: UnitClass,
        strength: u32,
        tile: TilePos,
        max_strength: u32,
    ) -> Self {
        Self {
            id,
            faction,
            class,
            strength: strength.min(max_strength),
            tile,
            agent: UnitAgent::new(id),
            fight: None,
            origin: None,
            entry_cooldown: 0,
            roam_steps: 0,
        }
    }

    pub fn strength(&self) -> u32 {
        self.strength
    }

    pub fn set_strength(&mut self, strength: u32, max_strength: u32) {
        self.strength = strength.min(max_strength);
    }

    /// Add strength, clamped; returns the amount that did not fit
    pub fn add_strength(&mut self, amount: u32, max_strength: u32) -> u32 {
        let total = self.strength.saturating_add(amount);
        self.strength = total.min(max_strength);
        total - self.strength
    }

    pub fn lose_strength(&mut self, amount: u32) -> u32 {
        self.strength = self.strength.saturating_sub(amount);
        self.strength
    }

    pub fn is_dead(&self) -> bool {
        self.strength == 0
    }

    pub fn in_fight(&self) -> bool {
        self.fight.is_some()
    }

    /// Faction behavior after class overrides
    pub fn effective_behavior(&self, faction_behavior: Behavior) -> Behavior {
        match self.class {
            UnitClass::Knight => Behavior::Fight,
            _ => faction_behavior,
        }
    }

    pub fn may_enter(&self, settlement: SettlementId) -> bool {
        self.class != UnitClass::Knight
            && (self.entry_cooldown == 0 || self.origin != Some(settlement))
    }
}

/// All live units, iterated in id order
#[derive(Debug, Clone, Default)]
pub struct UnitRoster {
    units: BTreeMap<UnitId, Unit>,
}

impl UnitRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: Unit) {
        self.units.insert(unit.id, unit);
    }

    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        self.units.remove(&id)
    }

    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Present with non-zero strength
    pub fn is_alive(&self, id: UnitId) -> bool {
        self.units.get(&id).is_some_and(|u| !u.is_dead())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.units.values_mut()
    }

    pub fn ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    pub fn of_faction(&self, faction: Faction) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(move |u| u.faction == faction)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_is_clamped() {
        let mut unit = Unit::new(UnitId(1), Faction::Red, UnitClass::Walker, 150, TilePos::new(0, 0), 100);
        assert_eq!(unit.strength(), 100);

        unit.set_strength(90, 100);
        assert_eq!(unit.add_strength(25, 100), 15);
        assert_eq!(unit.strength(), 100);

        assert_eq!(unit.lose_strength(500), 0);
        assert!(unit.is_dead());
    }

    #[test]
    fn test_knight_always_fights() {
        let mut unit = Unit::new(UnitId(1), Faction::Red, UnitClass::Walker, 5, TilePos::new(0, 0), 100);
        assert_eq!(unit.effective_behavior(Behavior::Settle), Behavior::Settle);
        unit.class = UnitClass::Knight;
        assert_eq!(unit.effective_behavior(Behavior::Settle), Behavior::Fight);
        assert!(!unit.may_enter(SettlementId(3)));
    }

    #[test]
    fn test_entry_cooldown_only_bars_origin() {
        let mut unit = Unit::new(UnitId(1), Faction::Blue, UnitClass::Walker, 5, TilePos::new(0, 0), 100);
        unit.origin = Some(SettlementId(2));
        unit.entry_cooldown = 10;
        assert!(!unit.may_enter(SettlementId(2)));
        assert!(unit.may_enter(SettlementId(3)));
        unit.entry_cooldown = 0;
        assert!(unit.may_enter(SettlementId(2)));
    }
}

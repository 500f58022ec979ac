//! Fight bookkeeping and periodic damage
//!
//! Every fight is a countdown advanced once per tick. When it expires both
//! sides lose one strength at the same time. Fights never interact with
//! each other.

use std::collections::BTreeMap;

use crate::combat::fight::{Fight, FightOutcome};
use crate::core::config::CombatConfig;
use crate::core::types::{FightId, SettlementId, UnitId};
use crate::population::PopulationDirectory;
use crate::simulation::events::{EventLog, RemovalCause, SimEvent};

#[derive(Debug, Clone)]
pub struct CombatResolver {
    interval: u32,
    fights: BTreeMap<FightId, Fight>,
}

impl CombatResolver {
    pub fn new(config: &CombatConfig) -> Self {
        Self {
            interval: config.damage_interval_ticks.max(1),
            fights: BTreeMap::new(),
        }
    }

    pub fn fight(&self, id: FightId) -> Option<&Fight> {
        self.fights.get(&id)
    }

    pub fn fights(&self) -> impl Iterator<Item = &Fight> {
        self.fights.values()
    }

    pub fn fight_of(&self, unit: UnitId) -> Option<FightId> {
        self.fights.values().find(|f| f.involves(unit)).map(|f| f.id)
    }

    pub fn len(&self) -> usize {
        self.fights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fights.is_empty()
    }

    /// Open a fight between two enemy units and pause them both
    ///
    /// Returns `None` if either unit is missing, dead, already fighting or
    /// on the same side.
    pub fn start_fight(
        &mut self,
        attacker: UnitId,
        defender: UnitId,
        settlement: Option<SettlementId>,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) -> Option<FightId> {
        if attacker == defender {
            return None;
        }
        let a = directory.unit(attacker).filter(|u| !u.is_dead() && !u.in_fight())?;
        let d = directory.unit(defender).filter(|u| !u.is_dead() && !u.in_fight())?;
        if a.faction == d.faction {
            return None;
        }

        let id = directory.register_fight();
        for unit in [attacker, defender] {
            if let Some(unit) = directory.unit_mut(unit) {
                unit.fight = Some(id);
                unit.agent.pause(true);
            }
        }
        self.fights.insert(
            id,
            Fight::new(id, attacker, defender, settlement, self.interval),
        );

        tracing::debug!(
            "Fight {:?} started: {:?} vs {:?} (settlement {:?})",
            id,
            attacker,
            defender,
            settlement
        );
        events.push(SimEvent::FightStarted {
            fight: id,
            attacker,
            defender,
            settlement,
        });
        Some(id)
    }

    /// Advance every fight by one tick
    pub fn tick(&mut self, directory: &mut PopulationDirectory, events: &mut EventLog) -> Vec<FightOutcome> {
        let mut outcomes = Vec::new();
        let ids: Vec<FightId> = self.fights.keys().copied().collect();

        for id in ids {
            let Some(fight) = self.fights.get_mut(&id) else {
                continue;
            };
            let (attacker, defender) = (fight.attacker, fight.defender);
            if !directory.is_fight_active(id) {
                outcomes.push(self.finish(id, None, &[], directory, events));
                continue;
            }

            let attacker_alive = directory.units().is_alive(attacker);
            let defender_alive = directory.units().is_alive(defender);
            let (winner, losers): (Option<UnitId>, Vec<UnitId>) = match (attacker_alive, defender_alive) {
                (true, true) => {
                    fight.countdown = fight.countdown.saturating_sub(1);
                    if fight.countdown > 0 {
                        continue;
                    }
                    fight.countdown = self.interval;

                    let attacker_strength = wound(directory, attacker, events);
                    let defender_strength = wound(directory, defender, events);
                    events.push(SimEvent::FightStrengthUpdated {
                        fight: id,
                        attacker_strength,
                        defender_strength,
                    });
                    match (attacker_strength == 0, defender_strength == 0) {
                        (false, false) => continue,
                        (true, true) => (None, vec![attacker, defender]),
                        (true, false) => (Some(defender), vec![attacker]),
                        (false, true) => (Some(attacker), vec![defender]),
                    }
                }
                // The other side vanished (decay, drowning): no loser to destroy
                (true, false) => (Some(attacker), Vec::new()),
                (false, true) => (Some(defender), Vec::new()),
                (false, false) => (None, Vec::new()),
            };
            outcomes.push(self.finish(id, winner, &losers, directory, events));
        }

        outcomes
    }

    fn finish(
        &mut self,
        id: FightId,
        winner: Option<UnitId>,
        losers: &[UnitId],
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) -> FightOutcome {
        let fight = self.fights.remove(&id);
        directory.unregister_fight(id);

        for &loser in losers {
            directory.remove_unit(loser, RemovalCause::Defeated, events);
        }
        // Whoever is still standing walks away
        if let Some(fight) = &fight {
            for unit in [fight.attacker, fight.defender] {
                if let Some(unit) = directory.unit_mut(unit) {
                    if unit.fight == Some(id) {
                        unit.fight = None;
                        unit.agent.pause(false);
                    }
                }
            }
        }

        tracing::debug!("Fight {:?} ended, winner {:?}", id, winner);
        events.push(SimEvent::FightEnded { fight: id, winner });

        let settlement = fight.as_ref().and_then(|f| f.settlement);
        match winner {
            Some(winner) => FightOutcome::Won {
                fight: id,
                winner,
                loser: losers.first().copied(),
                settlement,
            },
            None => FightOutcome::Discarded {
                fight: id,
                settlement,
            },
        }
    }
}

/// One point of damage; returns the strength left
fn wound(directory: &mut PopulationDirectory, unit: UnitId, events: &mut EventLog) -> u32 {
    let Some(entry) = directory.unit_mut(unit) else {
        return 0;
    };
    let strength = entry.lose_strength(1);
    events.push(SimEvent::UnitStrengthChanged { unit, strength });
    strength
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimulationConfig;
    use crate::core::grid::TilePos;
    use crate::core::types::{Faction, UnitClass};

    fn setup(interval: u32) -> (CombatResolver, PopulationDirectory, EventLog) {
        let mut config = SimulationConfig::default();
        config.combat.damage_interval_ticks = interval;
        (
            CombatResolver::new(&config.combat),
            PopulationDirectory::new(&config),
            EventLog::new(),
        )
    }

    fn spawn(directory: &mut PopulationDirectory, faction: Faction, strength: u32, events: &mut EventLog) -> UnitId {
        directory
            .spawn(faction, UnitClass::Walker, TilePos::new(4, 4), strength, events)
            .unwrap()
    }

    #[test]
    fn test_start_fight_pauses_both() {
        let (mut combat, mut directory, mut events) = setup(5);
        let a = spawn(&mut directory, Faction::Red, 3, &mut events);
        let b = spawn(&mut directory, Faction::Blue, 3, &mut events);

        let id = combat.start_fight(a, b, None, &mut directory, &mut events).unwrap();
        assert!(directory.unit(a).unwrap().agent.is_paused());
        assert!(directory.unit(b).unwrap().agent.is_paused());
        assert_eq!(directory.unit(a).unwrap().fight, Some(id));
        assert!(directory.is_fight_active(id));

        // Already fighting: no second fight
        let c = spawn(&mut directory, Faction::Blue, 3, &mut events);
        assert!(combat.start_fight(c, a, None, &mut directory, &mut events).is_none());
        assert_eq!(combat.len(), 1);
    }

    #[test]
    fn test_same_faction_never_fights() {
        let (mut combat, mut directory, mut events) = setup(5);
        let a = spawn(&mut directory, Faction::Red, 3, &mut events);
        let b = spawn(&mut directory, Faction::Red, 3, &mut events);
        assert!(combat.start_fight(a, b, None, &mut directory, &mut events).is_none());
    }

    #[test]
    fn test_damage_is_periodic() {
        let (mut combat, mut directory, mut events) = setup(3);
        let a = spawn(&mut directory, Faction::Red, 5, &mut events);
        let b = spawn(&mut directory, Faction::Blue, 5, &mut events);
        combat.start_fight(a, b, None, &mut directory, &mut events);

        for _ in 0..2 {
            assert!(combat.tick(&mut directory, &mut events).is_empty());
        }
        assert_eq!(directory.unit(a).unwrap().strength(), 5);
        combat.tick(&mut directory, &mut events);
        assert_eq!(directory.unit(a).unwrap().strength(), 4);
        assert_eq!(directory.unit(b).unwrap().strength(), 4);
    }

    #[test]
    fn test_stronger_side_wins_and_walks_on() {
        let (mut combat, mut directory, mut events) = setup(1);
        let a = spawn(&mut directory, Faction::Red, 3, &mut events);
        let b = spawn(&mut directory, Faction::Blue, 1, &mut events);
        let id = combat.start_fight(a, b, None, &mut directory, &mut events).unwrap();

        let outcomes = combat.tick(&mut directory, &mut events);
        assert_eq!(
            outcomes,
            vec![FightOutcome::Won {
                fight: id,
                winner: a,
                loser: Some(b),
                settlement: None
            }]
        );
        let winner = directory.unit(a).unwrap();
        assert_eq!(winner.strength(), 2);
        assert_eq!(winner.fight, None);
        assert!(!winner.agent.is_paused());
        assert!(directory.unit(b).is_none());
        assert!(!directory.is_fight_active(id));
    }

    #[test]
    fn test_mutual_destruction_is_discarded() {
        let (mut combat, mut directory, mut events) = setup(2);
        let a = spawn(&mut directory, Faction::Red, 1, &mut events);
        let b = spawn(&mut directory, Faction::Blue, 1, &mut events);
        let id = combat.start_fight(a, b, None, &mut directory, &mut events).unwrap();

        assert!(combat.tick(&mut directory, &mut events).is_empty());
        let outcomes = combat.tick(&mut directory, &mut events);
        assert_eq!(
            outcomes,
            vec![FightOutcome::Discarded {
                fight: id,
                settlement: None
            }]
        );
        assert!(directory.units().is_empty());
        assert!(combat.is_empty());
    }

    #[test]
    fn test_vanished_combatant_concedes() {
        let (mut combat, mut directory, mut events) = setup(50);
        let a = spawn(&mut directory, Faction::Red, 4, &mut events);
        let b = spawn(&mut directory, Faction::Blue, 4, &mut events);
        let id = combat.start_fight(a, b, None, &mut directory, &mut events).unwrap();

        directory.remove_unit(b, RemovalCause::Drowned, &mut events);
        let outcomes = combat.tick(&mut directory, &mut events);
        assert_eq!(
            outcomes,
            vec![FightOutcome::Won {
                fight: id,
                winner: a,
                loser: None,
                settlement: None
            }]
        );
        assert_eq!(directory.unit(a).unwrap().strength(), 4);
    }

    #[test]
    fn test_both_vanished_is_discarded() {
        let (mut combat, mut directory, mut events) = setup(50);
        let a = spawn(&mut directory, Faction::Red, 4, &mut events);
        let b = spawn(&mut directory, Faction::Blue, 4, &mut events);
        combat.start_fight(a, b, None, &mut directory, &mut events);

        directory.remove_unit(a, RemovalCause::Drowned, &mut events);
        directory.remove_unit(b, RemovalCause::Drowned, &mut events);
        let outcomes = combat.tick(&mut directory, &mut events);
        assert!(matches!(outcomes[..], [FightOutcome::Discarded { .. }]));
    }
}

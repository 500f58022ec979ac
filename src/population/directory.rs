//! Faction-wide registries
//!
//! The directory owns the unit roster and every piece of state shared across
//! units: population counts, the behavior each faction broadcasts, the leader
//! slot, the knight roster, roam step grids, the magnet and fight ids. All
//! writes to that state go through here.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::config::SimulationConfig;
use crate::core::grid::TilePos;
use crate::core::types::{Behavior, Faction, FightId, SettlementId, UnitClass, UnitId};
use crate::population::step_grid::StepGrid;
use crate::simulation::events::{EventLog, RemovalCause, SimEvent};
use crate::units::{Unit, UnitRoster};

/// Who leads a faction: a unit or a settlement, never both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LeaderSlot {
    #[default]
    None,
    Unit(UnitId),
    Settlement(SettlementId),
}

#[derive(Debug, Clone)]
struct FactionState {
    behavior: Behavior,
    leader: LeaderSlot,
    knights: BTreeSet<UnitId>,
    magnet: Option<TilePos>,
    population: u32,
    steps: StepGrid,
}

impl FactionState {
    fn new(tiles_per_side: i32) -> Self {
        Self {
            behavior: Behavior::default(),
            leader: LeaderSlot::None,
            knights: BTreeSet::new(),
            magnet: None,
            population: 0,
            steps: StepGrid::new(tiles_per_side),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PopulationDirectory {
    max_population: u32,
    max_strength: u32,
    units: UnitRoster,
    factions: [FactionState; 2],
    next_unit_id: u32,
    next_fight_id: u64,
    active_fights: BTreeSet<FightId>,
}

impl PopulationDirectory {
    pub fn new(config: &SimulationConfig) -> Self {
        let side = config.map.tiles_per_side;
        Self {
            max_population: config.population.max_population,
            max_strength: config.units.max_strength,
            units: UnitRoster::new(),
            factions: [FactionState::new(side), FactionState::new(side)],
            next_unit_id: 1,
            next_fight_id: 1,
            active_fights: BTreeSet::new(),
        }
    }

    fn faction(&self, faction: Faction) -> &FactionState {
        &self.factions[faction.index()]
    }

    fn faction_mut(&mut self, faction: Faction) -> &mut FactionState {
        &mut self.factions[faction.index()]
    }

    // === UNITS ===

    pub fn units(&self) -> &UnitRoster {
        &self.units
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(id)
    }

    pub fn max_strength(&self) -> u32 {
        self.max_strength
    }

    pub fn population(&self, faction: Faction) -> u32 {
        self.faction(faction).population
    }

    pub fn has_room(&self, faction: Faction) -> bool {
        self.population(faction) < self.max_population
    }

    /// Spawn a unit unless the faction is at its population cap
    pub fn spawn(
        &mut self,
        faction: Faction,
        class: UnitClass,
        tile: TilePos,
        strength: u32,
        events: &mut EventLog,
    ) -> Option<UnitId> {
        if !self.has_room(faction) {
            tracing::trace!("Spawn refused: {:?} at population cap", faction);
            return None;
        }
        self.spawn_forced(faction, class, tile, strength, events)
    }

    /// Spawn regardless of the cap, for followers that already exist
    pub fn spawn_forced(
        &mut self,
        faction: Faction,
        class: UnitClass,
        tile: TilePos,
        strength: u32,
        events: &mut EventLog,
    ) -> Option<UnitId> {
        if strength == 0 {
            return None;
        }
        let id = UnitId(self.next_unit_id);
        self.next_unit_id += 1;

        let unit = Unit::new(id, faction, class, strength, tile, self.max_strength);
        events.push(SimEvent::UnitSpawned {
            unit: id,
            faction,
            class,
            strength: unit.strength(),
            tile,
        });
        self.units.insert(unit);

        let state = self.faction_mut(faction);
        state.population += 1;
        let population = state.population;
        events.push(SimEvent::PopulationChanged {
            faction,
            population,
        });
        Some(id)
    }

    /// Remove a unit, releasing any leader or knight bookkeeping it held
    pub fn remove_unit(
        &mut self,
        id: UnitId,
        cause: RemovalCause,
        events: &mut EventLog,
    ) -> Option<Unit> {
        let unit = self.units.remove(id)?;
        let faction = unit.faction;

        let state = self.faction_mut(faction);
        state.population = state.population.saturating_sub(1);
        state.knights.remove(&id);
        let was_leader = state.leader == LeaderSlot::Unit(id);
        let population = state.population;

        events.push(SimEvent::UnitRemoved {
            unit: id,
            faction,
            cause,
        });
        events.push(SimEvent::PopulationChanged {
            faction,
            population,
        });

        // A leader entering a settlement hands the slot over instead
        if was_leader && cause != RemovalCause::EnteredSettlement {
            self.clear_leader(faction, events);
        }
        Some(unit)
    }

    // === BEHAVIOR ===

    pub fn behavior(&self, faction: Faction) -> Behavior {
        self.faction(faction).behavior
    }

    /// Change the faction goal; units pick it up on their next tick
    pub fn set_behavior(&mut self, faction: Faction, behavior: Behavior, events: &mut EventLog) {
        let state = self.faction_mut(faction);
        if state.behavior != behavior {
            state.behavior = behavior;
            events.push(SimEvent::BehaviorChanged { faction, behavior });
        }
    }

    pub fn magnet(&self, faction: Faction) -> Option<TilePos> {
        self.faction(faction).magnet
    }

    pub fn set_magnet(&mut self, faction: Faction, tile: TilePos, events: &mut EventLog) {
        let state = self.faction_mut(faction);
        if state.magnet != Some(tile) {
            state.magnet = Some(tile);
            events.push(SimEvent::MagnetMoved { faction, tile });
        }
    }

    // === LEADER ===

    pub fn leader(&self, faction: Faction) -> LeaderSlot {
        self.faction(faction).leader
    }

    pub fn is_leader_unit(&self, id: UnitId) -> bool {
        self.units
            .get(id)
            .is_some_and(|u| self.leader(u.faction) == LeaderSlot::Unit(id))
    }

    /// Promote a unit; returns the slot it displaced.
    ///
    /// A displaced leader unit is demoted here; a displaced leader settlement
    /// must have its flag cleared by the caller.
    pub fn set_leader_unit(
        &mut self,
        faction: Faction,
        id: UnitId,
        events: &mut EventLog,
    ) -> Option<LeaderSlot> {
        match self.units.get(id) {
            Some(u) if u.faction == faction && u.class != UnitClass::Knight => {}
            _ => return None,
        }
        let previous = self.replace_leader(faction, LeaderSlot::Unit(id), events);
        if let Some(unit) = self.units.get_mut(id) {
            unit.class = UnitClass::Leader;
            events.push(SimEvent::UnitClassChanged {
                unit: id,
                class: UnitClass::Leader,
            });
        }
        Some(previous)
    }

    /// Move the leader into a settlement; returns the displaced slot
    pub fn set_leader_settlement(
        &mut self,
        faction: Faction,
        settlement: SettlementId,
        events: &mut EventLog,
    ) -> LeaderSlot {
        self.replace_leader(faction, LeaderSlot::Settlement(settlement), events)
    }

    fn replace_leader(
        &mut self,
        faction: Faction,
        slot: LeaderSlot,
        events: &mut EventLog,
    ) -> LeaderSlot {
        let previous = std::mem::replace(&mut self.faction_mut(faction).leader, slot);
        if let LeaderSlot::Unit(old) = previous {
            if slot != previous {
                self.demote(old, events);
            }
        }
        if slot != previous {
            tracing::info!("{:?} leader is now {:?}", faction, slot);
            events.push(SimEvent::LeaderChanged {
                faction,
                leader: slot,
            });
        }
        previous
    }

    fn demote(&mut self, id: UnitId, events: &mut EventLog) {
        if let Some(unit) = self.units.get_mut(id) {
            if unit.class == UnitClass::Leader {
                unit.class = UnitClass::Walker;
                events.push(SimEvent::UnitClassChanged {
                    unit: id,
                    class: UnitClass::Walker,
                });
            }
        }
    }

    /// The faction has lost its leader
    pub fn clear_leader(&mut self, faction: Faction, events: &mut EventLog) {
        let previous = std::mem::take(&mut self.faction_mut(faction).leader);
        if previous == LeaderSlot::None {
            return;
        }
        if let LeaderSlot::Unit(old) = previous {
            self.demote(old, events);
        }
        tracing::info!("{:?} lost its leader ({:?})", faction, previous);
        events.push(SimEvent::LeaderLost { faction });
        events.push(SimEvent::LeaderChanged {
            faction,
            leader: LeaderSlot::None,
        });
    }

    // === KNIGHTS ===

    pub fn knights(&self, faction: Faction) -> &BTreeSet<UnitId> {
        &self.faction(faction).knights
    }

    /// Turn the leader unit into a knight. The faction is left leaderless.
    pub fn make_knight(&mut self, faction: Faction, events: &mut EventLog) -> Option<UnitId> {
        let LeaderSlot::Unit(id) = self.leader(faction) else {
            return None;
        };
        self.faction_mut(faction).leader = LeaderSlot::None;
        events.push(SimEvent::LeaderChanged {
            faction,
            leader: LeaderSlot::None,
        });

        let unit = self.units.get_mut(id)?;
        unit.class = UnitClass::Knight;
        events.push(SimEvent::UnitClassChanged {
            unit: id,
            class: UnitClass::Knight,
        });
        self.faction_mut(faction).knights.insert(id);
        tracing::info!("{:?} knighted unit {:?}", faction, id);
        Some(id)
    }

    // === STEP GRID ===

    /// Count a roam visit to a tile
    pub fn record_roam_step(&mut self, faction: Faction, tile: TilePos) -> u32 {
        self.faction_mut(faction).steps.record(tile)
    }

    pub fn visits(&self, faction: Faction, tile: TilePos) -> u32 {
        self.faction(faction).steps.visits(tile)
    }

    pub fn step_grid(&self, faction: Faction) -> &StepGrid {
        &self.faction(faction).steps
    }

    // === FIGHTS ===

    /// Allocate a fresh fight id and mark it in flight
    pub fn register_fight(&mut self) -> FightId {
        let id = FightId(self.next_fight_id);
        self.next_fight_id += 1;
        self.active_fights.insert(id);
        id
    }

    pub fn unregister_fight(&mut self, id: FightId) -> bool {
        self.active_fights.remove(&id)
    }

    pub fn is_fight_active(&self, id: FightId) -> bool {
        self.active_fights.contains(&id)
    }

    pub fn active_fight_count(&self) -> usize {
        self.active_fights.len()
    }
}

//! The simulation context
//!
//! `Simulation` owns every component and is the only way in: commands from
//! the outside (behavior changes, magnets, knights, pauses, terrain edits)
//! and the tick itself all go through it. Nothing is global.

pub mod contact;
pub mod events;
pub mod terrain_reactions;
pub mod tick;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::combat::CombatResolver;
use crate::core::config::SimulationConfig;
use crate::core::error::{Result, SimError};
use crate::core::grid::TilePos;
use crate::core::types::{Behavior, EntityRef, Faction, SettlementId, Tick, UnitClass, UnitId};
use crate::population::PopulationDirectory;
use crate::settlement::SettlementEconomy;
use crate::spatial::proximity::ProximityIndex;
use crate::spatial::snapshot::{SettlementSummary, TickSnapshot, UnitSummary};
use crate::terrain::TerrainOracle;

pub use events::{EventLog, RemovalCause, SimEvent, TimedEvent};
pub use tick::run_simulation_tick;

pub struct Simulation<T: TerrainOracle> {
    pub(crate) config: SimulationConfig,
    pub(crate) terrain: T,
    pub(crate) directory: PopulationDirectory,
    pub(crate) economy: SettlementEconomy,
    pub(crate) combat: CombatResolver,
    pub(crate) proximity: ProximityIndex,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) current_tick: Tick,
    pub(crate) events: EventLog,
}

impl<T: TerrainOracle> Simulation<T> {
    /// Build a simulation over the given terrain
    ///
    /// The map size always comes from the terrain.
    pub fn new(mut config: SimulationConfig, terrain: T) -> Result<Self> {
        config.map.tiles_per_side = terrain.tiles_per_side();
        config.validate()?;

        Ok(Self {
            directory: PopulationDirectory::new(&config),
            economy: SettlementEconomy::new(&config),
            combat: CombatResolver::new(&config.combat),
            proximity: ProximityIndex::new(config.proximity.clone()),
            rng: ChaCha8Rng::seed_from_u64(config.map.seed),
            current_tick: 0,
            events: EventLog::new(),
            config,
            terrain,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn terrain(&self) -> &T {
        &self.terrain
    }

    pub fn directory(&self) -> &PopulationDirectory {
        &self.directory
    }

    pub fn economy(&self) -> &SettlementEconomy {
        &self.economy
    }

    pub fn combat(&self) -> &CombatResolver {
        &self.combat
    }

    pub fn proximity(&self) -> &ProximityIndex {
        &self.proximity
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    /// Events since the last drain
    pub fn events(&self) -> &[TimedEvent] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<TimedEvent> {
        self.events.drain()
    }

    /// Advance one fixed timestep
    pub fn tick(&mut self) {
        run_simulation_tick(self);
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    fn check_tile(&self, tile: TilePos) -> Result<()> {
        if self.terrain.in_bounds(tile) {
            Ok(())
        } else {
            Err(SimError::OutOfBounds(tile))
        }
    }

    // === COMMANDS ===

    /// Spawn a walker; `Ok(None)` when the faction is at its cap
    pub fn spawn_unit(&mut self, faction: Faction, tile: TilePos, strength: u32) -> Result<Option<UnitId>> {
        self.check_tile(tile)?;
        Ok(self
            .directory
            .spawn(faction, UnitClass::Walker, tile, strength, &mut self.events))
    }

    /// Spawn a faction's starting units; the first one leads
    pub fn spawn_initial_roster(&mut self, faction: Faction, tiles: &[TilePos]) -> Result<Vec<UnitId>> {
        let strength = self.config.units.initial_strength;
        let mut spawned = Vec::with_capacity(tiles.len());
        for &tile in tiles {
            if let Some(id) = self.spawn_unit(faction, tile, strength)? {
                spawned.push(id);
            }
        }
        if let Some(&first) = spawned.first() {
            self.directory
                .set_leader_unit(faction, first, &mut self.events);
        }
        tracing::info!("Spawned {} initial {:?} units", spawned.len(), faction);
        Ok(spawned)
    }

    /// Change a faction's goal; units pick it up on the next tick
    pub fn set_behavior(&mut self, faction: Faction, behavior: Behavior) {
        self.directory.set_behavior(faction, behavior, &mut self.events);
    }

    pub fn set_magnet(&mut self, faction: Faction, tile: TilePos) -> Result<()> {
        self.check_tile(tile)?;
        self.directory.set_magnet(faction, tile, &mut self.events);
        Ok(())
    }

    /// Turn the faction's leader unit into a knight
    pub fn make_knight(&mut self, faction: Faction) -> Option<UnitId> {
        self.directory.make_knight(faction, &mut self.events)
    }

    pub fn pause_unit(&mut self, id: UnitId, paused: bool) -> Result<()> {
        let unit = self
            .directory
            .unit_mut(id)
            .ok_or(SimError::UnknownUnit(id))?;
        unit.agent.pause(paused);
        Ok(())
    }

    /// Place a settlement directly, e.g. for scenario setup
    pub fn found_settlement(&mut self, faction: Faction, tile: TilePos) -> Result<Option<SettlementId>> {
        self.check_tile(tile)?;
        let id = self.economy.found(
            faction,
            tile,
            &self.terrain,
            &mut self.directory,
            &mut self.events,
        );
        Ok(id)
    }

    /// Add followers to a settlement, up to its room
    pub fn add_followers(&mut self, id: SettlementId, amount: u32) -> Result<u32> {
        if self.economy.settlement(id).is_none() {
            return Err(SimError::UnknownSettlement(id));
        }
        Ok(self.economy.add_followers(id, amount, &mut self.events))
    }

    // === VIEWS ===

    /// Freeze every sensed entity as of now
    pub fn snapshot(&self) -> TickSnapshot {
        let mut snapshot = TickSnapshot::new();
        for unit in self.directory.units().iter() {
            let behavior = unit.effective_behavior(self.directory.behavior(unit.faction));
            snapshot.units.insert(
                unit.id,
                UnitSummary {
                    id: unit.id,
                    faction: unit.faction,
                    class: unit.class,
                    strength: unit.strength(),
                    tile: unit.tile,
                    in_fight: unit.in_fight(),
                    behavior,
                },
            );
        }
        for settlement in self.economy.settlements() {
            snapshot.settlements.insert(
                settlement.id,
                SettlementSummary {
                    id: settlement.id,
                    faction: settlement.faction,
                    tile: settlement.tile,
                    followers: settlement.followers,
                    capacity: settlement.capacity(self.economy.config()),
                    has_leader: settlement.has_leader,
                    attacked: settlement.attacked,
                },
            );
        }
        snapshot
    }

    /// Drop sensor references to everything removed since event `from`
    pub(crate) fn prune_removed(&mut self, from: usize) {
        let removed: Vec<EntityRef> = self.events.events()[from.min(self.events.len())..]
            .iter()
            .filter_map(|e| match e.event {
                SimEvent::UnitRemoved { unit, .. } => Some(EntityRef::Unit(unit)),
                SimEvent::SettlementDestroyed { settlement } => Some(EntityRef::Settlement(settlement)),
                _ => None,
            })
            .collect();
        for entity in removed {
            match entity {
                EntityRef::Unit(id) => self.proximity.forget_unit(id),
                settlement => self.proximity.remove_entity(settlement),
            }
        }
    }
}

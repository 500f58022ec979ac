//! Settlement population economy
//!
//! Settlements fill up one follower at a time, release a unit when full and
//! take their tier from the fields around them. Fields are claimed in a
//! window around the settlement; a field may serve several settlements of
//! the same faction and is destroyed when the last of them lets go.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::core::config::{EconomyConfig, SimulationConfig};
use crate::core::grid::{TilePos, TileRange};
use crate::core::types::{Faction, FieldId, SettlementId, UnitClass, UnitId};
use crate::movement::pathfinding::Pathfinder;
use crate::population::{LeaderSlot, PopulationDirectory};
use crate::settlement::settlement::{tier_for_fields, Field, Settlement};
use crate::settlement::structures::{Structure, StructureMap};
use crate::simulation::events::{EventLog, RemovalCause, SimEvent};
use crate::terrain::{TerrainFeature, TerrainOracle};

/// Flat, dry, unoccupied tile a settlement may be founded on
///
/// A tree does not disqualify the tile; it is cleared on founding.
pub fn is_free_site(terrain: &dyn TerrainOracle, structures: &StructureMap, tile: TilePos) -> bool {
    is_open_ground(terrain, tile) && !structures.is_occupied(tile)
}

fn is_open_ground(terrain: &dyn TerrainOracle, tile: TilePos) -> bool {
    terrain.in_bounds(tile)
        && terrain.is_tile_flat(tile)
        && !terrain.is_tile_underwater(tile)
        && terrain
            .feature_on_tile(tile)
            .map_or(true, TerrainFeature::is_clearable)
}

#[derive(Debug, Clone)]
pub struct SettlementEconomy {
    config: EconomyConfig,
    entry_cooldown_ticks: u32,
    settlements: BTreeMap<SettlementId, Settlement>,
    fields: BTreeMap<FieldId, Field>,
    structures: StructureMap,
    next_settlement_id: u32,
    next_field_id: u32,
}

impl SettlementEconomy {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            config: config.economy.clone(),
            entry_cooldown_ticks: config.units.entry_cooldown_ticks,
            settlements: BTreeMap::new(),
            fields: BTreeMap::new(),
            structures: StructureMap::new(),
            next_settlement_id: 1,
            next_field_id: 1,
        }
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn structures(&self) -> &StructureMap {
        &self.structures
    }

    pub fn settlement(&self, id: SettlementId) -> Option<&Settlement> {
        self.settlements.get(&id)
    }

    pub fn settlements(&self) -> impl Iterator<Item = &Settlement> {
        self.settlements.values()
    }

    pub fn settlement_ids(&self) -> Vec<SettlementId> {
        self.settlements.keys().copied().collect()
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(&id)
    }

    pub fn field_at(&self, tile: TilePos) -> Option<&Field> {
        match self.structures.get(tile) {
            Some(Structure::Field(id)) => self.fields.get(&id),
            _ => None,
        }
    }

    pub fn capacity(&self, id: SettlementId) -> u32 {
        self.settlements
            .get(&id)
            .map_or(0, |s| s.capacity(&self.config))
    }

    /// Fields currently counted by a settlement
    pub fn field_count(&self, id: SettlementId) -> usize {
        self.fields
            .values()
            .filter(|f| f.served.contains(&id))
            .count()
    }

    /// Settlements standing inside a tile range, in id order
    pub fn settlements_in(&self, range: TileRange) -> Vec<SettlementId> {
        self.settlements
            .values()
            .filter(|s| range.contains(s.tile))
            .map(|s| s.id)
            .collect()
    }

    // === FOUNDING ===

    /// Found a settlement on a free flat tile
    ///
    /// Returns `None` when the tile stopped being a valid site, in which case
    /// the founder simply goes back to roaming.
    pub fn found(
        &mut self,
        faction: Faction,
        tile: TilePos,
        terrain: &dyn TerrainOracle,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) -> Option<SettlementId> {
        if !is_free_site(terrain, &self.structures, tile) {
            return None;
        }
        let id = SettlementId(self.next_settlement_id);
        if !self.structures.place(tile, Structure::Settlement(id)) {
            return None;
        }
        self.next_settlement_id += 1;

        if terrain.feature_on_tile(tile) == Some(TerrainFeature::Tree) {
            events.push(SimEvent::TreeCleared { tile });
        }

        let mut settlement = Settlement::new(id, faction, tile, terrain.tile_center_height(tile));
        settlement.growth_countdown = settlement
            .profile(&self.config)
            .map_or(0, |p| p.growth_interval);
        self.settlements.insert(id, settlement);

        tracing::debug!("{:?} founded settlement {:?} at {:?}", faction, id, tile);
        events.push(SimEvent::SettlementFounded {
            settlement: id,
            faction,
            tile,
        });

        self.recompute_around(
            TileRange::around(tile, self.config.retier_radius),
            terrain,
            directory,
            events,
        );
        Some(id)
    }

    // === TIERS ===

    fn is_field_site(&self, terrain: &dyn TerrainOracle, tile: TilePos, faction: Faction) -> bool {
        if !is_open_ground(terrain, tile) {
            return false;
        }
        match self.structures.get(tile) {
            None => true,
            Some(Structure::Field(id)) => self.fields.get(&id).is_some_and(|f| f.faction == faction),
            Some(Structure::Settlement(_)) => false,
        }
    }

    /// Re-count a settlement's fields and apply the resulting tier
    ///
    /// Returns true when a field was created or destroyed, which changes the
    /// picture for neighbouring settlements.
    pub fn retier(
        &mut self,
        id: SettlementId,
        terrain: &dyn TerrainOracle,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) -> bool {
        let Some(settlement) = self.settlements.get(&id) else {
            return false;
        };
        let center = settlement.tile;
        let faction = match settlement.faction {
            Some(faction) if !settlement.is_ruin() => faction,
            _ => return self.release_fields(id, events),
        };
        let mut changed = false;

        // Let go of fields that stopped being valid first, so their tiles
        // can be reclaimed below
        let stale: Vec<FieldId> = self
            .fields
            .values()
            .filter(|f| f.served.contains(&id) && !self.is_field_site(terrain, f.tile, faction))
            .map(|f| f.id)
            .collect();
        for field in stale {
            changed |= self.unserve(field, id, events);
        }

        let window = TileRange::around(center, self.config.field_window_radius)
            .clamped(terrain.tiles_per_side());
        let sites: Vec<TilePos> = window
            .tiles()
            .filter(|&t| t != center && self.is_field_site(terrain, t, faction))
            .collect();

        for &tile in &sites {
            match self.structures.get(tile) {
                Some(Structure::Field(field)) => {
                    if let Some(field) = self.fields.get_mut(&field) {
                        field.served.insert(id);
                    }
                }
                None => {
                    self.create_field(faction, tile, id, terrain, events);
                    changed = true;
                }
                Some(Structure::Settlement(_)) => {}
            }
        }

        let tier = tier_for_fields(sites.len(), self.config.max_tier());
        self.apply_tier(id, tier, terrain, directory, events);
        changed
    }

    fn create_field(
        &mut self,
        faction: Faction,
        tile: TilePos,
        served_by: SettlementId,
        terrain: &dyn TerrainOracle,
        events: &mut EventLog,
    ) {
        let id = FieldId(self.next_field_id);
        if !self.structures.place(tile, Structure::Field(id)) {
            return;
        }
        self.next_field_id += 1;
        if terrain.feature_on_tile(tile) == Some(TerrainFeature::Tree) {
            events.push(SimEvent::TreeCleared { tile });
        }
        let mut field = Field::new(id, faction, tile);
        field.served.insert(served_by);
        self.fields.insert(id, field);
        events.push(SimEvent::FieldCreated {
            field: id,
            faction,
            tile,
        });
    }

    /// Stop counting a field for one settlement; returns true if it died
    fn unserve(&mut self, field: FieldId, settlement: SettlementId, events: &mut EventLog) -> bool {
        let Some(entry) = self.fields.get_mut(&field) else {
            return false;
        };
        entry.served.remove(&settlement);
        if !entry.served.is_empty() {
            return false;
        }
        let tile = entry.tile;
        self.fields.remove(&field);
        self.structures.despawn(tile);
        events.push(SimEvent::FieldDestroyed { field, tile });
        true
    }

    fn release_fields(&mut self, settlement: SettlementId, events: &mut EventLog) -> bool {
        let served: Vec<FieldId> = self
            .fields
            .values()
            .filter(|f| f.served.contains(&settlement))
            .map(|f| f.id)
            .collect();
        let mut changed = false;
        for field in served {
            changed |= self.unserve(field, settlement, events);
        }
        changed
    }

    fn apply_tier(
        &mut self,
        id: SettlementId,
        tier: usize,
        terrain: &dyn TerrainOracle,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) {
        let Some(settlement) = self.settlements.get_mut(&id) else {
            return;
        };
        let before = settlement.tier();
        let excess = settlement.set_tier(tier, &self.config);
        if settlement.tier() != before {
            events.push(SimEvent::SettlementTierChanged {
                settlement: id,
                tier: settlement.tier(),
                capacity: settlement.capacity(&self.config),
            });
        }
        if excess > 0 {
            events.push(SimEvent::SettlementFollowersChanged {
                settlement: id,
                followers: settlement.followers,
            });
            tracing::debug!("Settlement {:?} downgraded, releasing {} followers", id, excess);
            self.release_overflow(id, excess, terrain, directory, events);
        }
    }

    /// Re-tier every settlement in range, cascading through field changes
    pub fn recompute_around(
        &mut self,
        range: TileRange,
        terrain: &dyn TerrainOracle,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) {
        let mut queue: VecDeque<SettlementId> = self.settlements_in(range).into();
        let mut queued: BTreeSet<SettlementId> = queue.iter().copied().collect();

        while let Some(id) = queue.pop_front() {
            queued.remove(&id);
            let Some(tile) = self.settlements.get(&id).map(|s| s.tile) else {
                continue;
            };
            if !self.retier(id, terrain, directory, events) {
                continue;
            }
            for other in self.settlements_in(TileRange::around(tile, self.config.retier_radius)) {
                if other != id && queued.insert(other) {
                    queue.push_back(other);
                }
            }
        }
    }

    // === FOLLOWERS ===

    /// Add followers up to the free room; returns how many fit
    pub fn add_followers(&mut self, id: SettlementId, amount: u32, events: &mut EventLog) -> u32 {
        let Some(settlement) = self.settlements.get_mut(&id) else {
            return 0;
        };
        let accepted = amount.min(settlement.room(&self.config));
        if accepted > 0 {
            settlement.followers += accepted;
            events.push(SimEvent::SettlementFollowersChanged {
                settlement: id,
                followers: settlement.followers,
            });
        }
        accepted
    }

    /// Move a unit's strength into a friendly settlement
    ///
    /// Only the free room is transferred; whatever does not fit stays with
    /// the unit. A leader that fits entirely takes the leader slot inside.
    pub fn enter(
        &mut self,
        id: SettlementId,
        unit: UnitId,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) -> u32 {
        let Some(entrant) = directory.unit(unit) else {
            return 0;
        };
        let faction = entrant.faction;
        let strength = entrant.strength();
        let is_leader = directory.leader(faction) == LeaderSlot::Unit(unit);
        match self.settlements.get(&id) {
            Some(s) if s.faction == Some(faction) && !s.is_ruin() => {}
            _ => return 0,
        }

        let accepted = self.add_followers(id, strength, events);
        if accepted == 0 {
            return 0;
        }
        if accepted == strength {
            if is_leader {
                self.house_leader(id, faction, directory, events);
            }
            directory.remove_unit(unit, RemovalCause::EnteredSettlement, events);
        } else if let Some(entrant) = directory.unit_mut(unit) {
            let remaining = entrant.lose_strength(accepted);
            events.push(SimEvent::UnitStrengthChanged {
                unit,
                strength: remaining,
            });
        }
        accepted
    }

    fn house_leader(
        &mut self,
        id: SettlementId,
        faction: Faction,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) {
        let previous = directory.set_leader_settlement(faction, id, events);
        if let LeaderSlot::Settlement(old) = previous {
            if let Some(old) = self.settlements.get_mut(&old) {
                old.has_leader = false;
            }
        }
        if let Some(settlement) = self.settlements.get_mut(&id) {
            settlement.has_leader = true;
        }
    }

    /// The settlement loses the faction leader it was holding
    fn drop_leader(
        &mut self,
        id: SettlementId,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) {
        let Some(settlement) = self.settlements.get_mut(&id) else {
            return;
        };
        if !std::mem::take(&mut settlement.has_leader) {
            return;
        }
        if let Some(faction) = settlement.faction {
            if directory.leader(faction) == LeaderSlot::Settlement(id) {
                directory.clear_leader(faction, events);
            }
        }
    }

    // === RELEASES ===

    fn release_tile(&self, tile: TilePos, terrain: &dyn TerrainOracle) -> TilePos {
        Pathfinder::new(terrain, &self.structures)
            .free_neighbor(tile, tile)
            .unwrap_or(tile)
    }

    /// Spawn a unit from a settlement's followers
    ///
    /// `forced` releases bypass the population cap; they convert followers
    /// that already exist rather than growing the faction.
    fn release(
        &mut self,
        id: SettlementId,
        strength: u32,
        forced: bool,
        terrain: &dyn TerrainOracle,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) -> Option<UnitId> {
        let settlement = self.settlements.get(&id)?;
        let faction = settlement.faction?;
        let tile = self.release_tile(settlement.tile, terrain);
        let has_leader = settlement.has_leader;

        let unit = if forced {
            directory.spawn_forced(faction, UnitClass::Walker, tile, strength, events)
        } else {
            directory.spawn(faction, UnitClass::Walker, tile, strength, events)
        }?;

        if let Some(released) = directory.unit_mut(unit) {
            released.origin = Some(id);
            released.entry_cooldown = self.entry_cooldown_ticks;
        }

        // The first unit out of the leader settlement leads the faction
        if has_leader {
            if let Some(LeaderSlot::Settlement(old)) = directory.set_leader_unit(faction, unit, events) {
                if let Some(old) = self.settlements.get_mut(&old) {
                    old.has_leader = false;
                }
            }
            if let Some(settlement) = self.settlements.get_mut(&id) {
                settlement.has_leader = false;
            }
        }
        Some(unit)
    }

    /// Turn followers that no longer fit into units
    fn release_overflow(
        &mut self,
        id: SettlementId,
        excess: u32,
        terrain: &dyn TerrainOracle,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) {
        let mut remaining = excess;
        while remaining > 0 {
            let chunk = remaining.min(directory.max_strength());
            if self
                .release(id, chunk, true, terrain, directory, events)
                .is_none()
            {
                break;
            }
            remaining -= chunk;
        }
    }

    /// Advance every growth countdown by one tick
    pub fn tick(
        &mut self,
        terrain: &dyn TerrainOracle,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) {
        for id in self.settlement_ids() {
            let Some(settlement) = self.settlements.get_mut(&id) else {
                continue;
            };
            if settlement.is_ruin() || settlement.attacked {
                continue;
            }
            let Some(profile) = settlement.profile(&self.config).copied() else {
                continue;
            };

            settlement.growth_countdown = settlement.growth_countdown.saturating_sub(1);
            if settlement.growth_countdown > 0 {
                continue;
            }
            settlement.growth_countdown = profile.growth_interval;

            if settlement.followers < profile.capacity {
                settlement.followers += 1;
                events.push(SimEvent::SettlementFollowersChanged {
                    settlement: id,
                    followers: settlement.followers,
                });
            }
            if settlement.followers < profile.capacity {
                continue;
            }

            // Full: release one unit, or hold the followers at the cap
            let strength = profile.release_strength.min(settlement.followers);
            if self
                .release(id, strength, false, terrain, directory, events)
                .is_some()
            {
                if let Some(settlement) = self.settlements.get_mut(&id) {
                    settlement.followers -= strength;
                    events.push(SimEvent::SettlementFollowersChanged {
                        settlement: id,
                        followers: settlement.followers,
                    });
                }
            }
        }
    }

    // === DEFENSE ===

    /// An enemy touched the settlement: every follower turns out to defend
    ///
    /// Returns the defender, or `None` if the settlement cannot be attacked
    /// (already under attack, ruined) or had nobody to defend it.
    pub fn begin_defense(
        &mut self,
        id: SettlementId,
        attacker: UnitId,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) -> Option<UnitId> {
        let settlement = self.settlements.get_mut(&id)?;
        let faction = settlement.faction?;
        if settlement.attacked || settlement.is_ruin() {
            return None;
        }
        settlement.attacked = true;
        events.push(SimEvent::SettlementAttacked {
            settlement: id,
            attacker,
        });

        let followers = std::mem::take(&mut settlement.followers);
        let tile = settlement.tile;
        if followers == 0 {
            return None;
        }
        events.push(SimEvent::SettlementFollowersChanged {
            settlement: id,
            followers: 0,
        });

        let defender = directory.spawn_forced(faction, UnitClass::Walker, tile, followers, events)?;
        if let Some(unit) = directory.unit_mut(defender) {
            unit.origin = Some(id);
        }
        tracing::debug!("Settlement {:?} defended by {:?} against {:?}", id, defender, attacker);
        Some(defender)
    }

    /// The defense ended without a winner taking the settlement
    pub fn end_defense(
        &mut self,
        id: SettlementId,
        terrain: &dyn TerrainOracle,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) {
        let Some(settlement) = self.settlements.get_mut(&id) else {
            return;
        };
        settlement.attacked = false;
        if settlement.followers == 0 && !settlement.is_ruin() {
            self.destroy(id, terrain, directory, events);
        }
    }

    /// Hand the settlement to the faction that conquered it
    pub fn capture(
        &mut self,
        id: SettlementId,
        faction: Faction,
        terrain: &dyn TerrainOracle,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) {
        self.drop_leader(id, directory, events);
        let Some(settlement) = self.settlements.get_mut(&id) else {
            return;
        };
        if settlement.is_ruin() {
            return;
        }
        settlement.faction = Some(faction);
        settlement.attacked = false;
        let tile = settlement.tile;

        tracing::debug!("Settlement {:?} captured by {:?}", id, faction);
        events.push(SimEvent::SettlementCaptured {
            settlement: id,
            faction,
        });
        self.recompute_around(
            TileRange::around(tile, self.config.retier_radius),
            terrain,
            directory,
            events,
        );
    }

    /// Burn the settlement down to a neutral ruin
    pub fn burn(
        &mut self,
        id: SettlementId,
        terrain: &dyn TerrainOracle,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) {
        self.drop_leader(id, directory, events);
        let Some(settlement) = self.settlements.get_mut(&id) else {
            return;
        };
        settlement.burn();
        let tile = settlement.tile;

        tracing::debug!("Settlement {:?} burned to a ruin", id);
        events.push(SimEvent::SettlementBurned { settlement: id });
        events.push(SimEvent::SettlementTierChanged {
            settlement: id,
            tier: None,
            capacity: 0,
        });
        events.push(SimEvent::SettlementFollowersChanged {
            settlement: id,
            followers: 0,
        });

        if self.release_fields(id, events) {
            self.recompute_around(
                TileRange::around(tile, self.config.retier_radius),
                terrain,
                directory,
                events,
            );
        }
    }

    /// Remove the settlement and its tile claim entirely
    pub fn destroy(
        &mut self,
        id: SettlementId,
        terrain: &dyn TerrainOracle,
        directory: &mut PopulationDirectory,
        events: &mut EventLog,
    ) {
        self.drop_leader(id, directory, events);
        let Some(settlement) = self.settlements.remove(&id) else {
            return;
        };
        self.structures.despawn(settlement.tile);
        self.release_fields(id, events);

        tracing::debug!("Settlement {:?} destroyed", id);
        events.push(SimEvent::SettlementDestroyed { settlement: id });

        self.recompute_around(
            TileRange::around(settlement.tile, self.config.retier_radius),
            terrain,
            directory,
            events,
        );
    }
}

//! Keeping the world consistent after the ground changes
//!
//! Terrain is edited from outside the core. After an edit the affected
//! range is re-examined: units standing in water drown, settlements whose
//! ground sank, tilted or flooded are destroyed, and fields and tiers
//! around the edit are recomputed.

use crate::core::grid::TileRange;
use crate::simulation::events::RemovalCause;
use crate::simulation::Simulation;
use crate::terrain::TerrainOracle;

impl<T: TerrainOracle> Simulation<T> {
    /// Edit the terrain, then react to whatever range it reports
    pub fn edit_terrain(&mut self, edit: impl FnOnce(&mut T)) {
        edit(&mut self.terrain);
        if let Some(range) = self.terrain.affected_tile_range() {
            self.on_terrain_modified(range);
        }
    }

    /// React to terrain edited within `range`
    pub fn on_terrain_modified(&mut self, range: TileRange) {
        let first_event = self.events.len();
        let tiles_per_side = self.terrain.tiles_per_side();
        let touched = range.expanded(1).clamped(tiles_per_side);

        let mut drowned = 0;
        for id in self.directory.units().ids() {
            let Some(unit) = self.directory.unit_mut(id) else {
                continue;
            };
            // Paths planned over the old ground may no longer be valid
            unit.agent.clear_route();
            if touched.contains(unit.tile) && self.terrain.is_tile_underwater(unit.tile) {
                self.directory
                    .remove_unit(id, RemovalCause::Drowned, &mut self.events);
                drowned += 1;
            }
        }

        let mut destroyed = 0;
        for id in self.economy.settlements_in(touched) {
            let Some(settlement) = self.economy.settlement(id) else {
                continue;
            };
            let tile = settlement.tile;
            let sunk = self.terrain.is_tile_underwater(tile)
                || !self.terrain.is_tile_flat(tile)
                || (self.terrain.tile_center_height(tile) - settlement.recorded_height).abs() > f32::EPSILON;
            if sunk {
                self.economy
                    .destroy(id, &self.terrain, &mut self.directory, &mut self.events);
                destroyed += 1;
            }
        }

        let window = self.economy.config().field_window_radius;
        self.economy.recompute_around(
            touched.expanded(window),
            &self.terrain,
            &mut self.directory,
            &mut self.events,
        );
        self.prune_removed(first_event);

        tracing::debug!(
            "Terrain changed in {:?}: {} units drowned, {} settlements destroyed",
            range,
            drowned,
            destroyed
        );
    }

    /// React to a sea level change, which can touch any tile
    pub fn on_flood(&mut self) {
        let range = self.terrain.full_range();
        self.on_terrain_modified(range);
    }
}

//! Read-only terrain queries consumed by the simulation core
//!
//! The core never owns height or terrain-type data. It asks a
//! `TerrainOracle` and keys everything else by grid coordinate.

pub mod grid;

use serde::{Deserialize, Serialize};

use crate::core::grid::{TilePos, TileRange};

pub use grid::GridTerrain;

/// Natural features the terrain may carry on a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainFeature {
    Rock,
    Tree,
    Swamp,
}

impl TerrainFeature {
    /// Rocks stop movement; trees and swamp do not
    pub fn blocks_movement(self) -> bool {
        matches!(self, TerrainFeature::Rock)
    }

    /// A field may be laid over the feature by clearing it first
    pub fn is_clearable(self) -> bool {
        matches!(self, TerrainFeature::Tree)
    }
}

/// Terrain queries the simulation depends on
///
/// Corner points share the tile coordinate space: point `(x, z)` is the
/// lower-left corner of tile `(x, z)`, so points run `0..=tiles_per_side`.
pub trait TerrainOracle {
    fn tiles_per_side(&self) -> i32;

    fn is_tile_underwater(&self, tile: TilePos) -> bool;

    fn is_tile_flat(&self, tile: TilePos) -> bool;

    fn feature_on_tile(&self, tile: TilePos) -> Option<TerrainFeature>;

    fn tile_center_height(&self, tile: TilePos) -> f32;

    fn point_height(&self, point: TilePos) -> f32;

    /// Whether a single step between adjacent tiles is possible terrain-wise
    fn can_cross_tile(&self, from: TilePos, to: TilePos) -> bool;

    /// Tiles touched by the most recent edit, if any
    fn affected_tile_range(&self) -> Option<TileRange>;

    fn in_bounds(&self, tile: TilePos) -> bool {
        tile.in_bounds(self.tiles_per_side())
    }

    /// Whole map as a range
    fn full_range(&self) -> TileRange {
        let max = self.tiles_per_side() - 1;
        TileRange::new(TilePos::new(0, 0), TilePos::new(max, max))
    }
}

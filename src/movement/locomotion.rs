//! Turning tile-to-tile legs into timed sub-moves
//!
//! An orthogonal leg is a single sub-move to the destination center. A
//! diagonal leg passes over the corner point the two tiles share, so it is
//! split in two: first to the corner, then on to the destination center.

use crate::core::grid::TilePos;
use crate::core::types::WorldPos;
use crate::terrain::TerrainOracle;

/// One tick of motion along a leg
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubMove {
    /// Destination tile of the whole leg
    pub tile: TilePos,
    pub position: WorldPos,
    /// Degrees clockwise from north
    pub facing: f32,
    /// Last sub-move of the leg; the unit now stands on `tile`
    pub completes_leg: bool,
    /// The leg was a roam step (counted and subject to decay)
    pub roamed: bool,
}

/// World position of a tile center
pub fn tile_center(tile: TilePos, terrain: &dyn TerrainOracle) -> WorldPos {
    WorldPos {
        x: tile.x as f32 + 0.5,
        height: terrain.tile_center_height(tile),
        z: tile.z as f32 + 0.5,
    }
}

fn corner(point: TilePos, terrain: &dyn TerrainOracle) -> WorldPos {
    WorldPos {
        x: point.x as f32,
        height: terrain.point_height(point),
        z: point.z as f32,
    }
}

/// Facing from one position to another, degrees clockwise from north
pub fn facing(from: WorldPos, to: WorldPos) -> f32 {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    if dx == 0.0 && dz == 0.0 {
        return 0.0;
    }
    dx.atan2(dz).to_degrees().rem_euclid(360.0)
}

/// Plan the sub-moves for one step between adjacent tiles
pub fn plan_leg(from: TilePos, to: TilePos, roamed: bool, terrain: &dyn TerrainOracle) -> Vec<SubMove> {
    let start = tile_center(from, terrain);
    let end = tile_center(to, terrain);

    if from.x == to.x || from.z == to.z {
        return vec![SubMove {
            tile: to,
            position: end,
            facing: facing(start, end),
            completes_leg: true,
            roamed,
        }];
    }

    let shared = corner(TilePos::new(from.x.max(to.x), from.z.max(to.z)), terrain);
    vec![
        SubMove {
            tile: to,
            position: shared,
            facing: facing(start, shared),
            completes_leg: false,
            roamed,
        },
        SubMove {
            tile: to,
            position: end,
            facing: facing(shared, end),
            completes_leg: true,
            roamed,
        },
    ]
}

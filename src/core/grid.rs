//! Grid coordinates and the eight compass directions
//!
//! The map is a square of tiles addressed by `TilePos { x, z }`. Path
//! waypoints, unit locations and structure footprints all use the same
//! coordinate, so a "terrain point" in a path is simply a tile coordinate.

use serde::{Deserialize, Serialize};

use crate::core::types::Vec2;

/// Orthogonal move cost in the A* metric
pub const ORTHOGONAL_COST: u32 = 10;
/// Diagonal move cost in the A* metric
pub const DIAGONAL_COST: u32 = 14;

/// Tile coordinate on the square grid
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct TilePos {
    pub x: i32,
    pub z: i32,
}

impl TilePos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn offset(&self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }

    /// Neighbouring tile in the given direction
    pub fn step(&self, dir: Compass) -> Self {
        let (dx, dz) = dir.offset();
        self.offset(dx, dz)
    }

    /// Square-radius distance (king moves)
    pub fn chebyshev(&self, other: &Self) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    /// Diagonal distance under the 10/14 metric
    pub fn octile(&self, other: &Self) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dz = (self.z - other.z).unsigned_abs();
        let diag = dx.min(dz);
        let straight = dx.max(dz) - diag;
        diag * DIAGONAL_COST + straight * ORTHOGONAL_COST
    }

    pub fn distance_sq(&self, other: &Self) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dz = i64::from(self.z - other.z);
        dx * dx + dz * dz
    }

    /// All eight neighbours in compass order
    pub fn neighbors(&self) -> [TilePos; 8] {
        Compass::ALL.map(|dir| self.step(dir))
    }

    pub fn in_bounds(&self, tiles_per_side: i32) -> bool {
        self.x >= 0 && self.z >= 0 && self.x < tiles_per_side && self.z < tiles_per_side
    }

    /// Offset from `self` to `other` as a float vector
    pub fn vector_to(&self, other: &Self) -> Vec2 {
        Vec2::new((other.x - self.x) as f32, (other.z - self.z) as f32)
    }
}

/// The eight compass directions, clockwise from north
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Compass {
    #[default]
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Compass {
    pub const ALL: [Compass; 8] = [
        Compass::North,
        Compass::NorthEast,
        Compass::East,
        Compass::SouthEast,
        Compass::South,
        Compass::SouthWest,
        Compass::West,
        Compass::NorthWest,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: i32) -> Compass {
        Compass::ALL[index.rem_euclid(8) as usize]
    }

    /// Rotate clockwise by `steps` eighth-turns (negative is counter-clockwise)
    pub fn rotate(self, steps: i32) -> Compass {
        Compass::from_index(self.index() as i32 + steps)
    }

    pub fn opposite(self) -> Compass {
        self.rotate(4)
    }

    pub fn offset(self) -> (i32, i32) {
        match self {
            Compass::North => (0, 1),
            Compass::NorthEast => (1, 1),
            Compass::East => (1, 0),
            Compass::SouthEast => (1, -1),
            Compass::South => (0, -1),
            Compass::SouthWest => (-1, -1),
            Compass::West => (-1, 0),
            Compass::NorthWest => (-1, 1),
        }
    }

    pub fn is_diagonal(self) -> bool {
        let (dx, dz) = self.offset();
        dx != 0 && dz != 0
    }

    /// Direction of a single king move, if the offset is one
    pub fn from_offset(dx: i32, dz: i32) -> Option<Compass> {
        Compass::ALL
            .into_iter()
            .find(|dir| dir.offset() == (dx.signum(), dz.signum()) && dx.abs() <= 1 && dz.abs() <= 1)
            .filter(|_| dx != 0 || dz != 0)
    }

    /// Closest compass direction to a vector, `None` for the zero vector
    pub fn nearest(v: Vec2) -> Option<Compass> {
        if v.is_zero() {
            return None;
        }
        let angle = v.x.atan2(v.y).to_degrees();
        let sector = (angle / 45.0).round() as i32;
        Some(Compass::from_index(sector))
    }

    /// Facing in degrees, clockwise from north
    pub fn degrees(self) -> f32 {
        self.index() as f32 * 45.0
    }
}

/// Inclusive rectangle of tiles, e.g. the range touched by a terrain edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRange {
    pub bottom_left: TilePos,
    pub top_right: TilePos,
}

impl TileRange {
    pub fn new(bottom_left: TilePos, top_right: TilePos) -> Self {
        Self {
            bottom_left: TilePos::new(bottom_left.x.min(top_right.x), bottom_left.z.min(top_right.z)),
            top_right: TilePos::new(bottom_left.x.max(top_right.x), bottom_left.z.max(top_right.z)),
        }
    }

    /// Square of the given radius around a tile
    pub fn around(center: TilePos, radius: i32) -> Self {
        Self::new(center.offset(-radius, -radius), center.offset(radius, radius))
    }

    pub fn contains(&self, tile: TilePos) -> bool {
        tile.x >= self.bottom_left.x
            && tile.x <= self.top_right.x
            && tile.z >= self.bottom_left.z
            && tile.z <= self.top_right.z
    }

    pub fn expanded(&self, by: i32) -> Self {
        Self::new(self.bottom_left.offset(-by, -by), self.top_right.offset(by, by))
    }

    pub fn clamped(&self, tiles_per_side: i32) -> Self {
        let max = tiles_per_side - 1;
        Self::new(
            TilePos::new(self.bottom_left.x.clamp(0, max), self.bottom_left.z.clamp(0, max)),
            TilePos::new(self.top_right.x.clamp(0, max), self.top_right.z.clamp(0, max)),
        )
    }

    pub fn tiles(&self) -> impl Iterator<Item = TilePos> + '_ {
        (self.bottom_left.z..=self.top_right.z)
            .flat_map(move |z| (self.bottom_left.x..=self.top_right.x).map(move |x| TilePos::new(x, z)))
    }
}

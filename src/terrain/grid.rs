//! In-memory heightmap terrain
//!
//! Integer heights live on the corner points; a tile is flat when its four
//! corners agree and underwater when none of them rises above the water
//! level. Used by the headless runner and the test suites.

use ahash::AHashMap;
use rand::Rng;

use crate::core::grid::{TilePos, TileRange};
use crate::terrain::{TerrainFeature, TerrainOracle};

/// Largest center-height difference a unit can climb in one step
const MAX_CLIMB: f32 = 1.5;

#[derive(Debug, Clone)]
pub struct GridTerrain {
    tiles_per_side: i32,
    heights: Vec<i32>,
    water_level: i32,
    features: AHashMap<TilePos, TerrainFeature>,
    last_edit: Option<TileRange>,
}

impl GridTerrain {
    /// Flat map with every corner at `height`
    pub fn flat(tiles_per_side: i32, height: i32) -> Self {
        let side = (tiles_per_side.max(1) + 1) as usize;
        Self {
            tiles_per_side: tiles_per_side.max(1),
            heights: vec![height; side * side],
            water_level: 0,
            features: AHashMap::new(),
            last_edit: None,
        }
    }

    /// Rolling hills with scattered rocks and trees
    pub fn generate(tiles_per_side: i32, rng: &mut impl Rng) -> Self {
        let mut terrain = Self::flat(tiles_per_side, 1);
        let hills = (tiles_per_side / 6).max(1);

        for _ in 0..hills {
            let cx = rng.gen_range(0..=tiles_per_side);
            let cz = rng.gen_range(0..=tiles_per_side);
            let peak = rng.gen_range(1..=3);
            for point in TileRange::around(TilePos::new(cx, cz), peak).tiles() {
                if terrain.point_index(point).is_some() {
                    let falloff = point.chebyshev(&TilePos::new(cx, cz));
                    let height = terrain.raw_height(point) + (peak - falloff).max(0);
                    terrain.set_point_height(point, height);
                }
            }
        }

        for _ in 0..hills {
            let cx = rng.gen_range(0..=tiles_per_side);
            let cz = rng.gen_range(0..=tiles_per_side);
            for point in TileRange::around(TilePos::new(cx, cz), 2).tiles() {
                if terrain.point_index(point).is_some() {
                    terrain.set_point_height(point, 0);
                }
            }
        }

        for tile in terrain.full_range().tiles().collect::<Vec<_>>() {
            let roll: f32 = rng.gen();
            if roll < 0.02 {
                terrain.set_feature(tile, TerrainFeature::Rock);
            } else if roll < 0.08 {
                terrain.set_feature(tile, TerrainFeature::Tree);
            }
        }

        terrain.last_edit = None;
        terrain
    }

    fn point_index(&self, point: TilePos) -> Option<usize> {
        let side = self.tiles_per_side + 1;
        if point.x < 0 || point.z < 0 || point.x >= side || point.z >= side {
            return None;
        }
        Some((point.z * side + point.x) as usize)
    }

    fn raw_height(&self, point: TilePos) -> i32 {
        self.point_index(point)
            .and_then(|i| self.heights.get(i).copied())
            .unwrap_or(0)
    }

    fn corners(&self, tile: TilePos) -> [i32; 4] {
        [
            self.raw_height(tile),
            self.raw_height(tile.offset(1, 0)),
            self.raw_height(tile.offset(0, 1)),
            self.raw_height(tile.offset(1, 1)),
        ]
    }

    pub fn water_level(&self) -> i32 {
        self.water_level
    }

    /// Set one corner height, recording the four tiles around it as edited
    pub fn set_point_height(&mut self, point: TilePos, height: i32) {
        if let Some(index) = self.point_index(point) {
            self.heights[index] = height.max(0);
            self.last_edit = Some(
                TileRange::new(point.offset(-1, -1), point).clamped(self.tiles_per_side),
            );
        }
    }

    pub fn raise_point(&mut self, point: TilePos) {
        let height = self.raw_height(point) + 1;
        self.set_point_height(point, height);
    }

    pub fn lower_point(&mut self, point: TilePos) {
        let height = self.raw_height(point) - 1;
        self.set_point_height(point, height);
    }

    /// Set all four corners of a tile, e.g. to flatten it
    pub fn set_tile_height(&mut self, tile: TilePos, height: i32) {
        for corner in [tile, tile.offset(1, 0), tile.offset(0, 1), tile.offset(1, 1)] {
            if let Some(index) = self.point_index(corner) {
                self.heights[index] = height.max(0);
            }
        }
        self.last_edit = Some(TileRange::around(tile, 1).clamped(self.tiles_per_side));
    }

    pub fn set_feature(&mut self, tile: TilePos, feature: TerrainFeature) {
        if self.in_bounds(tile) {
            self.features.insert(tile, feature);
        }
    }

    pub fn clear_feature(&mut self, tile: TilePos) {
        self.features.remove(&tile);
    }

    /// Raise the sea by one level; the whole map is affected
    pub fn flood(&mut self) {
        self.water_level += 1;
        self.last_edit = Some(self.full_range());
    }
}

impl TerrainOracle for GridTerrain {
    fn tiles_per_side(&self) -> i32 {
        self.tiles_per_side
    }

    fn is_tile_underwater(&self, tile: TilePos) -> bool {
        if !self.in_bounds(tile) {
            return true;
        }
        self.corners(tile).iter().all(|&h| h <= self.water_level)
    }

    fn is_tile_flat(&self, tile: TilePos) -> bool {
        if !self.in_bounds(tile) {
            return false;
        }
        let [a, b, c, d] = self.corners(tile);
        a == b && b == c && c == d
    }

    fn feature_on_tile(&self, tile: TilePos) -> Option<TerrainFeature> {
        self.features.get(&tile).copied()
    }

    fn tile_center_height(&self, tile: TilePos) -> f32 {
        self.corners(tile).iter().sum::<i32>() as f32 / 4.0
    }

    fn point_height(&self, point: TilePos) -> f32 {
        self.raw_height(point) as f32
    }

    fn can_cross_tile(&self, from: TilePos, to: TilePos) -> bool {
        if !self.in_bounds(from) || !self.in_bounds(to) || from.chebyshev(&to) != 1 {
            return false;
        }
        if self.is_tile_underwater(to) {
            return false;
        }
        (self.tile_center_height(to) - self.tile_center_height(from)).abs() <= MAX_CLIMB
    }

    fn affected_tile_range(&self) -> Option<TileRange> {
        self.last_edit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_flat_map_queries() {
        let terrain = GridTerrain::flat(8, 1);
        let tile = TilePos::new(3, 3);
        assert!(terrain.is_tile_flat(tile));
        assert!(!terrain.is_tile_underwater(tile));
        assert_eq!(terrain.tile_center_height(tile), 1.0);
        assert!(terrain.can_cross_tile(tile, TilePos::new(4, 4)));
        assert!(!terrain.can_cross_tile(tile, TilePos::new(5, 4)));
    }

    #[test]
    fn test_raising_a_corner_breaks_flatness() {
        let mut terrain = GridTerrain::flat(8, 1);
        terrain.raise_point(TilePos::new(4, 4));
        assert!(!terrain.is_tile_flat(TilePos::new(3, 3)));
        assert!(!terrain.is_tile_flat(TilePos::new(4, 4)));
        assert!(terrain.is_tile_flat(TilePos::new(5, 5)));

        let range = terrain.affected_tile_range().unwrap();
        assert!(range.contains(TilePos::new(3, 3)));
        assert!(range.contains(TilePos::new(4, 4)));
    }

    #[test]
    fn test_flood_submerges_low_tiles() {
        let mut terrain = GridTerrain::flat(8, 1);
        terrain.set_tile_height(TilePos::new(6, 6), 3);
        terrain.flood();
        assert!(terrain.is_tile_underwater(TilePos::new(0, 0)));
        assert!(!terrain.is_tile_underwater(TilePos::new(6, 6)));
    }

    #[test]
    fn test_out_of_bounds_is_water() {
        let terrain = GridTerrain::flat(4, 1);
        assert!(terrain.is_tile_underwater(TilePos::new(-1, 0)));
        assert!(!terrain.is_tile_flat(TilePos::new(4, 0)));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = GridTerrain::generate(24, &mut ChaCha8Rng::seed_from_u64(7));
        let b = GridTerrain::generate(24, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a.heights, b.heights);
        assert!(a.affected_tile_range().is_none());
    }
}

//! Per-faction count of roam visits per tile

use crate::core::grid::TilePos;

#[derive(Debug, Clone)]
pub struct StepGrid {
    tiles_per_side: i32,
    visits: Vec<u32>,
}

impl StepGrid {
    pub fn new(tiles_per_side: i32) -> Self {
        let side = tiles_per_side.max(0) as usize;
        Self {
            tiles_per_side,
            visits: vec![0; side * side],
        }
    }

    fn index(&self, tile: TilePos) -> Option<usize> {
        tile.in_bounds(self.tiles_per_side)
            .then(|| (tile.z * self.tiles_per_side + tile.x) as usize)
    }

    pub fn visits(&self, tile: TilePos) -> u32 {
        self.index(tile)
            .and_then(|i| self.visits.get(i).copied())
            .unwrap_or(u32::MAX)
    }

    /// Count a visit and return the new total
    pub fn record(&mut self, tile: TilePos) -> u32 {
        match self.index(tile).and_then(|i| self.visits.get_mut(i)) {
            Some(count) => {
                *count = count.saturating_add(1);
                *count
            }
            None => 0,
        }
    }
}

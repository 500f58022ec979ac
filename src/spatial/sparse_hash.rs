//! Sparse hash grid for efficient spatial queries

use ahash::AHashMap;

use crate::core::grid::TilePos;
use crate::core::types::EntityRef;

/// Sparse bucketed grid for square-radius neighbour queries
#[derive(Debug, Clone)]
pub struct SparseHashGrid {
    bucket_size: i32,
    cells: AHashMap<(i32, i32), Vec<(EntityRef, TilePos)>>,
}

impl SparseHashGrid {
    pub fn new(bucket_size: i32) -> Self {
        Self {
            bucket_size: bucket_size.max(1),
            cells: AHashMap::new(),
        }
    }

    #[inline]
    fn cell_coord(&self, tile: TilePos) -> (i32, i32) {
        (
            tile.x.div_euclid(self.bucket_size),
            tile.z.div_euclid(self.bucket_size),
        )
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn insert(&mut self, entity: EntityRef, tile: TilePos) {
        let coord = self.cell_coord(tile);
        self.cells.entry(coord).or_default().push((entity, tile));
    }

    pub fn remove(&mut self, entity: EntityRef, tile: TilePos) {
        let coord = self.cell_coord(tile);
        if let Some(cell) = self.cells.get_mut(&coord) {
            cell.retain(|&(e, _)| e != entity);
        }
    }

    /// All entries whose tile lies within `radius` (Chebyshev) of `center`
    pub fn query_square(
        &self,
        center: TilePos,
        radius: i32,
    ) -> impl Iterator<Item = (EntityRef, TilePos)> + '_ {
        let (min_x, min_z) = self.cell_coord(center.offset(-radius, -radius));
        let (max_x, max_z) = self.cell_coord(center.offset(radius, radius));

        (min_x..=max_x)
            .flat_map(move |cx| {
                (min_z..=max_z).flat_map(move |cz| self.cells.get(&(cx, cz)).into_iter().flatten())
            })
            .copied()
            .filter(move |(_, tile)| tile.chebyshev(&center) <= radius)
    }

    /// Rebuild grid from positions
    pub fn rebuild(&mut self, entities: impl Iterator<Item = (EntityRef, TilePos)>) {
        self.clear();
        for (entity, tile) in entities {
            self.insert(entity, tile);
        }
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{SettlementId, UnitId};

    #[test]
    fn test_query_square_crosses_buckets() {
        let mut grid = SparseHashGrid::new(4);
        grid.insert(EntityRef::Unit(UnitId(1)), TilePos::new(3, 3));
        grid.insert(EntityRef::Unit(UnitId(2)), TilePos::new(5, 4));
        grid.insert(EntityRef::Settlement(SettlementId(1)), TilePos::new(12, 12));

        let found: Vec<_> = grid.query_square(TilePos::new(4, 4), 1).map(|(e, _)| e).collect();
        assert_eq!(found.len(), 2);
        assert!(!found.contains(&EntityRef::Settlement(SettlementId(1))));
    }

    #[test]
    fn test_remove_and_rebuild() {
        let mut grid = SparseHashGrid::new(8);
        let unit = EntityRef::Unit(UnitId(7));
        grid.insert(unit, TilePos::new(1, 1));
        grid.remove(unit, TilePos::new(1, 1));
        assert!(grid.is_empty());

        grid.rebuild([(unit, TilePos::new(2, 2))].into_iter());
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.query_square(TilePos::new(0, 0), 2).count(), 1);
    }
}

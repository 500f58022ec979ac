//! Core-owned structures standing on tiles

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::grid::TilePos;
use crate::core::types::{FieldId, SettlementId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Structure {
    Settlement(SettlementId),
    Field(FieldId),
}

impl Structure {
    pub fn blocks_movement(self) -> bool {
        matches!(self, Structure::Settlement(_))
    }
}

/// Which structure occupies which tile
#[derive(Debug, Clone, Default)]
pub struct StructureMap {
    tiles: AHashMap<TilePos, Structure>,
}

impl StructureMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tile: TilePos) -> Option<Structure> {
        self.tiles.get(&tile).copied()
    }

    pub fn is_occupied(&self, tile: TilePos) -> bool {
        self.tiles.contains_key(&tile)
    }

    pub fn blocks_movement(&self, tile: TilePos) -> bool {
        self.get(tile).is_some_and(Structure::blocks_movement)
    }

    /// Place a structure; refuses occupied tiles
    pub fn place(&mut self, tile: TilePos, structure: Structure) -> bool {
        if self.tiles.contains_key(&tile) {
            return false;
        }
        self.tiles.insert(tile, structure);
        true
    }

    /// Remove whatever stands on the tile; a no-op on an empty tile
    pub fn despawn(&mut self, tile: TilePos) -> Option<Structure> {
        self.tiles.remove(&tile)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_refuses_occupied_tile() {
        let mut map = StructureMap::new();
        let tile = TilePos::new(3, 3);
        assert!(map.place(tile, Structure::Field(FieldId(1))));
        assert!(!map.place(tile, Structure::Settlement(SettlementId(1))));
        assert!(!map.blocks_movement(tile));
    }

    #[test]
    fn test_despawn_empty_tile_is_noop() {
        let mut map = StructureMap::new();
        assert_eq!(map.despawn(TilePos::new(1, 1)), None);
        assert!(map.place(TilePos::new(1, 1), Structure::Settlement(SettlementId(4))));
        assert!(map.blocks_movement(TilePos::new(1, 1)));
        assert!(map.despawn(TilePos::new(1, 1)).is_some());
        assert_eq!(map.despawn(TilePos::new(1, 1)), None);
    }
}

//! A* pathfinding over the tile grid
//!
//! Eight-connected, 10 per orthogonal and 14 per diagonal move. A step may
//! not enter a blocked tile (water, rock, settlement) and a diagonal step may
//! not squeeze between two blocked tiles.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::{AHashMap, AHashSet};

use crate::core::grid::{Compass, TilePos, DIAGONAL_COST, ORTHOGONAL_COST};
use crate::settlement::StructureMap;
use crate::terrain::TerrainOracle;

/// Node in the A* open set
#[derive(Debug, Clone)]
struct PathNode {
    tile: TilePos,
    f_cost: u32,
    /// Discovery order; earlier nodes win ties
    seq: u64,
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.f_cost == other.f_cost && self.seq == other.seq
    }
}

impl Eq for PathNode {}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Grid movement rules over the terrain plus the structures standing on it
#[derive(Clone, Copy)]
pub struct Pathfinder<'a> {
    terrain: &'a dyn TerrainOracle,
    structures: &'a StructureMap,
}

impl<'a> Pathfinder<'a> {
    pub fn new(terrain: &'a dyn TerrainOracle, structures: &'a StructureMap) -> Self {
        Self {
            terrain,
            structures,
        }
    }

    pub fn terrain(&self) -> &'a dyn TerrainOracle {
        self.terrain
    }

    pub fn structures(&self) -> &'a StructureMap {
        self.structures
    }

    /// Water, rock or a settlement on the tile (out of bounds counts too)
    pub fn is_blocked(&self, tile: TilePos) -> bool {
        !self.terrain.in_bounds(tile)
            || self.terrain.is_tile_underwater(tile)
            || self
                .terrain
                .feature_on_tile(tile)
                .is_some_and(|f| f.blocks_movement())
            || self.structures.blocks_movement(tile)
    }

    /// Whether one king move from `from` to `to` is legal
    pub fn can_step(&self, from: TilePos, to: TilePos) -> bool {
        let Some(dir) = Compass::from_offset(to.x - from.x, to.z - from.z) else {
            return false;
        };
        if self.is_blocked(to) || !self.terrain.can_cross_tile(from, to) {
            return false;
        }
        if dir.is_diagonal() {
            let side_a = TilePos::new(to.x, from.z);
            let side_b = TilePos::new(from.x, to.z);
            if self.is_blocked(side_a) && self.is_blocked(side_b) {
                return false;
            }
        }
        true
    }

    /// Find path using A* algorithm
    ///
    /// The path starts at `start` and ends at `goal`. Returns None if no
    /// path exists; callers stay put and try again next tick.
    pub fn find_path(&self, start: TilePos, goal: TilePos) -> Option<Vec<TilePos>> {
        if start == goal {
            return Some(vec![start]);
        }
        if self.is_blocked(goal) {
            return None;
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: AHashMap<TilePos, TilePos> = AHashMap::new();
        let mut g_scores: AHashMap<TilePos, u32> = AHashMap::new();
        let mut closed: AHashSet<TilePos> = AHashSet::new();
        let mut seq = 0u64;

        g_scores.insert(start, 0);
        open_set.push(PathNode {
            tile: start,
            f_cost: start.octile(&goal),
            seq,
        });

        while let Some(current) = open_set.pop() {
            if current.tile == goal {
                return Some(reconstruct_path(&came_from, current.tile));
            }
            if !closed.insert(current.tile) {
                continue;
            }

            let current_g = g_scores.get(&current.tile).copied().unwrap_or(u32::MAX);

            for dir in Compass::ALL {
                let neighbor = current.tile.step(dir);
                if closed.contains(&neighbor) || !self.can_step(current.tile, neighbor) {
                    continue;
                }

                let move_cost = if dir.is_diagonal() {
                    DIAGONAL_COST
                } else {
                    ORTHOGONAL_COST
                };
                let tentative_g = current_g.saturating_add(move_cost);
                let neighbor_g = g_scores.get(&neighbor).copied().unwrap_or(u32::MAX);

                if tentative_g < neighbor_g {
                    came_from.insert(neighbor, current.tile);
                    g_scores.insert(neighbor, tentative_g);

                    seq += 1;
                    open_set.push(PathNode {
                        tile: neighbor,
                        f_cost: tentative_g + neighbor.octile(&goal),
                        seq,
                    });
                }
            }
        }

        None // No path found
    }

    /// Greedy single step towards a (possibly moving) target
    ///
    /// Picks the legal neighbour closest to the target. Returns None when no
    /// neighbour improves on standing still.
    pub fn step_toward(&self, start: TilePos, target: TilePos) -> Option<TilePos> {
        let current = start.octile(&target);
        let mut best: Option<(TilePos, u32)> = None;

        for neighbor in start.neighbors() {
            if !self.can_step(start, neighbor) {
                continue;
            }
            let dist = neighbor.octile(&target);
            if best.map_or(true, |(_, best_dist)| dist < best_dist) {
                best = Some((neighbor, dist));
            }
        }

        best.filter(|&(_, dist)| dist < current).map(|(tile, _)| tile)
    }

    /// Nearest tile next to `tile` that a unit can stand on
    pub fn free_neighbor(&self, tile: TilePos, from: TilePos) -> Option<TilePos> {
        tile.neighbors()
            .into_iter()
            .filter(|&n| !self.is_blocked(n))
            .min_by_key(|n| (n.octile(&from), *n))
    }
}

/// Reconstruct path from came_from map
fn reconstruct_path(came_from: &AHashMap<TilePos, TilePos>, mut current: TilePos) -> Vec<TilePos> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Path cost under the 10/14 metric
pub fn path_cost(path: &[TilePos]) -> u32 {
    path.windows(2)
        .map(|pair| {
            if pair[0].x != pair[1].x && pair[0].z != pair[1].z {
                DIAGONAL_COST
            } else {
                ORTHOGONAL_COST
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{GridTerrain, TerrainFeature};

    #[test]
    fn test_pathfind_straight_line() {
        let terrain = GridTerrain::flat(10, 1);
        let structures = StructureMap::new();
        let finder = Pathfinder::new(&terrain, &structures);

        let path = finder.find_path(TilePos::new(0, 0), TilePos::new(5, 0)).unwrap();
        assert_eq!(path.first(), Some(&TilePos::new(0, 0)));
        assert_eq!(path.last(), Some(&TilePos::new(5, 0)));
        assert_eq!(path_cost(&path), 50);
    }

    #[test]
    fn test_pathfind_diagonal_cost() {
        let terrain = GridTerrain::flat(10, 1);
        let structures = StructureMap::new();
        let finder = Pathfinder::new(&terrain, &structures);

        let path = finder.find_path(TilePos::new(0, 0), TilePos::new(3, 4)).unwrap();
        assert_eq!(path_cost(&path), 3 * 14 + 10);
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn test_pathfind_around_obstacle() {
        let mut terrain = GridTerrain::flat(10, 1);
        for z in 0..4 {
            terrain.set_feature(TilePos::new(3, z), TerrainFeature::Rock);
        }
        let structures = StructureMap::new();
        let finder = Pathfinder::new(&terrain, &structures);

        let path = finder.find_path(TilePos::new(0, 0), TilePos::new(6, 0)).unwrap();
        assert!(path.iter().all(|t| t.x != 3 || t.z >= 4));
    }

    #[test]
    fn test_no_corner_cutting() {
        let mut terrain = GridTerrain::flat(6, 1);
        terrain.set_feature(TilePos::new(1, 0), TerrainFeature::Rock);
        terrain.set_feature(TilePos::new(0, 1), TerrainFeature::Rock);
        let structures = StructureMap::new();
        let finder = Pathfinder::new(&terrain, &structures);

        assert!(!finder.can_step(TilePos::new(0, 0), TilePos::new(1, 1)));
        // Boxed into the corner
        assert!(finder.find_path(TilePos::new(0, 0), TilePos::new(4, 4)).is_none());
    }

    #[test]
    fn test_single_blocked_side_allows_diagonal() {
        let mut terrain = GridTerrain::flat(6, 1);
        terrain.set_feature(TilePos::new(1, 0), TerrainFeature::Rock);
        let structures = StructureMap::new();
        let finder = Pathfinder::new(&terrain, &structures);

        assert!(finder.can_step(TilePos::new(0, 0), TilePos::new(1, 1)));
    }

    #[test]
    fn test_pathfind_no_path_to_water() {
        let mut terrain = GridTerrain::flat(8, 1);
        terrain.set_tile_height(TilePos::new(5, 5), 0);
        let structures = StructureMap::new();
        let finder = Pathfinder::new(&terrain, &structures);

        assert!(finder.find_path(TilePos::new(0, 0), TilePos::new(5, 5)).is_none());
        assert!(finder.find_path(TilePos::new(0, 0), TilePos::new(20, 5)).is_none());
    }

    #[test]
    fn test_pathfind_same_start_goal() {
        let terrain = GridTerrain::flat(4, 1);
        let structures = StructureMap::new();
        let finder = Pathfinder::new(&terrain, &structures);

        let path = finder.find_path(TilePos::new(2, 2), TilePos::new(2, 2)).unwrap();
        assert_eq!(path, vec![TilePos::new(2, 2)]);
    }

    #[test]
    fn test_step_toward_target() {
        let terrain = GridTerrain::flat(10, 1);
        let structures = StructureMap::new();
        let finder = Pathfinder::new(&terrain, &structures);

        assert_eq!(
            finder.step_toward(TilePos::new(2, 2), TilePos::new(6, 6)),
            Some(TilePos::new(3, 3))
        );
        assert_eq!(
            finder.step_toward(TilePos::new(2, 2), TilePos::new(2, 7)),
            Some(TilePos::new(2, 3))
        );
        assert_eq!(finder.step_toward(TilePos::new(2, 2), TilePos::new(2, 2)), None);
    }

    #[test]
    fn test_step_toward_blocked_returns_none() {
        let mut terrain = GridTerrain::flat(10, 1);
        for n in TilePos::new(2, 2).neighbors() {
            terrain.set_feature(n, TerrainFeature::Rock);
        }
        let structures = StructureMap::new();
        let finder = Pathfinder::new(&terrain, &structures);

        assert_eq!(finder.step_toward(TilePos::new(2, 2), TilePos::new(8, 8)), None);
    }
}

//! Looking around for a place to settle

use crate::core::grid::{Compass, TilePos};
use crate::movement::pathfinding::Pathfinder;
use crate::settlement::is_free_site;

/// Order in which a settler inspects tiles around `origin`
///
/// The eight neighbours come first, nearest to the heading first. Then a
/// cone widening along the heading out to `depth`, then the same cone along
/// the next diagonal clockwise of the heading.
pub fn search_order(origin: TilePos, heading: Compass, depth: i32) -> Vec<TilePos> {
    let mut order: Vec<TilePos> = [0, -1, 1, -2, 2, -3, 3, 4]
        .into_iter()
        .map(|turn| origin.step(heading.rotate(turn)))
        .collect();

    let diagonal = if heading.is_diagonal() {
        heading.rotate(2)
    } else {
        heading.rotate(1)
    };
    for dir in [heading, diagonal] {
        for tile in cone(origin, dir, depth) {
            if !order.contains(&tile) {
                order.push(tile);
            }
        }
    }
    order
}

fn cone(origin: TilePos, dir: Compass, depth: i32) -> Vec<TilePos> {
    let (dx, dz) = dir.offset();
    let (px, pz) = (-dz, dx);
    let mut tiles = Vec::new();
    for d in 2..=depth {
        let center = origin.offset(dx * d, dz * d);
        tiles.push(center);
        for l in 1..d {
            tiles.push(center.offset(-px * l, -pz * l));
            tiles.push(center.offset(px * l, pz * l));
        }
    }
    tiles
}

/// First free flat tile in search order
pub fn find_settle_site(
    origin: TilePos,
    heading: Compass,
    depth: i32,
    pathfinder: &Pathfinder,
) -> Option<TilePos> {
    let terrain = pathfinder.terrain();
    let structures = pathfinder.structures();
    search_order(origin, heading, depth)
        .into_iter()
        .find(|&tile| is_free_site(terrain, structures, tile))
}

/// Tile next to `site` a settler walks to before building
pub fn approach_tile(site: TilePos, from: TilePos, pathfinder: &Pathfinder) -> Option<TilePos> {
    if from.chebyshev(&site) <= 1 {
        return Some(from);
    }
    pathfinder.free_neighbor(site, from)
}

//! Undirected exploration biased towards tiles the faction rarely visits

use rand::Rng;

use crate::core::grid::{Compass, TilePos};
use crate::movement::pathfinding::Pathfinder;
use crate::population::StepGrid;

/// Candidate rotations from the current heading, most preferred first
///
/// Straight ahead is only reconsidered together with the wide turns, so a
/// unit that used up its run in one direction actually changes course.
const PRIORITY_LEVELS: [&[i32]; 4] = [&[-1, 1], &[-2, 2], &[-3, 3, 0], &[4]];

/// Pick the next roam heading from `tile`
///
/// Keeps the current heading while it is walkable and the run is shorter
/// than `max_steps`. Otherwise walks the priority levels and takes the first
/// level with any walkable candidate, preferring the least visited
/// destination and breaking ties at random. `None` means the unit is boxed in.
pub fn choose_direction(
    tile: TilePos,
    current: Compass,
    steps_taken: u32,
    max_steps: u32,
    pathfinder: &Pathfinder,
    visits: &StepGrid,
    rng: &mut impl Rng,
) -> Option<Compass> {
    if steps_taken < max_steps && pathfinder.can_step(tile, tile.step(current)) {
        return Some(current);
    }

    for level in PRIORITY_LEVELS {
        let candidates: Vec<(Compass, u32)> = level
            .iter()
            .map(|&turn| current.rotate(turn))
            .filter(|&dir| pathfinder.can_step(tile, tile.step(dir)))
            .map(|dir| (dir, visits.visits(tile.step(dir))))
            .collect();

        let Some(fewest) = candidates.iter().map(|&(_, v)| v).min() else {
            continue;
        };
        let best: Vec<Compass> = candidates
            .into_iter()
            .filter(|&(_, v)| v == fewest)
            .map(|(dir, _)| dir)
            .collect();
        return Some(best[rng.gen_range(0..best.len())]);
    }

    None
}

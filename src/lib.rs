//! Terra Tribes - simulation core for a two-faction territory game
//!
//! Walker units roam a tile grid, found settlements, claim fields, fight
//! and merge. Everything advances in fixed ticks through
//! [`simulation::Simulation`]; observers learn what happened from the
//! event log.

pub mod combat;
pub mod core;
pub mod movement;
pub mod population;
pub mod settlement;
pub mod simulation;
pub mod spatial;
pub mod terrain;
pub mod units;

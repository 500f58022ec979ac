//! Faction-wide population bookkeeping

pub mod directory;
pub mod step_grid;

pub use directory::{LeaderSlot, PopulationDirectory};
pub use step_grid::StepGrid;

pub mod config;
pub mod error;
pub mod grid;
pub mod types;

pub use config::{SimulationConfig, TierProfile};
pub use error::{Result, SimError};
pub use grid::{Compass, TilePos, TileRange, DIAGONAL_COST, ORTHOGONAL_COST};
pub use types::{
    Behavior, EntityRef, Faction, FieldId, FightId, SettlementId, Tick, UnitClass, UnitId, Vec2,
    WorldPos,
};

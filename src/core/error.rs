use thiserror::Error;

use crate::core::grid::TilePos;
use crate::core::types::{SettlementId, UnitId};

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Unit not found: {0:?}")]
    UnknownUnit(UnitId),

    #[error("Settlement not found: {0:?}")]
    UnknownSettlement(SettlementId),

    #[error("Tile out of bounds: {0:?}")]
    OutOfBounds(TilePos),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;

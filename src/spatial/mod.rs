//! Spatial indexing and proximity sensing

pub mod proximity;
pub mod snapshot;
pub mod sparse_hash;

pub use proximity::{ProximityIndex, ProximityReport};
pub use snapshot::{SettlementSummary, TickSnapshot, UnitSummary};
pub use sparse_hash::SparseHashGrid;

//! Settlements, fields and the economy that grows them

pub mod economy;
pub mod settlement;
pub mod structures;

pub use economy::{is_free_site, SettlementEconomy};
pub use settlement::{tier_for_fields, Field, Settlement};
pub use structures::{Structure, StructureMap};

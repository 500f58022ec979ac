//! Units: the mobile tokens both factions field

pub mod unit;

pub use unit::{Unit, UnitRoster};

//! Paired combat between enemy units

pub mod fight;
pub mod resolver;

pub use fight::{Fight, FightOutcome};
pub use resolver::CombatResolver;

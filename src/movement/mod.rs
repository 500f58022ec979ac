//! Unit movement: pathfinding, roaming and the per-unit state machine

pub mod agent;
pub mod locomotion;
pub mod pathfinding;
pub mod roam;
pub mod tile_search;

pub use agent::{AgentAction, AgentContext, MoveState, UnitAgent};
pub use locomotion::{plan_leg, SubMove};
pub use pathfinding::{path_cost, Pathfinder};

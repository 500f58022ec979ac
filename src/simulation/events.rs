//! One-way notifications for the presentation/replication layer
//!
//! Everything observable leaves the core as a `SimEvent`; nothing outside is
//! expected to poll simulation state.

use serde::Serialize;

use crate::core::grid::TilePos;
use crate::core::types::{
    Behavior, Faction, FieldId, FightId, SettlementId, Tick, UnitClass, UnitId, WorldPos,
};
use crate::population::LeaderSlot;

/// Why a unit left the roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemovalCause {
    Defeated,
    Decayed,
    Drowned,
    EnteredSettlement,
    Absorbed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SimEvent {
    UnitSpawned {
        unit: UnitId,
        faction: Faction,
        class: UnitClass,
        strength: u32,
        tile: TilePos,
    },
    UnitMoved {
        unit: UnitId,
        position: WorldPos,
        facing: f32,
    },
    UnitStrengthChanged {
        unit: UnitId,
        strength: u32,
    },
    UnitClassChanged {
        unit: UnitId,
        class: UnitClass,
    },
    UnitRemoved {
        unit: UnitId,
        faction: Faction,
        cause: RemovalCause,
    },
    BehaviorChanged {
        faction: Faction,
        behavior: Behavior,
    },
    MagnetMoved {
        faction: Faction,
        tile: TilePos,
    },
    LeaderChanged {
        faction: Faction,
        leader: LeaderSlot,
    },
    LeaderLost {
        faction: Faction,
    },
    PopulationChanged {
        faction: Faction,
        population: u32,
    },
    SettlementFounded {
        settlement: SettlementId,
        faction: Faction,
        tile: TilePos,
    },
    SettlementTierChanged {
        settlement: SettlementId,
        tier: Option<usize>,
        capacity: u32,
    },
    SettlementFollowersChanged {
        settlement: SettlementId,
        followers: u32,
    },
    SettlementAttacked {
        settlement: SettlementId,
        attacker: UnitId,
    },
    SettlementCaptured {
        settlement: SettlementId,
        faction: Faction,
    },
    SettlementBurned {
        settlement: SettlementId,
    },
    SettlementDestroyed {
        settlement: SettlementId,
    },
    FieldCreated {
        field: FieldId,
        faction: Faction,
        tile: TilePos,
    },
    FieldDestroyed {
        field: FieldId,
        tile: TilePos,
    },
    TreeCleared {
        tile: TilePos,
    },
    FightStarted {
        fight: FightId,
        attacker: UnitId,
        defender: UnitId,
        settlement: Option<SettlementId>,
    },
    FightStrengthUpdated {
        fight: FightId,
        attacker_strength: u32,
        defender_strength: u32,
    },
    FightEnded {
        fight: FightId,
        winner: Option<UnitId>,
    },
}

/// An event stamped with the tick it happened on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedEvent {
    pub tick: Tick,
    #[serde(flatten)]
    pub event: SimEvent,
}

/// Events collected since the caller last drained them
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    tick: Tick,
    events: Vec<TimedEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tick(&mut self, tick: Tick) {
        self.tick = tick;
    }

    pub fn push(&mut self, event: SimEvent) {
        self.events.push(TimedEvent {
            tick: self.tick,
            event,
        });
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<TimedEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

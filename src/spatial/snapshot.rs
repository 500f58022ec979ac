//! Read-only view of every sensed entity, frozen at the start of a tick
//!
//! All per-unit decisions inside one tick read this snapshot, never the live
//! rosters, so the order in which units are processed cannot leak into what
//! they perceive.

use std::collections::BTreeMap;

use crate::core::grid::TilePos;
use crate::core::types::{Behavior, EntityRef, Faction, SettlementId, UnitClass, UnitId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSummary {
    pub id: UnitId,
    pub faction: Faction,
    pub class: UnitClass,
    pub strength: u32,
    pub tile: TilePos,
    pub in_fight: bool,
    /// Behavior after class overrides (Knights always fight)
    pub behavior: Behavior,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlementSummary {
    pub id: SettlementId,
    /// `None` for a burned ruin
    pub faction: Option<Faction>,
    pub tile: TilePos,
    pub followers: u32,
    pub capacity: u32,
    pub has_leader: bool,
    pub attacked: bool,
}

impl SettlementSummary {
    pub fn has_room(&self) -> bool {
        self.followers < self.capacity
    }
}

#[derive(Debug, Clone, Default)]
pub struct TickSnapshot {
    pub units: BTreeMap<UnitId, UnitSummary>,
    pub settlements: BTreeMap<SettlementId, SettlementSummary>,
}

impl TickSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tile_of(&self, entity: EntityRef) -> Option<TilePos> {
        match entity {
            EntityRef::Unit(id) => self.units.get(&id).map(|u| u.tile),
            EntityRef::Settlement(id) => self.settlements.get(&id).map(|s| s.tile),
        }
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        self.tile_of(entity).is_some()
    }

    /// Every entity with its tile, for indexing
    pub fn entities(&self) -> impl Iterator<Item = (EntityRef, TilePos)> + '_ {
        self.units
            .values()
            .map(|u| (EntityRef::Unit(u.id), u.tile))
            .chain(
                self.settlements
                    .values()
                    .map(|s| (EntityRef::Settlement(s.id), s.tile)),
            )
    }
}

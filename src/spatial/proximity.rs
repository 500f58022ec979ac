//! Three-tier proximity sensing per unit
//!
//! - Close: always on; everything in contact range is reported for immediate
//!   resolution (merge, fight, enter, attack).
//! - Mid: GATHER/FIGHT only; a single chase target, replaced only by a
//!   strictly closer qualifying candidate.
//! - Wide: GATHER/FIGHT only; the qualifying crowd in range and the mean
//!   direction towards it, used to bias roaming.
//!
//! One bucketed index serves all three radii. Scans read the tick snapshot
//! and may run on the rayon pool; their results are applied serially.

use ahash::AHashMap;
use rayon::prelude::*;

use crate::core::config::ProximityConfig;
use crate::core::types::{Behavior, EntityRef, Faction, UnitId, Vec2};
use crate::spatial::snapshot::{TickSnapshot, UnitSummary};
use crate::spatial::sparse_hash::SparseHashGrid;

/// Sensor state of one unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitSensors {
    /// Behavior the chase tiers are armed for, `None` when disarmed
    pub armed_for: Option<Behavior>,
    pub mid_target: Option<EntityRef>,
    pub wide_members: Vec<EntityRef>,
    pub wide_hint: Option<Vec2>,
}

/// Result of scanning one unit's surroundings
#[derive(Debug, Clone, Default)]
pub struct SensorScan {
    pub close: Vec<EntityRef>,
    /// Nearest qualifying mid-range candidate with its squared distance
    pub mid_best: Option<(EntityRef, i64)>,
    pub wide_members: Vec<EntityRef>,
    pub wide_hint: Option<Vec2>,
}

/// What a unit learned this tick
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityReport {
    pub unit: UnitId,
    pub close: Vec<EntityRef>,
    /// The chase target left range or vanished
    pub dropped_target: bool,
}

#[derive(Debug, Clone)]
pub struct ProximityIndex {
    config: ProximityConfig,
    grid: SparseHashGrid,
    sensors: AHashMap<UnitId, UnitSensors>,
}

impl ProximityIndex {
    pub fn new(config: ProximityConfig) -> Self {
        let grid = SparseHashGrid::new(config.bucket_size);
        Self {
            config,
            grid,
            sensors: AHashMap::new(),
        }
    }

    pub fn sensors(&self, unit: UnitId) -> Option<&UnitSensors> {
        self.sensors.get(&unit)
    }

    pub fn mid_target(&self, unit: UnitId) -> Option<EntityRef> {
        self.sensors.get(&unit).and_then(|s| s.mid_target)
    }

    pub fn wide_direction(&self, unit: UnitId) -> Option<Vec2> {
        self.sensors.get(&unit).and_then(|s| s.wide_hint)
    }

    /// Clear a unit's tiers and re-arm them for a new behavior
    pub fn arm(&mut self, unit: UnitId, behavior: Behavior) {
        let sensors = self.sensors.entry(unit).or_default();
        *sensors = UnitSensors {
            armed_for: behavior.uses_chase_sensors().then_some(behavior),
            ..UnitSensors::default()
        };
    }

    /// Drop a unit's own sensors and every reference other units hold to it
    pub fn forget_unit(&mut self, unit: UnitId) {
        self.sensors.remove(&unit);
        self.remove_entity(EntityRef::Unit(unit));
    }

    /// Prune a despawned entity from every sensor set
    pub fn remove_entity(&mut self, entity: EntityRef) {
        for sensors in self.sensors.values_mut() {
            if sensors.mid_target == Some(entity) {
                sensors.mid_target = None;
            }
            sensors.wide_members.retain(|&e| e != entity);
        }
    }

    /// Re-index the snapshot for this tick's queries
    pub fn rebuild(&mut self, snapshot: &TickSnapshot) {
        self.grid.rebuild(snapshot.entities());
    }

    /// Scan every unit in the snapshot
    pub fn scan_all(
        &self,
        snapshot: &TickSnapshot,
        parallel_threshold: usize,
    ) -> Vec<(UnitId, SensorScan)> {
        if snapshot.units.len() >= parallel_threshold {
            snapshot
                .units
                .par_iter()
                .map(|(&id, unit)| (id, self.scan(unit, snapshot)))
                .collect()
        } else {
            snapshot
                .units
                .iter()
                .map(|(&id, unit)| (id, self.scan(unit, snapshot)))
                .collect()
        }
    }

    /// Scan one unit's surroundings without mutating anything
    pub fn scan(&self, unit: &UnitSummary, snapshot: &TickSnapshot) -> SensorScan {
        let me = EntityRef::Unit(unit.id);
        let mut scan = SensorScan::default();

        scan.close = self
            .grid
            .query_square(unit.tile, self.config.close_radius)
            .map(|(entity, _)| entity)
            .filter(|&entity| entity != me)
            .collect();
        scan.close.sort();

        let armed = self
            .sensors
            .get(&unit.id)
            .and_then(|s| s.armed_for)
            .filter(|b| b.uses_chase_sensors());
        let Some(behavior) = armed else {
            return scan;
        };

        let mut sum = Vec2::default();
        for (entity, tile) in self.grid.query_square(unit.tile, self.config.wide_radius) {
            if entity == me || !qualifies(behavior, unit.faction, entity, snapshot) {
                continue;
            }
            scan.wide_members.push(entity);
            sum = sum + unit.tile.vector_to(&tile);

            if tile.chebyshev(&unit.tile) <= self.config.mid_radius {
                let dist = tile.distance_sq(&unit.tile);
                let closer = match scan.mid_best {
                    Some((best, best_dist)) => dist < best_dist || (dist == best_dist && entity < best),
                    None => true,
                };
                if closer {
                    scan.mid_best = Some((entity, dist));
                }
            }
        }
        scan.wide_members.sort();
        if !scan.wide_members.is_empty() {
            let mean = sum * (1.0 / scan.wide_members.len() as f32);
            scan.wide_hint = (!mean.is_zero()).then(|| mean.normalize());
        }

        scan
    }

    /// Fold scan results into the persistent sensor state
    pub fn apply_scans(
        &mut self,
        scans: Vec<(UnitId, SensorScan)>,
        snapshot: &TickSnapshot,
    ) -> Vec<ProximityReport> {
        scans
            .into_iter()
            .map(|(unit, scan)| {
                let dropped_target = self.apply_scan(unit, &scan, snapshot);
                ProximityReport {
                    unit,
                    close: scan.close,
                    dropped_target,
                }
            })
            .collect()
    }

    fn apply_scan(&mut self, unit: UnitId, scan: &SensorScan, snapshot: &TickSnapshot) -> bool {
        let Some(me) = snapshot.units.get(&unit) else {
            return false;
        };
        let mid_radius = self.config.mid_radius;
        let sensors = self.sensors.entry(unit).or_default();
        let Some(behavior) = sensors.armed_for else {
            sensors.mid_target = None;
            sensors.wide_members.clear();
            sensors.wide_hint = None;
            return false;
        };

        sensors.wide_members = scan.wide_members.clone();
        sensors.wide_hint = scan.wide_hint;

        // Current target must still exist, qualify and be in range
        let mut dropped = false;
        let mut current_dist = None;
        if let Some(target) = sensors.mid_target {
            match snapshot.tile_of(target) {
                Some(tile)
                    if tile.chebyshev(&me.tile) <= mid_radius
                        && qualifies(behavior, me.faction, target, snapshot) =>
                {
                    current_dist = Some(tile.distance_sq(&me.tile));
                }
                _ => {
                    sensors.mid_target = None;
                    dropped = true;
                }
            }
        }

        if !dropped {
            if let Some((candidate, dist)) = scan.mid_best {
                let replace = match current_dist {
                    Some(current) => dist < current,
                    None => true,
                };
                if replace {
                    sensors.mid_target = Some(candidate);
                }
            }
        }

        dropped
    }
}

/// Whether an entity is worth chasing under a behavior
pub fn qualifies(
    behavior: Behavior,
    faction: Faction,
    entity: EntityRef,
    snapshot: &TickSnapshot,
) -> bool {
    match (behavior, entity) {
        (Behavior::Fight, EntityRef::Unit(id)) => snapshot
            .units
            .get(&id)
            .is_some_and(|u| u.faction != faction && !u.in_fight),
        (Behavior::Fight, EntityRef::Settlement(id)) => snapshot
            .settlements
            .get(&id)
            .is_some_and(|s| s.faction == Some(faction.opponent()) && !s.attacked),
        (Behavior::Gather, EntityRef::Unit(id)) => snapshot
            .units
            .get(&id)
            .is_some_and(|u| u.faction == faction && !u.in_fight),
        _ => false,
    }
}

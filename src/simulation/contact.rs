//! Close-contact resolution
//!
//! Proximity reports are based on the snapshot taken at the start of the
//! tick. Earlier contacts in the same tick may already have merged, removed
//! or paused an entity, so every contact is re-checked against live state
//! before anything happens.

use crate::combat::FightOutcome;
use crate::core::types::{Behavior, EntityRef, SettlementId, UnitClass, UnitId};
use crate::simulation::events::{RemovalCause, SimEvent};
use crate::simulation::Simulation;
use crate::spatial::proximity::ProximityReport;
use crate::terrain::TerrainOracle;

/// Resolve every close contact in report order
pub fn resolve_contacts<T: TerrainOracle>(sim: &mut Simulation<T>, reports: &[ProximityReport]) {
    for report in reports {
        for &entity in &report.close {
            match sim.directory.unit(report.unit) {
                Some(unit) if !unit.is_dead() && !unit.in_fight() => {}
                // Gone or busy: the rest of this unit's contacts are moot
                _ => break,
            }
            match entity {
                EntityRef::Unit(other) => unit_contact(sim, report.unit, other),
                EntityRef::Settlement(settlement) => settlement_contact(sim, report.unit, settlement),
            }
        }
    }
}

fn unit_contact<T: TerrainOracle>(sim: &mut Simulation<T>, me: UnitId, other: UnitId) {
    let Some(them) = sim.directory.unit(other) else {
        return;
    };
    if them.is_dead() || them.in_fight() {
        return;
    }
    let same_side = sim
        .directory
        .unit(me)
        .is_some_and(|unit| unit.faction == them.faction);

    if same_side {
        merge(sim, me, other);
    } else {
        sim.combat
            .start_fight(me, other, None, &mut sim.directory, &mut sim.events);
    }
}

/// Fold two friendly units into one
///
/// A knight always absorbs a non-knight. Otherwise the stronger unit
/// absorbs the weaker, and `scanner` wins ties.
fn merge<T: TerrainOracle>(sim: &mut Simulation<T>, scanner: UnitId, other: UnitId) {
    let (Some(a), Some(b)) = (sim.directory.unit(scanner), sim.directory.unit(other)) else {
        return;
    };
    let scanner_absorbs = match (a.class == UnitClass::Knight, b.class == UnitClass::Knight) {
        (true, false) => true,
        (false, true) => false,
        _ => a.strength() >= b.strength(),
    };
    let (absorber, absorbed) = if scanner_absorbs {
        (a, b)
    } else {
        (b, a)
    };
    let faction = absorber.faction;
    let absorber_id = absorber.id;
    let absorbed_id = absorbed.id;
    let gained = absorbed.strength();
    let absorber_is_knight = absorber.class == UnitClass::Knight;

    // A knight cannot carry the leadership; removal below drops it instead
    if sim.directory.is_leader_unit(absorbed_id) && !absorber_is_knight {
        sim.directory
            .set_leader_unit(faction, absorber_id, &mut sim.events);
    }

    let max_strength = sim.directory.max_strength();
    let Some(unit) = sim.directory.unit_mut(absorber_id) else {
        return;
    };
    let strength = unit.add_strength(gained, max_strength);
    sim.events.push(SimEvent::UnitStrengthChanged {
        unit: absorber_id,
        strength,
    });
    sim.directory
        .remove_unit(absorbed_id, RemovalCause::Absorbed, &mut sim.events);

    tracing::trace!("{:?} absorbed {:?}, strength now {}", absorber_id, absorbed_id, strength);
}

fn settlement_contact<T: TerrainOracle>(sim: &mut Simulation<T>, unit: UnitId, settlement: SettlementId) {
    let (Some(entrant), Some(target)) = (sim.directory.unit(unit), sim.economy.settlement(settlement)) else {
        return;
    };
    let Some(owner) = target.faction else {
        return;
    };

    if owner == entrant.faction {
        let config = sim.economy.config();
        let behavior = sim.directory.behavior(owner);
        let wanted = match behavior {
            Behavior::Gather => true,
            Behavior::GoToMagnet => target.has_leader,
            _ => false,
        };
        if wanted && entrant.may_enter(settlement) && !target.attacked && target.room(config) > 0 {
            sim.economy
                .enter(settlement, unit, &mut sim.directory, &mut sim.events);
        }
        return;
    }

    if target.attacked {
        return;
    }
    match sim
        .economy
        .begin_defense(settlement, unit, &mut sim.directory, &mut sim.events)
    {
        Some(defender) => {
            let fight = sim.combat.start_fight(
                unit,
                defender,
                Some(settlement),
                &mut sim.directory,
                &mut sim.events,
            );
            if fight.is_none() {
                sim.economy
                    .end_defense(settlement, &sim.terrain, &mut sim.directory, &mut sim.events);
            }
        }
        // Nobody home: taken without a fight
        None => conquer(sim, settlement, unit),
    }
}

/// The settlement falls to `winner`
///
/// Knights burn what they take; anyone else captures it and moves in.
fn conquer<T: TerrainOracle>(sim: &mut Simulation<T>, settlement: SettlementId, winner: UnitId) {
    let Some(unit) = sim.directory.unit(winner) else {
        sim.economy
            .end_defense(settlement, &sim.terrain, &mut sim.directory, &mut sim.events);
        return;
    };
    let faction = unit.faction;

    if unit.class == UnitClass::Knight {
        sim.economy
            .burn(settlement, &sim.terrain, &mut sim.directory, &mut sim.events);
    } else {
        sim.economy.capture(
            settlement,
            faction,
            &sim.terrain,
            &mut sim.directory,
            &mut sim.events,
        );
        sim.economy
            .enter(settlement, winner, &mut sim.directory, &mut sim.events);
    }
}

/// Apply a finished fight to the settlement it was about, if any
pub fn apply_outcome<T: TerrainOracle>(sim: &mut Simulation<T>, outcome: FightOutcome) {
    match outcome {
        FightOutcome::Won {
            winner,
            settlement: Some(settlement),
            ..
        } => {
            let (Some(unit), Some(target)) = (sim.directory.unit(winner), sim.economy.settlement(settlement)) else {
                return;
            };
            if target.faction == Some(unit.faction) {
                // Defender held: back inside
                sim.economy
                    .enter(settlement, winner, &mut sim.directory, &mut sim.events);
                sim.economy
                    .end_defense(settlement, &sim.terrain, &mut sim.directory, &mut sim.events);
            } else {
                conquer(sim, settlement, winner);
            }
        }
        FightOutcome::Discarded {
            settlement: Some(settlement),
            ..
        } => {
            sim.economy
                .end_defense(settlement, &sim.terrain, &mut sim.directory, &mut sim.events);
        }
        _ => {}
    }
}

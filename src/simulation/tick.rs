//! Tick system - one fixed timestep of the whole simulation
//!
//! Phases, in order:
//! behavior pull -> proximity scan -> contact -> movement -> combat ->
//! settlement growth -> cooldowns -> cleanup
//!
//! Sensing reads a snapshot taken before anyone acts, so the result does not
//! depend on the order units are visited in. Scans run on rayon above the
//! configured unit count; everything that mutates runs serially in id order.

use crate::core::types::UnitId;
use crate::movement::agent::{AgentAction, AgentContext};
use crate::movement::locomotion::SubMove;
use crate::movement::pathfinding::Pathfinder;
use crate::simulation::contact::{apply_outcome, resolve_contacts};
use crate::simulation::events::{RemovalCause, SimEvent};
use crate::simulation::Simulation;
use crate::spatial::snapshot::TickSnapshot;
use crate::terrain::TerrainOracle;

/// Run a single simulation tick
///
/// 1. Advance the clock
/// 2. Units pick up their faction's behavior; changes re-arm their sensors
/// 3. Snapshot, re-index and scan all units
/// 4. Resolve close contacts (merge, fight, enter, attack)
/// 5. Every agent decides and moves against a fresh snapshot
/// 6. Fights advance; finished fights settle their settlement
/// 7. Settlements grow and release
/// 8. Entry cooldowns run down
/// 9. Units at zero strength are removed and sensors pruned
pub fn run_simulation_tick<T: TerrainOracle>(sim: &mut Simulation<T>) {
    sim.current_tick += 1;
    sim.events.set_tick(sim.current_tick);
    let first_event = sim.events.len();

    pull_behaviors(sim);

    let snapshot = sim.snapshot();
    sim.proximity.rebuild(&snapshot);
    let scans = sim
        .proximity
        .scan_all(&snapshot, sim.config.parallel_threshold);
    let reports = sim.proximity.apply_scans(scans, &snapshot);
    resolve_contacts(sim, &reports);
    sim.prune_removed(first_event);
    let after_contact = sim.events.len();

    let snapshot = sim.snapshot();
    move_units(sim, &snapshot);

    let outcomes = sim.combat.tick(&mut sim.directory, &mut sim.events);
    for outcome in outcomes {
        apply_outcome(sim, outcome);
    }

    sim.economy
        .tick(&sim.terrain, &mut sim.directory, &mut sim.events);

    cool_down(sim);
    sweep_exhausted(sim);
    sim.prune_removed(after_contact);

    tracing::trace!(
        "Tick {}: {} units, {} settlements, {} fights, {} events",
        sim.current_tick,
        sim.directory.units().len(),
        sim.economy.settlements().count(),
        sim.combat.len(),
        sim.events.len() - first_event
    );
}

fn pull_behaviors<T: TerrainOracle>(sim: &mut Simulation<T>) {
    for id in sim.directory.units().ids() {
        let faction_behavior = match sim.directory.unit(id) {
            Some(unit) => sim.directory.behavior(unit.faction),
            None => continue,
        };
        let Some(unit) = sim.directory.unit_mut(id) else {
            continue;
        };
        let behavior = unit.effective_behavior(faction_behavior);
        if unit.agent.observe_behavior(behavior) {
            sim.proximity.arm(id, behavior);
        }
    }
}

fn move_units<T: TerrainOracle>(sim: &mut Simulation<T>, snapshot: &TickSnapshot) {
    for id in sim.directory.units().ids() {
        let Some(me) = snapshot.units.get(&id) else {
            continue;
        };
        let Some(unit) = sim.directory.unit_mut(id) else {
            continue;
        };
        let faction = unit.faction;
        let mut agent = std::mem::take(&mut unit.agent);

        let action = {
            let ctx = AgentContext {
                pathfinder: Pathfinder::new(&sim.terrain, sim.economy.structures()),
                snapshot,
                mid_target: sim.proximity.mid_target(id),
                wide_hint: sim.proximity.wide_direction(id),
                magnet: sim.directory.magnet(faction),
                leader: sim.directory.leader(faction),
                steps: sim.directory.step_grid(faction),
                max_steps_in_direction: sim.config.units.max_steps_in_direction,
                settle_search_depth: sim.config.units.settle_search_depth,
            };
            agent.decide(me, &ctx, &mut sim.rng)
        };
        if let Some(unit) = sim.directory.unit_mut(id) {
            unit.agent = agent;
        }

        match action {
            AgentAction::Stay => {}
            AgentAction::Advance(sub) => advance(sim, id, sub),
            AgentAction::Found(site) => {
                let founded = sim.economy.found(
                    faction,
                    site,
                    &sim.terrain,
                    &mut sim.directory,
                    &mut sim.events,
                );
                if let Some(settlement) = founded {
                    sim.economy
                        .enter(settlement, id, &mut sim.directory, &mut sim.events);
                }
            }
        }
    }
}

/// Apply one sub-move; roaming wears a unit down every `decay_rate` tiles
fn advance<T: TerrainOracle>(sim: &mut Simulation<T>, id: UnitId, sub: SubMove) {
    sim.events.push(SimEvent::UnitMoved {
        unit: id,
        position: sub.position,
        facing: sub.facing,
    });
    if !sub.completes_leg {
        return;
    }

    let decay_rate = sim.config.units.decay_rate;
    let Some(unit) = sim.directory.unit_mut(id) else {
        return;
    };
    unit.tile = sub.tile;
    if !sub.roamed {
        return;
    }
    unit.roam_steps += 1;
    let faction = unit.faction;
    if unit.roam_steps % decay_rate == 0 {
        let strength = unit.lose_strength(1);
        sim.events.push(SimEvent::UnitStrengthChanged { unit: id, strength });
    }
    sim.directory.record_roam_step(faction, sub.tile);
}

fn cool_down<T: TerrainOracle>(sim: &mut Simulation<T>) {
    for id in sim.directory.units().ids() {
        if let Some(unit) = sim.directory.unit_mut(id) {
            unit.entry_cooldown = unit.entry_cooldown.saturating_sub(1);
        }
    }
}

fn sweep_exhausted<T: TerrainOracle>(sim: &mut Simulation<T>) {
    let exhausted: Vec<UnitId> = sim
        .directory
        .units()
        .iter()
        .filter(|u| u.is_dead())
        .map(|u| u.id)
        .collect();
    for id in exhausted {
        sim.directory
            .remove_unit(id, RemovalCause::Decayed, &mut sim.events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimulationConfig;
    use crate::core::grid::TilePos;
    use crate::core::types::{Behavior, Faction};
    use crate::movement::MoveState;
    use crate::terrain::GridTerrain;

    fn sim_with(config: SimulationConfig) -> Simulation<GridTerrain> {
        Simulation::new(config, GridTerrain::flat(32, 2)).unwrap()
    }

    #[test]
    fn test_clock_and_event_stamps() {
        let mut sim = sim_with(SimulationConfig::default());
        sim.set_behavior(Faction::Red, Behavior::GoToMagnet);
        sim.spawn_unit(Faction::Red, TilePos::new(4, 4), 5).unwrap();
        sim.drain_events();
        sim.tick();
        sim.tick();
        assert_eq!(sim.current_tick(), 2);
        assert!(sim.events().iter().all(|e| e.tick == 1 || e.tick == 2));
        assert!(sim.events().iter().any(|e| e.tick == 2));
    }

    #[test]
    fn test_roaming_decays_strength() {
        let mut config = SimulationConfig::default();
        config.units.decay_rate = 1;
        let mut sim = sim_with(config);
        sim.set_behavior(Faction::Red, Behavior::Fight);
        let id = sim
            .spawn_unit(Faction::Red, TilePos::new(16, 16), 2)
            .unwrap()
            .unwrap();

        sim.run(40);
        assert!(sim.directory().unit(id).is_none());
        assert!(sim.events().iter().any(|e| matches!(
            e.event,
            SimEvent::UnitRemoved {
                cause: RemovalCause::Decayed,
                ..
            }
        )));
        assert_eq!(sim.directory().population(Faction::Red), 0);
    }

    #[test]
    fn test_settler_founds_and_moves_in() {
        let mut sim = sim_with(SimulationConfig::default());
        let id = sim
            .spawn_unit(Faction::Blue, TilePos::new(10, 10), 8)
            .unwrap()
            .unwrap();

        sim.run(10);
        assert!(sim.directory().unit(id).is_none());
        let settlement = sim.economy().settlements().next().unwrap();
        assert_eq!(settlement.faction, Some(Faction::Blue));
        assert!(settlement.followers >= 8);
    }

    #[test]
    fn test_fight_pauses_and_resolves() {
        let mut config = SimulationConfig::default();
        config.combat.damage_interval_ticks = 1;
        let mut sim = sim_with(config);
        sim.set_behavior(Faction::Red, Behavior::Fight);
        sim.set_behavior(Faction::Blue, Behavior::Fight);
        let red = sim.spawn_unit(Faction::Red, TilePos::new(10, 10), 3).unwrap().unwrap();
        let blue = sim.spawn_unit(Faction::Blue, TilePos::new(11, 10), 1).unwrap().unwrap();

        sim.tick();
        // Contact opened the fight, and one damage step already finished it
        assert!(sim.directory().unit(blue).is_none());
        let winner = sim.directory().unit(red).unwrap();
        assert_eq!(winner.strength(), 2);
        assert!(!winner.in_fight());
        assert_ne!(winner.agent.state(), MoveState::Stopped);
        assert!(sim.combat().is_empty());
    }

    #[test]
    fn test_behavior_change_rearms_sensors() {
        let mut sim = sim_with(SimulationConfig::default());
        sim.set_behavior(Faction::Red, Behavior::GoToMagnet);
        let id = sim.spawn_unit(Faction::Red, TilePos::new(5, 5), 5).unwrap().unwrap();
        sim.tick();
        assert_eq!(sim.proximity().sensors(id).unwrap().armed_for, None);

        sim.set_behavior(Faction::Red, Behavior::Gather);
        sim.tick();
        assert_eq!(
            sim.proximity().sensors(id).unwrap().armed_for,
            Some(Behavior::Gather)
        );
    }
}

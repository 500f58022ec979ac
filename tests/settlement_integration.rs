//! Settlement economy integration tests

use terra_tribes::core::config::SimulationConfig;
use terra_tribes::core::grid::{TilePos, TileRange};
use terra_tribes::core::types::{Faction, SettlementId};
use terra_tribes::population::PopulationDirectory;
use terra_tribes::settlement::SettlementEconomy;
use terra_tribes::simulation::{EventLog, SimEvent};
use terra_tribes::terrain::{GridTerrain, TerrainFeature};

struct World {
    terrain: GridTerrain,
    economy: SettlementEconomy,
    directory: PopulationDirectory,
    events: EventLog,
}

impl World {
    fn new(terrain: GridTerrain) -> Self {
        let config = SimulationConfig::default();
        Self {
            terrain,
            economy: SettlementEconomy::new(&config),
            directory: PopulationDirectory::new(&config),
            events: EventLog::new(),
        }
    }

    fn found(&mut self, faction: Faction, tile: TilePos) -> SettlementId {
        self.economy
            .found(faction, tile, &self.terrain, &mut self.directory, &mut self.events)
            .unwrap()
    }
}

/// Flat map with every window tile around `center` rocky except `keep`
fn boxed_in(center: TilePos, keep: &[TilePos]) -> GridTerrain {
    let mut terrain = GridTerrain::flat(20, 2);
    for tile in TileRange::around(center, 2).tiles() {
        if tile != center && !keep.contains(&tile) {
            terrain.set_feature(tile, TerrainFeature::Rock);
        }
    }
    terrain
}

#[test]
fn test_no_fields_means_lowest_tier() {
    let center = TilePos::new(10, 10);
    let mut world = World::new(boxed_in(center, &[]));
    let id = world.found(Faction::Red, center);

    let settlement = world.economy.settlement(id).unwrap();
    assert_eq!(world.economy.field_count(id), 0);
    assert_eq!(settlement.tier(), Some(0));
    assert_eq!(world.economy.capacity(id), 5);
}

#[test]
fn test_three_fields_set_the_tier() {
    let center = TilePos::new(10, 10);
    let keep = [TilePos::new(8, 8), TilePos::new(12, 12), TilePos::new(11, 10)];
    let mut world = World::new(boxed_in(center, &keep));
    let id = world.found(Faction::Blue, center);

    assert_eq!(world.economy.field_count(id), 3);
    assert_eq!(world.economy.settlement(id).unwrap().tier(), Some(2));
    assert_eq!(world.economy.capacity(id), 20);
    for tile in keep {
        assert!(world.economy.field_at(tile).is_some());
    }
}

#[test]
fn test_swamp_is_never_farmed() {
    let center = TilePos::new(10, 10);
    let mut terrain = boxed_in(center, &[TilePos::new(9, 9), TilePos::new(11, 11)]);
    terrain.set_feature(TilePos::new(11, 11), TerrainFeature::Swamp);
    let mut world = World::new(terrain);
    let id = world.found(Faction::Red, center);

    assert_eq!(world.economy.field_count(id), 1);
    assert!(world.economy.field_at(TilePos::new(11, 11)).is_none());
}

#[test]
fn test_followers_never_exceed_capacity() {
    let center = TilePos::new(10, 10);
    let mut world = World::new(boxed_in(center, &[]));
    let id = world.found(Faction::Red, center);

    let accepted = world.economy.add_followers(id, 1000, &mut world.events);
    assert_eq!(accepted, 5);
    assert_eq!(world.economy.settlement(id).unwrap().followers, 5);
    assert_eq!(world.economy.add_followers(id, 1, &mut world.events), 0);
}

#[test]
fn test_burned_settlement_stays_ruined() {
    let center = TilePos::new(10, 10);
    let mut world = World::new(GridTerrain::flat(20, 2));
    let id = world.found(Faction::Red, center);
    world.economy.add_followers(id, 12, &mut world.events);

    world
        .economy
        .burn(id, &world.terrain, &mut world.directory, &mut world.events);
    world
        .economy
        .retier(id, &world.terrain, &mut world.directory, &mut world.events);

    let ruin = world.economy.settlement(id).unwrap();
    assert!(ruin.is_ruin());
    assert_eq!(ruin.tier(), None);
    assert_eq!(ruin.followers, 0);
    assert_eq!(world.economy.field_count(id), 0);
    assert_eq!(world.economy.capacity(id), 0);
    // The ruin still occupies its tile
    assert!(world.economy.structures().blocks_movement(center));
}

#[test]
fn test_full_settlement_releases_a_unit() {
    let center = TilePos::new(10, 10);
    let mut world = World::new(GridTerrain::flat(20, 2));
    let id = world.found(Faction::Blue, center);
    let capacity = world.economy.capacity(id);
    world.economy.add_followers(id, capacity, &mut world.events);

    let mut released = None;
    for _ in 0..200 {
        world
            .economy
            .tick(&world.terrain, &mut world.directory, &mut world.events);
        released = world.events.events().iter().find_map(|e| match e.event {
            SimEvent::UnitSpawned { unit, .. } => Some(unit),
            _ => None,
        });
        if released.is_some() {
            break;
        }
    }

    let unit = world.directory.unit(released.unwrap()).unwrap();
    assert_eq!(unit.faction, Faction::Blue);
    assert_eq!(unit.strength(), 25);
    assert_eq!(unit.origin, Some(id));
    assert!(unit.entry_cooldown > 0);
    assert!(!unit.may_enter(id));
    assert!(unit.tile.chebyshev(&center) <= 1);
    assert_eq!(world.economy.settlement(id).unwrap().followers, capacity - 25);
}

#[test]
fn test_neighbours_share_a_contested_window() {
    let mut world = World::new(GridTerrain::flat(24, 2));
    let red = world.found(Faction::Red, TilePos::new(8, 10));
    let blue = world.found(Faction::Blue, TilePos::new(12, 10));

    // Column x = 10 lies in both windows and was claimed by Red first
    assert!(world
        .economy
        .field_at(TilePos::new(10, 10))
        .is_some_and(|f| f.faction == Faction::Red));
    assert!(world.economy.field_count(blue) < world.economy.field_count(red));
}

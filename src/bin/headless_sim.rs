//! Headless Simulation Runner
//!
//! Generates a map, drops both factions on it and plays a scripted match,
//! printing a JSON summary (and optionally the event stream as JSON lines).

use std::path::PathBuf;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use terra_tribes::core::config::SimulationConfig;
use terra_tribes::core::error::Result;
use terra_tribes::core::grid::{TilePos, TileRange};
use terra_tribes::core::types::{Behavior, Faction};
use terra_tribes::simulation::Simulation;
use terra_tribes::terrain::{GridTerrain, TerrainOracle};

/// Headless Simulation Runner - scripted two-faction match
#[derive(Parser, Debug)]
#[command(name = "headless_sim")]
#[command(about = "Run a scripted match without a renderer and report the outcome")]
struct Args {
    /// Number of ticks to simulate
    #[arg(long, default_value_t = 2000)]
    ticks: u64,

    /// Random seed for terrain and simulation
    #[arg(long)]
    seed: Option<u64>,

    /// Map size in tiles per side
    #[arg(long, default_value_t = 64)]
    tiles: i32,

    /// Starting units per faction
    #[arg(long, default_value_t = 6)]
    units: usize,

    /// TOML config overriding the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print every event as a JSON line
    #[arg(long)]
    events: bool,
}

#[derive(Serialize)]
struct FactionSummary {
    faction: Faction,
    units: u32,
    settlements: usize,
    followers: u32,
    knights: usize,
}

#[derive(Serialize)]
struct RunSummary {
    seed: u64,
    ticks: u64,
    fights_in_progress: usize,
    ruins: usize,
    factions: Vec<FactionSummary>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("terra_tribes=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    let mut config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    config.map.seed = seed;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let terrain = GridTerrain::generate(args.tiles, &mut rng);
    let mut sim = Simulation::new(config, terrain)?;

    let far = args.tiles - 1;
    let red_tiles = land_near(sim.terrain(), TilePos::new(2, 2), args.units);
    let blue_tiles = land_near(sim.terrain(), TilePos::new(far - 2, far - 2), args.units);
    sim.spawn_initial_roster(Faction::Red, &red_tiles)?;
    sim.spawn_initial_roster(Faction::Blue, &blue_tiles)?;
    sim.set_magnet(Faction::Blue, TilePos::new(args.tiles / 2, args.tiles / 2))?;

    tracing::info!("Running {} ticks on a {}x{} map (seed {})", args.ticks, args.tiles, args.tiles, seed);

    for tick in 0..args.ticks {
        // Settle first, then gather up, then go to war
        if tick == args.ticks / 3 {
            sim.set_behavior(Faction::Red, Behavior::Gather);
            sim.set_behavior(Faction::Blue, Behavior::GoToMagnet);
        }
        if tick == args.ticks * 2 / 3 {
            sim.make_knight(Faction::Red);
            sim.set_behavior(Faction::Red, Behavior::Fight);
            sim.set_behavior(Faction::Blue, Behavior::Fight);
        }
        sim.tick();

        let events = sim.drain_events();
        if args.events {
            for event in &events {
                println!("{}", serde_json::to_string(event)?);
            }
        }
    }

    let summary = summarize(&sim, seed);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Up to `count` walkable land tiles, nearest to `origin` first
fn land_near(terrain: &GridTerrain, origin: TilePos, count: usize) -> Vec<TilePos> {
    let mut found = Vec::new();
    for radius in 0..terrain.tiles_per_side() {
        let ring = TileRange::around(origin, radius).clamped(terrain.tiles_per_side());
        for tile in ring.tiles() {
            if found.len() == count {
                return found;
            }
            let walkable = !terrain.is_tile_underwater(tile)
                && terrain
                    .feature_on_tile(tile)
                    .map_or(true, |f| !f.blocks_movement());
            if tile.chebyshev(&origin) == radius && walkable {
                found.push(tile);
            }
        }
    }
    found
}

fn summarize(sim: &Simulation<GridTerrain>, seed: u64) -> RunSummary {
    let factions = Faction::ALL
        .into_iter()
        .map(|faction| {
            let owned = sim
                .economy()
                .settlements()
                .filter(|s| s.faction == Some(faction));
            let (settlements, followers) = owned.fold((0, 0), |(n, f), s| (n + 1, f + s.followers));
            FactionSummary {
                faction,
                units: sim.directory().population(faction),
                settlements,
                followers,
                knights: sim.directory().knights(faction).len(),
            }
        })
        .collect();

    RunSummary {
        seed,
        ticks: sim.current_tick(),
        fights_in_progress: sim.combat().len(),
        ruins: sim.economy().settlements().filter(|s| s.is_ruin()).count(),
        factions,
    }
}

//! Simulation configuration with documented constants
//!
//! All magic numbers are collected here with explanations of their purpose
//! and how they interact with each other. Every section can be overridden
//! from a TOML file; missing keys fall back to the defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};

/// Configuration for the simulation systems
///
/// These values have been tuned to produce good emergent behavior.
/// Changing them will affect gameplay pacing and feel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub map: MapConfig,
    pub units: UnitConfig,
    pub proximity: ProximityConfig,
    pub combat: CombatConfig,
    pub economy: EconomyConfig,
    pub population: PopulationConfig,

    /// Minimum unit count before sensor scans run on the rayon pool
    ///
    /// Below this threshold, thread overhead exceeds benefits.
    pub parallel_threshold: usize,
}

/// Map dimensions and determinism
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Tiles along one side of the square map
    pub tiles_per_side: i32,

    /// Seed for the simulation RNG (roam tie-breaks)
    ///
    /// Two runs with the same seed, terrain and commands produce the same
    /// event stream.
    pub seed: u64,
}

/// Unit strength and movement tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    /// Upper bound on unit strength; merges clamp to it
    pub max_strength: u32,

    /// Roam steps per point of strength decay
    ///
    /// At 40, a strength-10 unit that never settles or merges dies after
    /// 400 steps of wandering.
    pub decay_rate: u32,

    /// Tiles walked in one direction before the roam heuristic re-chooses
    ///
    /// Keeps roaming units from running in long straight lines.
    pub max_steps_in_direction: u32,

    /// Ticks a freshly released unit is barred from re-entering its origin
    pub entry_cooldown_ticks: u32,

    /// Depth (in tiles) of the directional cones searched for a free tile
    pub settle_search_depth: i32,

    /// Strength of units created by the initial roster when none is given
    pub initial_strength: u32,
}

/// Sensor radii, all square radii in tiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    /// Contact range: merges, fights, settlement entry
    pub close_radius: i32,

    /// Chase range for GATHER/FIGHT targets
    pub mid_radius: i32,

    /// Range of the roam-direction hint
    pub wide_radius: i32,

    /// Bucket edge of the spatial hash in tiles
    ///
    /// Should be around half the wide radius: smaller buckets mean more
    /// lookups per query, larger buckets mean more candidates to filter.
    pub bucket_size: i32,
}

/// Fight pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Ticks between damage applications
    ///
    /// At the reference rate of 10 ticks per second, 50 ticks is one damage
    /// exchange every 5 seconds.
    pub damage_interval_ticks: u32,
}

/// Capacity, growth and release profile of one settlement tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierProfile {
    /// Maximum followers held
    pub capacity: u32,
    /// Ticks between follower increments
    pub growth_interval: u32,
    /// Strength of the unit released when the settlement fills up
    pub release_strength: u32,
}

/// Settlement economy tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Tier profiles, index 0 is the smallest settlement
    pub tiers: Vec<TierProfile>,

    /// Half-width of the window scanned for fields (2 gives a 5x5 window)
    pub field_window_radius: i32,

    /// Settlements within this radius of a field change are re-tiered
    ///
    /// Must cover two overlapping field windows so shared fields are seen.
    pub retier_radius: i32,
}

/// Faction-wide caps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Maximum number of live units per faction
    pub max_population: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            map: MapConfig::default(),
            units: UnitConfig::default(),
            proximity: ProximityConfig::default(),
            combat: CombatConfig::default(),
            economy: EconomyConfig::default(),
            population: PopulationConfig::default(),
            parallel_threshold: 256,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tiles_per_side: 64,
            seed: 0x5eed,
        }
    }
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            max_strength: 100,
            decay_rate: 40,
            max_steps_in_direction: 6,
            entry_cooldown_ticks: 30,
            settle_search_depth: 4,
            initial_strength: 10,
        }
    }
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            close_radius: 1,
            mid_radius: 6,
            wide_radius: 14,
            bucket_size: 8,
        }
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            damage_interval_ticks: 50,
        }
    }
}

impl Default for EconomyConfig {
    fn default() -> Self {
        // Capacity grows faster than release strength so a releasing
        // settlement always keeps a core of followers.
        let tiers = [
            (5, 80, 3),
            (10, 60, 5),
            (20, 45, 8),
            (35, 35, 12),
            (50, 30, 16),
            (75, 25, 20),
            (100, 20, 25),
        ]
        .into_iter()
        .map(|(capacity, growth_interval, release_strength)| TierProfile {
            capacity,
            growth_interval,
            release_strength,
        })
        .collect();

        Self {
            tiers,
            field_window_radius: 2,
            retier_radius: 4,
        }
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            max_population: 200,
        }
    }
}

impl EconomyConfig {
    /// Highest tier index
    pub fn max_tier(&self) -> usize {
        self.tiers.len().saturating_sub(1)
    }

    pub fn profile(&self, tier: usize) -> Option<&TierProfile> {
        self.tiers.get(tier)
    }
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; absent keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Loaded simulation config from {}", path.display());
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.map.tiles_per_side < 2 {
            return Err(SimError::InvalidConfig(format!(
                "tiles_per_side ({}) must be at least 2",
                self.map.tiles_per_side
            )));
        }

        let p = &self.proximity;
        if p.close_radius < 1 || p.close_radius >= p.mid_radius || p.mid_radius > p.wide_radius {
            return Err(SimError::InvalidConfig(format!(
                "sensor radii must satisfy 1 <= close ({}) < mid ({}) <= wide ({})",
                p.close_radius, p.mid_radius, p.wide_radius
            )));
        }
        if p.bucket_size < 1 {
            return Err(SimError::InvalidConfig("bucket_size must be positive".into()));
        }

        if self.units.max_strength == 0 || self.units.decay_rate == 0 {
            return Err(SimError::InvalidConfig(
                "max_strength and decay_rate must be positive".into(),
            ));
        }
        if self.units.max_steps_in_direction == 0 {
            return Err(SimError::InvalidConfig(
                "max_steps_in_direction must be positive".into(),
            ));
        }

        if self.combat.damage_interval_ticks == 0 {
            return Err(SimError::InvalidConfig(
                "damage_interval_ticks must be positive".into(),
            ));
        }

        if self.economy.tiers.is_empty() {
            return Err(SimError::InvalidConfig("tier table is empty".into()));
        }
        for (index, tier) in self.economy.tiers.iter().enumerate() {
            if tier.growth_interval == 0 {
                return Err(SimError::InvalidConfig(format!(
                    "tier {} has a zero growth interval",
                    index
                )));
            }
            if tier.release_strength == 0 || tier.release_strength >= tier.capacity {
                return Err(SimError::InvalidConfig(format!(
                    "tier {} release strength ({}) must be in 1..capacity ({})",
                    index, tier.release_strength, tier.capacity
                )));
            }
        }
        if self.economy.retier_radius < self.economy.field_window_radius * 2 {
            return Err(SimError::InvalidConfig(format!(
                "retier_radius ({}) must cover two field windows ({})",
                self.economy.retier_radius,
                self.economy.field_window_radius * 2
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SimulationConfig::from_toml_str(
            r#"
            [map]
            tiles_per_side = 32

            [combat]
            damage_interval_ticks = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.map.tiles_per_side, 32);
        assert_eq!(config.combat.damage_interval_ticks, 10);
        assert_eq!(config.units, UnitConfig::default());
        assert_eq!(config.economy.tiers.len(), 7);
    }

    #[test]
    fn test_invalid_radii_rejected() {
        let mut config = SimulationConfig::default();
        config.proximity.mid_radius = config.proximity.close_radius;
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_release_must_leave_followers() {
        let mut config = SimulationConfig::default();
        config.economy.tiers[0].release_strength = config.economy.tiers[0].capacity;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let result = SimulationConfig::from_toml_str("[map\ntiles_per_side = ");
        assert!(matches!(result, Err(SimError::ConfigParse(_))));
    }
}

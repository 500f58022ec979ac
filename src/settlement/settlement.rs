//! Settlements and the fields that feed them

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::config::{EconomyConfig, TierProfile};
use crate::core::grid::TilePos;
use crate::core::types::{Faction, FieldId, SettlementId};

/// Tier implied by a field count: `(fields + 1) / 2`, capped at the table top
pub fn tier_for_fields(field_count: usize, max_tier: usize) -> usize {
    ((field_count + 1) / 2).min(max_tier)
}

/// A stationary structure accumulating followers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub id: SettlementId,
    /// `None` once burned to a ruin
    pub faction: Option<Faction>,
    pub tile: TilePos,
    /// Center height when founded; a mismatch means the ground moved
    pub recorded_height: f32,
    tier: Option<usize>,
    pub followers: u32,
    pub attacked: bool,
    pub burned: bool,
    pub has_leader: bool,
    pub(crate) growth_countdown: u32,
}

impl Settlement {
    pub fn new(id: SettlementId, faction: Faction, tile: TilePos, recorded_height: f32) -> Self {
        Self {
            id,
            faction: Some(faction),
            tile,
            recorded_height,
            tier: Some(0),
            followers: 0,
            attacked: false,
            burned: false,
            has_leader: false,
            growth_countdown: 0,
        }
    }

    /// Active tier, `None` for a ruin
    pub fn tier(&self) -> Option<usize> {
        self.tier
    }

    pub fn profile<'a>(&self, config: &'a EconomyConfig) -> Option<&'a TierProfile> {
        self.tier.and_then(|t| config.profile(t))
    }

    pub fn capacity(&self, config: &EconomyConfig) -> u32 {
        self.profile(config).map_or(0, |p| p.capacity)
    }

    pub fn is_full(&self, config: &EconomyConfig) -> bool {
        self.followers >= self.capacity(config)
    }

    pub fn room(&self, config: &EconomyConfig) -> u32 {
        self.capacity(config).saturating_sub(self.followers)
    }

    /// Swap the active tier profile; ruins never regain a tier.
    ///
    /// Returns the followers that no longer fit, which the caller must turn
    /// into released units.
    pub fn set_tier(&mut self, tier: usize, config: &EconomyConfig) -> u32 {
        if self.burned {
            return 0;
        }
        let tier = tier.min(config.max_tier());
        if self.tier != Some(tier) {
            self.tier = Some(tier);
            self.growth_countdown = self.profile(config).map_or(0, |p| p.growth_interval);
        }
        let capacity = self.capacity(config);
        let excess = self.followers.saturating_sub(capacity);
        self.followers -= excess;
        excess
    }

    /// Turn the settlement into a neutral, tierless ruin
    pub fn burn(&mut self) {
        self.faction = None;
        self.tier = None;
        self.followers = 0;
        self.attacked = false;
        self.burned = true;
        self.has_leader = false;
    }

    pub fn is_ruin(&self) -> bool {
        self.burned
    }
}

/// A tile of cultivated land serving one or more settlements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub faction: Faction,
    pub tile: TilePos,
    /// Settlements counting this field; the field dies with the last one
    pub served: BTreeSet<SettlementId>,
}

impl Field {
    pub fn new(id: FieldId, faction: Faction, tile: TilePos) -> Self {
        Self {
            id,
            faction,
            tile,
            served: BTreeSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_formula() {
        assert_eq!(tier_for_fields(0, 6), 0);
        assert_eq!(tier_for_fields(1, 6), 1);
        assert_eq!(tier_for_fields(2, 6), 1);
        assert_eq!(tier_for_fields(3, 6), 2);
        assert_eq!(tier_for_fields(24, 6), 6);
    }

    #[test]
    fn test_downgrade_returns_excess() {
        let config = EconomyConfig::default();
        let mut settlement = Settlement::new(SettlementId(1), Faction::Red, TilePos::new(4, 4), 1.0);
        settlement.set_tier(3, &config);
        settlement.followers = 30;

        let excess = settlement.set_tier(1, &config);
        assert_eq!(excess, 20);
        assert_eq!(settlement.followers, 10);
        assert!(settlement.is_full(&config));
    }

    #[test]
    fn test_burned_settlement_never_regains_tier() {
        let config = EconomyConfig::default();
        let mut settlement = Settlement::new(SettlementId(1), Faction::Blue, TilePos::new(4, 4), 1.0);
        settlement.set_tier(2, &config);
        settlement.followers = 12;

        settlement.burn();
        assert_eq!(settlement.tier(), None);
        assert_eq!(settlement.capacity(&config), 0);

        assert_eq!(settlement.set_tier(4, &config), 0);
        assert_eq!(settlement.tier(), None);
        assert_eq!(settlement.capacity(&config), 0);
        assert_eq!(settlement.faction, None);
    }
}

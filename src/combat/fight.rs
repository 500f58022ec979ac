//! A paired combat session

use serde::{Deserialize, Serialize};

use crate::core::types::{FightId, SettlementId, UnitId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fight {
    pub id: FightId,
    pub attacker: UnitId,
    pub defender: UnitId,
    /// Settlement the defender turned out for, if any
    pub settlement: Option<SettlementId>,
    /// Ticks until the next damage exchange
    pub countdown: u32,
}

impl Fight {
    pub fn new(
        id: FightId,
        attacker: UnitId,
        defender: UnitId,
        settlement: Option<SettlementId>,
        interval: u32,
    ) -> Self {
        Self {
            id,
            attacker,
            defender,
            settlement,
            countdown: interval,
        }
    }

    pub fn involves(&self, unit: UnitId) -> bool {
        self.attacker == unit || self.defender == unit
    }

    pub fn opponent_of(&self, unit: UnitId) -> Option<UnitId> {
        if unit == self.attacker {
            Some(self.defender)
        } else if unit == self.defender {
            Some(self.attacker)
        } else {
            None
        }
    }
}

/// How a fight ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FightOutcome {
    /// `loser` is `None` when the other side vanished before losing
    Won {
        fight: FightId,
        winner: UnitId,
        loser: Option<UnitId>,
        settlement: Option<SettlementId>,
    },
    /// Both combatants are gone; nothing to award
    Discarded {
        fight: FightId,
        settlement: Option<SettlementId>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent_lookup() {
        let fight = Fight::new(FightId(1), UnitId(3), UnitId(4), None, 50);
        assert_eq!(fight.opponent_of(UnitId(3)), Some(UnitId(4)));
        assert_eq!(fight.opponent_of(UnitId(4)), Some(UnitId(3)));
        assert_eq!(fight.opponent_of(UnitId(5)), None);
        assert!(fight.involves(UnitId(4)));
    }
}

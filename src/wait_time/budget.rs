//! Protected-queue wait budgets for premade squads
//!
//! A squad may wait in the team queue for a classification-dependent time
//! before it is moved into the open queue for good.

use crate::error::{MatchmakingError, Result};
use crate::types::GroupType;
use serde::{Deserialize, Serialize};

/// Per-classification time a squad may spend in the team queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquadWaitBudget {
    pub normal_sec: i64,
    pub unfriendly_sec: i64,
    pub malicious_sec: i64,
}

impl Default for SquadWaitBudget {
    fn default() -> Self {
        Self {
            normal_sec: 30,
            unfriendly_sec: 60,
            malicious_sec: 120,
        }
    }
}

impl SquadWaitBudget {
    /// Budget for a classification; plain groups have no protected window
    pub fn budget_for(&self, group_type: GroupType) -> Option<i64> {
        match group_type {
            GroupType::NotSquad => None,
            GroupType::Normal => Some(self.normal_sec),
            GroupType::Unfriendly => Some(self.unfriendly_sec),
            GroupType::Malicious => Some(self.malicious_sec),
        }
    }

    /// Whether a squad that has waited `waited_sec` leaves the team queue
    pub fn should_migrate(&self, group_type: GroupType, waited_sec: i64) -> bool {
        match self.budget_for(group_type) {
            Some(budget) => waited_sec >= budget,
            None => true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.normal_sec < 0 {
            return Err(MatchmakingError::config("normal_team_wait_time_sec must be non-negative").into());
        }
        if self.normal_sec >= self.unfriendly_sec || self.unfriendly_sec >= self.malicious_sec {
            return Err(MatchmakingError::config(
                "Team wait budgets must satisfy normal < unfriendly < malicious",
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_lookup() {
        let budget = SquadWaitBudget::default();
        assert_eq!(budget.budget_for(GroupType::NotSquad), None);
        assert_eq!(budget.budget_for(GroupType::Normal), Some(30));
        assert_eq!(budget.budget_for(GroupType::Malicious), Some(120));
    }

    #[test]
    fn test_migration_thresholds() {
        let budget = SquadWaitBudget::default();
        assert!(!budget.should_migrate(GroupType::Normal, 29));
        assert!(budget.should_migrate(GroupType::Normal, 30));
        assert!(!budget.should_migrate(GroupType::Unfriendly, 45));
        assert!(budget.should_migrate(GroupType::Unfriendly, 60));
        assert!(!budget.should_migrate(GroupType::Malicious, 119));
        assert!(budget.should_migrate(GroupType::NotSquad, 0));
    }

    #[test]
    fn test_budget_validation() {
        assert!(SquadWaitBudget::default().validate().is_ok());
        let inverted = SquadWaitBudget {
            normal_sec: 90,
            unfriendly_sec: 60,
            malicious_sec: 120,
        };
        assert!(inverted.validate().is_err());

        let tied = SquadWaitBudget {
            normal_sec: 30,
            unfriendly_sec: 60,
            malicious_sec: 60,
        };
        assert!(tied.validate().is_err());
    }
}

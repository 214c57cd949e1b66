//! Matching policy configuration
//!
//! Hot-reloadable values read by the matcher once every
//! `config_refresh_cycles` cycles.

use crate::error::{MatchmakingError, Result};
use crate::rating::classification::SquadRules;
use crate::wait_time::{FairnessLadder, SquadWaitBudget};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Policy values for one matching domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Groups waiting longer than this are cancelled with "match timeout"
    pub match_timeout_sec: i64,
    /// Players per team
    pub squad_player_limit: usize,
    /// Teams per room
    pub room_side_count: usize,
    /// Restrict newcomer groups to pairing with other newcomers
    pub newer_with_newer: bool,
    /// Member MMR variance at which a squad is flagged unfriendly
    pub unfriendly_variance_min: f64,
    /// Member MMR variance at which a squad is flagged malicious
    pub malicious_variance_min: f64,
    /// Team-queue budget for normal squads
    pub normal_team_wait_time_sec: i64,
    /// Team-queue budget for unfriendly squads
    pub unfriendly_team_wait_time_sec: i64,
    /// Team-queue budget for malicious squads
    pub malicious_team_wait_time_sec: i64,
    /// Wait-time-indexed tolerances
    pub fairness_ladder: FairnessLadder,
    /// Matching cycle period
    pub tick_interval_ms: u64,
    /// Configuration is pulled from the provider every this many cycles
    pub config_refresh_cycles: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        let budget = SquadWaitBudget::default();
        Self {
            match_timeout_sec: 300,
            squad_player_limit: 5,
            room_side_count: 2,
            newer_with_newer: false,
            // Standard deviations of 500 and 1000 MMR
            unfriendly_variance_min: 250_000.0,
            malicious_variance_min: 1_000_000.0,
            normal_team_wait_time_sec: budget.normal_sec,
            unfriendly_team_wait_time_sec: budget.unfriendly_sec,
            malicious_team_wait_time_sec: budget.malicious_sec,
            fairness_ladder: FairnessLadder::default(),
            tick_interval_ms: 1000,
            config_refresh_cycles: 10,
        }
    }
}

impl MatchingConfig {
    /// Classification inputs derived from this configuration
    pub fn squad_rules(&self) -> SquadRules {
        SquadRules {
            squad_size: self.squad_player_limit,
            unfriendly_variance_min: self.unfriendly_variance_min,
            malicious_variance_min: self.malicious_variance_min,
        }
    }

    /// Team-queue budgets derived from this configuration
    pub fn wait_budget(&self) -> SquadWaitBudget {
        SquadWaitBudget {
            normal_sec: self.normal_team_wait_time_sec,
            unfriendly_sec: self.unfriendly_team_wait_time_sec,
            malicious_sec: self.malicious_team_wait_time_sec,
        }
    }

    /// Seats in a complete room
    pub fn room_capacity(&self) -> usize {
        self.squad_player_limit * self.room_side_count
    }

    /// Get the tick interval as Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.match_timeout_sec <= 0 {
            return Err(MatchmakingError::config("match_timeout_sec must be greater than 0").into());
        }

        if self.squad_player_limit == 0 {
            return Err(MatchmakingError::config("squad_player_limit must be greater than 0").into());
        }

        if self.room_side_count == 0 {
            return Err(MatchmakingError::config("room_side_count must be greater than 0").into());
        }

        if self.unfriendly_variance_min < 0.0
            || self.malicious_variance_min < self.unfriendly_variance_min
        {
            return Err(MatchmakingError::config(
                "Variance thresholds must satisfy 0 <= unfriendly <= malicious",
            )
            .into());
        }

        if self.tick_interval_ms == 0 {
            return Err(MatchmakingError::config("tick_interval_ms must be greater than 0").into());
        }

        if self.config_refresh_cycles == 0 {
            return Err(MatchmakingError::config("config_refresh_cycles must be at least 1").into());
        }

        self.wait_budget().validate()?;
        self.fairness_ladder.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait_time::FairnessRange;

    #[test]
    fn test_default_config_is_valid() {
        let config = MatchingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.room_capacity(), 10);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = MatchingConfig::default();
        config.squad_player_limit = 0;
        assert!(config.validate().is_err());

        let mut config = MatchingConfig::default();
        config.malicious_variance_min = 10.0;
        assert!(config.validate().is_err());

        let mut config = MatchingConfig::default();
        config.unfriendly_team_wait_time_sec = 500;
        assert!(config.validate().is_err());

        let mut config = MatchingConfig::default();
        config.match_timeout_sec = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip_with_ladder() {
        let toml_str = r#"
            match_timeout_sec = 120
            squad_player_limit = 3
            room_side_count = 2

            [[fairness_ladder]]
            max_wait_sec = 20
            mmr_gap_percent = 5
            can_join_team = false
            star_gap = 1

            [[fairness_ladder]]
            max_wait_sec = 60
            mmr_gap_percent = 0
            can_join_team = true
            star_gap = 0
        "#;

        let config: MatchingConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.match_timeout_sec, 120);
        assert_eq!(config.squad_player_limit, 3);
        // Unspecified fields fall back to defaults
        assert_eq!(config.normal_team_wait_time_sec, 30);
        assert_eq!(
            config.fairness_ladder.rows(),
            &[
                FairnessRange::new(20, 5, false, 1),
                FairnessRange::new(60, 0, true, 0)
            ]
        );
        assert!(config.validate().is_ok());
    }
}

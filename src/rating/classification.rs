//! Squad classification by member rating spread
//!
//! A full squad whose member ratings are widely spread is usually a strong
//! player carrying weak accounts. Such squads are scored at or near their
//! best member so they meet tougher opposition.

use crate::rating::player::RatedPlayer;
use crate::types::GroupType;
use crate::utils;

/// Rating of a squad flagged unfriendly is its mean times this, capped at its best member
pub const UNFRIENDLY_MMR_MULTIPLIER: f64 = 1.5;

/// Inputs for classification, taken from the matching configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquadRules {
    pub squad_size: usize,
    pub unfriendly_variance_min: f64,
    pub malicious_variance_min: f64,
}

/// Rating metrics over a set of players
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmrSummary {
    pub player_count: usize,
    pub average: f64,
    pub biggest: f64,
    pub variance: f64,
}

impl MmrSummary {
    pub fn from_players<'a>(players: impl IntoIterator<Item = &'a RatedPlayer>) -> Self {
        let mmrs: Vec<f64> = players.into_iter().map(|p| p.mmr).collect();
        Self::from_mmrs(&mmrs)
    }

    pub fn from_mmrs(mmrs: &[f64]) -> Self {
        Self {
            player_count: mmrs.len(),
            average: utils::mean(mmrs),
            biggest: if mmrs.is_empty() {
                0.0
            } else {
                mmrs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            },
            variance: utils::variance(mmrs),
        }
    }

    /// Classify a squad with these metrics
    pub fn classify(&self, rules: &SquadRules) -> GroupType {
        if self.player_count != rules.squad_size {
            return GroupType::NotSquad;
        }

        if self.variance >= rules.malicious_variance_min {
            GroupType::Malicious
        } else if self.variance >= rules.unfriendly_variance_min {
            GroupType::Unfriendly
        } else {
            GroupType::Normal
        }
    }

    /// Matching MMR under a given classification
    pub fn effective_mmr(&self, group_type: GroupType) -> f64 {
        match group_type {
            GroupType::NotSquad | GroupType::Normal => self.average,
            GroupType::Unfriendly => (self.average * UNFRIENDLY_MMR_MULTIPLIER).min(self.biggest),
            GroupType::Malicious => self.biggest,
        }
    }
}

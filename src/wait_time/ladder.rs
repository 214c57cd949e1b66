//! Fairness ladder: wait-time-indexed matching tolerances
//!
//! Each row widens the tolerated rating and star gaps once a squad has waited
//! past the previous row's bound. The last row is the open-ended fallback.

use crate::error::{MatchmakingError, Result};
use crate::utils::rating_difference;
use serde::{Deserialize, Serialize};

/// One row of the fairness ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairnessRange {
    /// Row applies while the wait is strictly below this bound
    pub max_wait_sec: i64,
    /// Allowed MMR gap as a percentage of the peer's MMR, 0 = unlimited
    pub mmr_gap_percent: u32,
    /// Whether pairings involving a premade party are allowed
    pub can_join_team: bool,
    /// Allowed star gap, 0 = unlimited
    pub star_gap: u32,
}

impl FairnessRange {
    pub fn new(max_wait_sec: i64, mmr_gap_percent: u32, can_join_team: bool, star_gap: u32) -> Self {
        Self {
            max_wait_sec,
            mmr_gap_percent,
            can_join_team,
            star_gap,
        }
    }

    /// Check an MMR gap against this row, measured relative to the peer
    pub fn allows_mmr_gap(&self, candidate_mmr: f64, peer_mmr: f64) -> bool {
        if self.mmr_gap_percent == 0 {
            return true;
        }
        let allowed = peer_mmr.abs() * self.mmr_gap_percent as f64 / 100.0;
        rating_difference(candidate_mmr, peer_mmr) <= allowed
    }

    /// Check a star gap against this row
    pub fn allows_star_gap(&self, candidate_star: f64, peer_star: f64) -> bool {
        if self.star_gap == 0 {
            return true;
        }
        rating_difference(candidate_star, peer_star) <= self.star_gap as f64
    }
}

/// Ordered list of fairness rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FairnessLadder {
    rows: Vec<FairnessRange>,
}

impl Default for FairnessLadder {
    fn default() -> Self {
        Self {
            rows: vec![
                FairnessRange::new(15, 10, false, 2),
                FairnessRange::new(30, 20, false, 4),
                FairnessRange::new(60, 40, true, 8),
                FairnessRange::new(90, 80, true, 0),
                FairnessRange::new(i64::MAX, 0, true, 0),
            ],
        }
    }
}

impl FairnessLadder {
    pub fn new(rows: Vec<FairnessRange>) -> Result<Self> {
        let ladder = Self { rows };
        ladder.validate()?;
        Ok(ladder)
    }

    pub fn rows(&self) -> &[FairnessRange] {
        &self.rows
    }

    /// Row for a given wait: the first whose bound exceeds the wait, else the last
    pub fn range_for(&self, wait_sec: i64) -> FairnessRange {
        self.rows
            .iter()
            .find(|row| row.max_wait_sec > wait_sec)
            .or_else(|| self.rows.last())
            .copied()
            // An empty ladder never passes validation; treat it as fully open.
            .unwrap_or(FairnessRange::new(i64::MAX, 0, true, 0))
    }

    /// Rows must be ordered by wait and never tighten as the wait grows
    pub fn validate(&self) -> Result<()> {
        if self.rows.is_empty() {
            return Err(MatchmakingError::config("Fairness ladder must have at least one row").into());
        }

        for pair in self.rows.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.max_wait_sec <= prev.max_wait_sec {
                return Err(MatchmakingError::config(format!(
                    "Fairness ladder rows must have ascending max_wait_sec ({} then {})",
                    prev.max_wait_sec, next.max_wait_sec
                ))
                .into());
            }
            if !gap_widens(prev.mmr_gap_percent, next.mmr_gap_percent) {
                return Err(MatchmakingError::config(format!(
                    "Fairness ladder mmr_gap_percent tightens after {}s",
                    prev.max_wait_sec
                ))
                .into());
            }
            if !gap_widens(prev.star_gap, next.star_gap) {
                return Err(MatchmakingError::config(format!(
                    "Fairness ladder star_gap tightens after {}s",
                    prev.max_wait_sec
                ))
                .into());
            }
        }

        Ok(())
    }
}

/// 0 means unlimited, so once a gap is unlimited it must stay unlimited
fn gap_widens(prev: u32, next: u32) -> bool {
    match (prev, next) {
        (0, 0) => true,
        (0, _) => false,
        (_, 0) => true,
        (p, n) => n >= p,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_range_lookup() {
        let ladder = FairnessLadder::default();
        assert_eq!(ladder.range_for(0).mmr_gap_percent, 10);
        assert_eq!(ladder.range_for(14).mmr_gap_percent, 10);
        assert_eq!(ladder.range_for(15).mmr_gap_percent, 20);
        assert!(!ladder.range_for(29).can_join_team);
        assert!(ladder.range_for(30).can_join_team);
        assert_eq!(ladder.range_for(89).mmr_gap_percent, 80);
        assert_eq!(ladder.range_for(90).mmr_gap_percent, 0);
    }

    #[test]
    fn test_last_row_is_fallback() {
        let ladder = FairnessLadder::new(vec![
            FairnessRange::new(10, 5, false, 1),
            FairnessRange::new(20, 15, true, 3),
        ])
        .unwrap();
        assert_eq!(ladder.range_for(500), FairnessRange::new(20, 15, true, 3));
    }

    #[test]
    fn test_gap_checks() {
        let row = FairnessRange::new(15, 10, false, 2);
        assert!(row.allows_mmr_gap(1100.0, 1000.0));
        assert!(!row.allows_mmr_gap(1300.0, 1000.0));
        assert!(row.allows_star_gap(5.0, 3.0));
        assert!(!row.allows_star_gap(6.0, 3.0));

        let open = FairnessRange::new(i64::MAX, 0, true, 0);
        assert!(open.allows_mmr_gap(9000.0, 1000.0));
        assert!(open.allows_star_gap(90.0, 1.0));
    }

    #[test]
    fn test_validation_rejects_bad_ladders() {
        assert!(FairnessLadder::new(vec![]).is_err());

        // Unordered waits
        assert!(FairnessLadder::new(vec![
            FairnessRange::new(30, 10, false, 0),
            FairnessRange::new(15, 20, false, 0),
        ])
        .is_err());

        // Tightening gap
        assert!(FairnessLadder::new(vec![
            FairnessRange::new(15, 20, false, 0),
            FairnessRange::new(30, 10, false, 0),
        ])
        .is_err());

        // Unlimited then limited
        assert!(FairnessLadder::new(vec![
            FairnessRange::new(15, 0, false, 0),
            FairnessRange::new(30, 50, false, 0),
        ])
        .is_err());

        assert!(FairnessLadder::default().validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_relaxation_is_monotonic(
            candidate in 500.0f64..3000.0,
            peer in 500.0f64..3000.0,
            wait in 0i64..200,
            extra in 0i64..200,
        ) {
            let ladder = FairnessLadder::default();
            let early = ladder.range_for(wait);
            let late = ladder.range_for(wait + extra);
            if early.allows_mmr_gap(candidate, peer) {
                prop_assert!(late.allows_mmr_gap(candidate, peer));
            }
            if early.allows_star_gap(candidate / 100.0, peer / 100.0) {
                prop_assert!(late.allows_star_gap(candidate / 100.0, peer / 100.0));
            }
        }
    }
}

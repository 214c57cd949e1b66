//! Rated player value type

use crate::types::{PlayerId, PlayerRating, UnixSeconds};
use serde::{Deserialize, Serialize};
use skillratings::glicko2::Glicko2Rating;

/// A player as seen by the matcher
///
/// Immutable for the duration of a matching cycle and owned by the group
/// that queued it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedPlayer {
    pub id: PlayerId,
    pub rating: PlayerRating,
    /// Scalar skill estimate used for matching
    pub mmr: f64,
    /// Rank tier shown to players
    pub star: u32,
    pub is_bot: bool,
    /// When the player started waiting
    pub wait_start: UnixSeconds,
    /// When the wait ended, if it has
    pub wait_end: Option<UnixSeconds>,
}

impl RatedPlayer {
    /// Create a human player whose MMR is the Glicko-2 mean
    pub fn new(id: impl Into<PlayerId>, rating: PlayerRating, wait_start: UnixSeconds) -> Self {
        Self {
            id: id.into(),
            mmr: derive_mmr(&rating),
            rating,
            star: 0,
            is_bot: false,
            wait_start,
            wait_end: None,
        }
    }

    /// Create a player with a plain MMR and default deviation/volatility
    pub fn with_mmr(id: impl Into<PlayerId>, mmr: f64, wait_start: UnixSeconds) -> Self {
        let rating = PlayerRating {
            rating: mmr,
            ..PlayerRating::default()
        };
        Self::new(id, rating, wait_start)
    }

    pub fn star(mut self, star: u32) -> Self {
        self.star = star;
        self
    }

    pub fn bot(mut self) -> Self {
        self.is_bot = true;
        self
    }

    /// Seconds waited so far, or in total once the wait has ended
    pub fn wait_seconds(&self, now: UnixSeconds) -> i64 {
        self.wait_end.unwrap_or(now) - self.wait_start
    }
}

/// MMR for a rating triple
///
/// The Glicko-2 mean is the skill estimate; deviation and volatility only
/// describe confidence in it and are carried through for the consumers.
pub fn derive_mmr(rating: &PlayerRating) -> f64 {
    let glicko: Glicko2Rating = (*rating).into();
    glicko.rating
}

//! Common types used throughout the matchmaking core

use serde::{Deserialize, Serialize};
use skillratings::glicko2::Glicko2Rating;
use uuid::Uuid;

/// Unique identifier for players and bots
pub type PlayerId = String;

/// Unique identifier for player-formed groups
pub type GroupId = String;

/// Unique identifier for assembled teams
pub type TeamId = Uuid;

/// Unique identifier for completed rooms
pub type RoomId = Uuid;

/// Unix timestamp in whole seconds
pub type UnixSeconds = i64;

/// Glicko-2 rating triple for a player
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerRating {
    pub rating: f64,
    pub deviation: f64,
    pub volatility: f64,
}

impl Default for PlayerRating {
    fn default() -> Self {
        Glicko2Rating::new().into()
    }
}

impl From<Glicko2Rating> for PlayerRating {
    fn from(rating: Glicko2Rating) -> Self {
        Self {
            rating: rating.rating,
            deviation: rating.deviation,
            volatility: rating.volatility,
        }
    }
}

impl From<PlayerRating> for Glicko2Rating {
    fn from(rating: PlayerRating) -> Self {
        Self {
            rating: rating.rating,
            deviation: rating.deviation,
            volatility: rating.volatility,
        }
    }
}

/// Lifecycle state of a group as seen by the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupState {
    Unready,
    Queuing,
    Matched,
}

/// Squad classification derived from the spread of member ratings
///
/// Variants are ordered by severity so the worst classification of a set of
/// groups is simply the maximum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum GroupType {
    /// Player count differs from the squad size
    NotSquad,
    Normal,
    Unfriendly,
    Malicious,
}

impl GroupType {
    /// Whether this group belongs in the premade-squad queue
    pub fn is_squad(&self) -> bool {
        !matches!(self, GroupType::NotSquad)
    }
}

impl std::fmt::Display for GroupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupType::NotSquad => write!(f, "not_squad"),
            GroupType::Normal => write!(f, "normal"),
            GroupType::Unfriendly => write!(f, "unfriendly"),
            GroupType::Malicious => write!(f, "malicious"),
        }
    }
}

/// Why a group was pulled out of matchmaking without a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancelReason {
    MatchTimeout,
    ServerStopping,
}

impl CancelReason {
    /// Fixed reason string handed to the party layer
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::MatchTimeout => "match timeout",
            CancelReason::ServerStopping => "server stopping",
        }
    }
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two queues a matcher owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueKind {
    /// Pre-formed full-size squads
    Team,
    /// Everyone else, plus squads migrated out of the team queue
    Normal,
}

impl QueueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Team => "team",
            QueueKind::Normal => "normal",
        }
    }
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Independent matching domain, keyed by game mode and client version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchDomain {
    pub mode: String,
    pub version: String,
}

impl MatchDomain {
    pub fn new(mode: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for MatchDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.mode, self.version)
    }
}

/// Notification delivered to the party layer when matching is cancelled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelNotice {
    pub group_id: GroupId,
    pub reason: CancelReason,
    pub waited_sec: i64,
}

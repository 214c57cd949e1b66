//! Rated entity model: players and squad classification
//!
//! Players carry a Glicko-2 rating triple from which a scalar MMR is derived.
//! Squads are classified by the spread of their members' MMR and scored
//! accordingly for matching.

pub mod classification;
pub mod player;

// Re-export commonly used types
pub use classification::{MmrSummary, SquadRules};
pub use player::{derive_mmr, RatedPlayer};

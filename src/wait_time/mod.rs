//! Wait-time policy for the matchmaking core
//!
//! This module holds the fairness ladder that relaxes matching tolerances as
//! groups wait, the team-queue wait budgets that drive squad migration, and
//! statistics over observed match waits.

pub mod budget;
pub mod ladder;
pub mod statistics;

// Re-export commonly used types
pub use budget::SquadWaitBudget;
pub use ladder::{FairnessLadder, FairnessRange};
pub use statistics::{InMemoryStatisticsTracker, StatisticsTracker, StatsKey, WaitOutcome, WaitTimeStats};

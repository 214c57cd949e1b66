//! War Room - rating-aware squad and room matchmaking
//!
//! This crate groups queued players into teams and teams into rooms using
//! Glicko-2 derived MMR, a wait-time fairness ladder, and a separate queue
//! for premade squads that falls back to the normal queue after a wait budget.

pub mod config;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod queue;
pub mod rating;
pub mod squad;
pub mod types;
pub mod utils;
pub mod wait_time;

// Re-export commonly used types and traits
pub use error::{CycleError, MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use config::{AppConfig, ConfigProvider, MatchingConfig, StaticConfigProvider};
pub use matcher::{ChannelRoomSink, Matcher, MatcherOptions, MatcherStats, RoomSink};
pub use queue::MatchQueue;
pub use squad::{Group, PartyGroup, Room, Team};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Matching pools and the assembly pass
//!
//! A [`MatchQueue`] holds waiting groups; each cycle its snapshot goes
//! through [`assemble`], which combines groups into teams and teams into
//! rooms under the compatibility rules in [`matching`].

pub mod assembly;
pub mod instance;
pub mod matching;
pub mod search;

pub use assembly::{assemble, AssemblyOutcome};
pub use instance::{CycleOutcome, MatchQueue, QueueSnapshot};
pub use matching::{can_group_join_team, can_team_join_room, MatchContext};
pub use search::{SortedPool, BINARY_SEARCH_WINDOW, LINEAR_SEARCH_THRESHOLD};

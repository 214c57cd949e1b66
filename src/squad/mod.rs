//! Groups, teams and rooms
//!
//! Groups come from the party layer. Teams and rooms are built by a queue's
//! assembly pass through an [`EntityFactory`].

pub mod factory;
pub mod group;
pub mod room;
pub mod team;

pub use factory::{EntityFactory, StandardFactory};
pub use group::{Group, PartyGroup};
pub use room::{MatchRoom, Room, RoomSummary, TeamSummary};
pub use team::{SquadTeam, Team};

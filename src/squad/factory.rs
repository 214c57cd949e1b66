//! Construction of teams and rooms
//!
//! Queues never name concrete team or room types; they go through an
//! [`EntityFactory`] so callers can supply their own variants.

use crate::squad::group::Group;
use crate::squad::room::{MatchRoom, Room};
use crate::squad::team::{SquadTeam, Team};
use std::sync::Arc;

/// Builds the scratch entities of an assembly pass
pub trait EntityFactory: Send + Sync {
    /// New team seeded with one group
    fn new_team(&self, seed: Arc<dyn Group>) -> Box<dyn Team>;

    /// New room seeded with one team
    fn new_room(&self, seed: Box<dyn Team>) -> Box<dyn Room>;

    /// Complete room of one human team against `bot_sides` bot teams
    fn new_room_with_bots(&self, team: Box<dyn Team>, bot_sides: usize) -> Box<dyn Room>;
}

/// Factory producing [`SquadTeam`] and [`MatchRoom`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFactory;

impl EntityFactory for StandardFactory {
    fn new_team(&self, seed: Arc<dyn Group>) -> Box<dyn Team> {
        Box::new(SquadTeam::new(seed))
    }

    fn new_room(&self, seed: Box<dyn Team>) -> Box<dyn Room> {
        Box::new(MatchRoom::new(seed))
    }

    fn new_room_with_bots(&self, team: Box<dyn Team>, bot_sides: usize) -> Box<dyn Room> {
        Box::new(MatchRoom::with_bots(team, bot_sides))
    }
}

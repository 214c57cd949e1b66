//! Rooms of opposing teams

use crate::rating::SquadRules;
use crate::squad::group::Group;
use crate::squad::team::Team;
use crate::types::{GroupId, RoomId, TeamId, UnixSeconds};
use crate::utils::{self, generate_room_id};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Capabilities of an assembled room
pub trait Room: Send + Sync + fmt::Debug {
    /// Get room ID
    fn id(&self) -> RoomId;

    /// Human teams, in attachment order
    fn teams(&self) -> &[Box<dyn Team>];

    /// Attach a team
    fn add_team(&mut self, team: Box<dyn Team>);

    /// Number of sides filled with bots
    fn bot_sides(&self) -> usize;

    /// Dissolve the room into its teams
    fn into_teams(self: Box<Self>) -> Vec<Box<dyn Team>>;

    /// Sides occupied, human and bot
    fn side_count(&self) -> usize {
        self.teams().len() + self.bot_sides()
    }

    fn is_full(&self, room_side_count: usize) -> bool {
        self.side_count() == room_side_count
    }

    /// Mean of the human teams' effective MMRs
    fn average_mmr(&self, rules: &SquadRules) -> f64 {
        let mmrs: Vec<f64> = self.teams().iter().map(|t| t.effective_mmr(rules)).collect();
        utils::mean(&mmrs)
    }

    /// Human players seated
    fn player_count(&self) -> usize {
        self.teams().iter().map(|t| t.player_count()).sum()
    }

    fn start_match_time_sec(&self) -> UnixSeconds {
        self.teams()
            .iter()
            .map(|t| t.start_match_time_sec())
            .min()
            .unwrap_or_default()
    }

    fn wait_seconds(&self, now: UnixSeconds) -> i64 {
        now - self.start_match_time_sec()
    }

    fn has_bot(&self) -> bool {
        self.bot_sides() > 0 || self.teams().iter().any(|t| t.has_bot())
    }

    /// Every group seated in the room
    fn groups(&self) -> Vec<Arc<dyn Group>> {
        self.teams()
            .iter()
            .flat_map(|t| t.groups().iter().cloned())
            .collect()
    }

    /// Serializable view for result consumers
    fn summary(&self, rules: &SquadRules) -> RoomSummary {
        RoomSummary {
            id: self.id(),
            teams: self
                .teams()
                .iter()
                .map(|t| TeamSummary {
                    id: t.id(),
                    groups: t.groups().iter().map(|g| g.id().clone()).collect(),
                    effective_mmr: t.effective_mmr(rules),
                })
                .collect(),
            bot_sides: self.bot_sides(),
            average_mmr: self.average_mmr(rules),
            player_count: self.player_count(),
        }
    }
}

/// Room as handed to logs and downstream consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub teams: Vec<TeamSummary>,
    pub bot_sides: usize,
    pub average_mmr: f64,
    pub player_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub id: TeamId,
    pub groups: Vec<GroupId>,
    pub effective_mmr: f64,
}

/// Room implementation produced by the standard factory
#[derive(Debug)]
pub struct MatchRoom {
    id: RoomId,
    teams: Vec<Box<dyn Team>>,
    bot_sides: usize,
}

impl MatchRoom {
    /// Create a room seeded with one team
    pub fn new(seed: Box<dyn Team>) -> Self {
        Self {
            id: generate_room_id(),
            teams: vec![seed],
            bot_sides: 0,
        }
    }

    /// Create a room whose remaining sides are bots
    pub fn with_bots(team: Box<dyn Team>, bot_sides: usize) -> Self {
        Self {
            bot_sides,
            ..Self::new(team)
        }
    }
}

impl Room for MatchRoom {
    fn id(&self) -> RoomId {
        self.id
    }

    fn teams(&self) -> &[Box<dyn Team>] {
        &self.teams
    }

    fn add_team(&mut self, team: Box<dyn Team>) {
        self.teams.push(team);
    }

    fn bot_sides(&self) -> usize {
        self.bot_sides
    }

    fn into_teams(self: Box<Self>) -> Vec<Box<dyn Team>> {
        self.teams
    }
}

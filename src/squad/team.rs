//! Teams assembled from groups
//!
//! A team is scratch state of a single assembly pass: when the pass cannot
//! complete it, it is dissolved back into its groups.

use crate::rating::{MmrSummary, SquadRules};
use crate::squad::group::Group;
use crate::types::{GroupType, TeamId, UnixSeconds};
use crate::utils::generate_team_id;
use std::fmt;
use std::sync::Arc;

/// Capabilities of one side of a room
pub trait Team: Send + Sync + fmt::Debug {
    /// Get team ID
    fn id(&self) -> TeamId;

    /// Groups attached so far, in attachment order
    fn groups(&self) -> &[Arc<dyn Group>];

    /// Attach a group
    fn add_group(&mut self, group: Arc<dyn Group>);

    /// Dissolve the team into its groups
    fn into_groups(self: Box<Self>) -> Vec<Arc<dyn Group>>;

    fn player_count(&self) -> usize {
        self.groups().iter().map(|g| g.player_count()).sum()
    }

    fn is_full(&self, squad_size: usize) -> bool {
        self.player_count() == squad_size
    }

    /// Rating metrics over every player in the team
    fn mmr_summary(&self) -> MmrSummary {
        MmrSummary::from_players(self.groups().iter().flat_map(|g| g.players().iter()))
    }

    /// The most severe classification among the groups
    fn group_type(&self, rules: &SquadRules) -> GroupType {
        self.groups()
            .iter()
            .map(|g| g.group_type(rules))
            .max()
            .unwrap_or(GroupType::NotSquad)
    }

    fn effective_mmr(&self, rules: &SquadRules) -> f64 {
        self.mmr_summary().effective_mmr(self.group_type(rules))
    }

    fn average_mmr(&self) -> f64 {
        self.mmr_summary().average
    }

    /// Average star over every player
    fn star(&self) -> f64 {
        let (total, count) = self
            .groups()
            .iter()
            .flat_map(|g| g.players().iter())
            .fold((0.0, 0usize), |(total, count), p| (total + p.star as f64, count + 1));
        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    }

    /// Earliest wait start among the groups
    fn start_match_time_sec(&self) -> UnixSeconds {
        self.groups()
            .iter()
            .map(|g| g.start_match_time_sec())
            .min()
            .unwrap_or_default()
    }

    fn wait_seconds(&self, now: UnixSeconds) -> i64 {
        now - self.start_match_time_sec()
    }

    fn has_bot(&self) -> bool {
        self.groups().iter().any(|g| g.has_bot())
    }

    /// Whether every group accepts bot opponents at `now`
    fn can_fill_bots(&self, now: UnixSeconds) -> bool {
        !self.groups().is_empty() && self.groups().iter().all(|g| g.can_fill_bots(now))
    }

    /// Whether every group is newcomers
    fn is_newcomer(&self) -> bool {
        !self.groups().is_empty() && self.groups().iter().all(|g| g.is_newcomer())
    }

    /// Whether any group is a premade party
    fn has_premade(&self) -> bool {
        self.groups().iter().any(|g| g.is_premade())
    }
}

/// Team implementation produced by the standard factory
#[derive(Debug)]
pub struct SquadTeam {
    id: TeamId,
    groups: Vec<Arc<dyn Group>>,
}

impl SquadTeam {
    /// Create a team seeded with one group
    pub fn new(seed: Arc<dyn Group>) -> Self {
        Self::with_id(generate_team_id(), seed)
    }

    /// Create a team with a specific ID
    pub fn with_id(id: TeamId, seed: Arc<dyn Group>) -> Self {
        Self {
            id,
            groups: vec![seed],
        }
    }
}

impl Team for SquadTeam {
    fn id(&self) -> TeamId {
        self.id
    }

    fn groups(&self) -> &[Arc<dyn Group>] {
        &self.groups
    }

    fn add_group(&mut self, group: Arc<dyn Group>) {
        self.groups.push(group);
    }

    fn into_groups(self: Box<Self>) -> Vec<Arc<dyn Group>> {
        self.groups
    }
}

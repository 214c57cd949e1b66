//! Player-formed groups
//!
//! A group is the unit a player queues with. Groups are created and owned by
//! the party layer; the matcher only reads them, flips their state and
//! notifies them when matching is cancelled.

use crate::error::{MatchmakingError, Result};
use crate::rating::{MmrSummary, RatedPlayer, SquadRules};
use crate::types::{CancelNotice, CancelReason, GroupId, GroupState, GroupType, UnixSeconds};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

/// Capabilities the matcher needs from a queued group
pub trait Group: Send + Sync + fmt::Debug {
    /// Get group ID
    fn id(&self) -> &GroupId;

    /// Members in party order
    fn players(&self) -> &[RatedPlayer];

    /// Get lifecycle state
    fn state(&self) -> GroupState;

    /// Set lifecycle state
    fn set_state(&self, state: GroupState);

    /// When the group started waiting for a match
    fn start_match_time_sec(&self) -> UnixSeconds;

    /// Overwrite the wait start
    fn set_start_match_time_sec(&self, at: UnixSeconds);

    /// Whether the group may be matched against bots at `now`
    fn can_fill_bots(&self, now: UnixSeconds) -> bool;

    /// Whether the group counts as newcomers
    fn is_newcomer(&self) -> bool;

    /// Pull the group out of matchmaking and tell the party layer why
    fn force_cancel_match(&self, reason: CancelReason, waited_sec: i64);

    fn player_count(&self) -> usize {
        self.players().len()
    }

    /// Rating metrics over the members
    fn mmr_summary(&self) -> MmrSummary {
        MmrSummary::from_players(self.players())
    }

    fn average_mmr(&self) -> f64 {
        self.mmr_summary().average
    }

    fn biggest_mmr(&self) -> f64 {
        self.mmr_summary().biggest
    }

    fn variance(&self) -> f64 {
        self.mmr_summary().variance
    }

    /// Classification under the given rules
    fn group_type(&self, rules: &SquadRules) -> GroupType {
        self.mmr_summary().classify(rules)
    }

    /// MMR used for matching under the given rules
    fn effective_mmr(&self, rules: &SquadRules) -> f64 {
        let summary = self.mmr_summary();
        summary.effective_mmr(summary.classify(rules))
    }

    /// Average star of the members
    fn star(&self) -> f64 {
        let players = self.players();
        if players.is_empty() {
            return 0.0;
        }
        players.iter().map(|p| p.star as f64).sum::<f64>() / players.len() as f64
    }

    fn wait_seconds(&self, now: UnixSeconds) -> i64 {
        now - self.start_match_time_sec()
    }

    fn has_bot(&self) -> bool {
        self.players().iter().any(|p| p.is_bot)
    }

    /// Whether this is a premade party rather than a solo queuer
    fn is_premade(&self) -> bool {
        self.player_count() > 1
    }
}

/// Group implementation used by the party layer
#[derive(Debug)]
pub struct PartyGroup {
    id: GroupId,
    players: Vec<RatedPlayer>,
    state: RwLock<GroupState>,
    start_match_time: AtomicI64,
    newcomer: bool,
    bot_fill_grace_sec: Option<i64>,
    cancellations: Mutex<Vec<CancelNotice>>,
    notifier: Option<mpsc::UnboundedSender<CancelNotice>>,
}

impl PartyGroup {
    /// Create a group that is ready to be handed to a matcher.
    ///
    /// The wait start is the earliest member's.
    pub fn new(id: impl Into<GroupId>, players: Vec<RatedPlayer>) -> Result<Self> {
        let id = id.into();
        let start = players
            .iter()
            .map(|p| p.wait_start)
            .min()
            .ok_or_else(|| MatchmakingError::InvalidGroup {
                group_id: id.clone(),
                reason: "group has no players".to_string(),
            })?;

        Ok(Self {
            id,
            players,
            state: RwLock::new(GroupState::Queuing),
            start_match_time: AtomicI64::new(start),
            newcomer: false,
            bot_fill_grace_sec: None,
            cancellations: Mutex::new(Vec::new()),
            notifier: None,
        })
    }

    /// Mark the group as newcomers
    pub fn newcomer(mut self, newcomer: bool) -> Self {
        self.newcomer = newcomer;
        self
    }

    /// Allow bot-filled rooms once the group has waited `grace_sec`
    pub fn bot_fill_after(mut self, grace_sec: i64) -> Self {
        self.bot_fill_grace_sec = Some(grace_sec);
        self
    }

    /// Forward cancellation notices to the party layer
    pub fn with_notifier(mut self, notifier: mpsc::UnboundedSender<CancelNotice>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Every cancellation this group has received
    pub fn cancellations(&self) -> Vec<CancelNotice> {
        self.cancellations
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }
}

impl Group for PartyGroup {
    fn id(&self) -> &GroupId {
        &self.id
    }

    fn players(&self) -> &[RatedPlayer] {
        &self.players
    }

    fn state(&self) -> GroupState {
        *self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: GroupState) {
        *self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    fn start_match_time_sec(&self) -> UnixSeconds {
        self.start_match_time.load(Ordering::SeqCst)
    }

    fn set_start_match_time_sec(&self, at: UnixSeconds) {
        self.start_match_time.store(at, Ordering::SeqCst);
    }

    fn can_fill_bots(&self, now: UnixSeconds) -> bool {
        self.bot_fill_grace_sec
            .map_or(false, |grace| self.wait_seconds(now) >= grace)
    }

    fn is_newcomer(&self) -> bool {
        self.newcomer
    }

    fn force_cancel_match(&self, reason: CancelReason, waited_sec: i64) {
        self.set_state(GroupState::Unready);

        let notice = CancelNotice {
            group_id: self.id.clone(),
            reason,
            waited_sec,
        };

        if let Ok(mut notices) = self.cancellations.lock() {
            notices.push(notice.clone());
        }

        if let Some(notifier) = &self.notifier {
            if notifier.send(notice).is_err() {
                debug!("Cancel notice for group {} dropped: party layer gone", self.id);
            }
        }
    }
}

//! A single matching pool
//!
//! A queue owns the groups waiting in it. The matcher takes a snapshot each
//! cycle, runs the assembly pass over it outside the lock and re-submits what
//! is left.

use crate::config::{load_validated, ConfigProvider, MatchingConfig};
use crate::error::{MatchmakingError, Result};
use crate::queue::assembly::{assemble, AssemblyOutcome};
use crate::queue::matching::MatchContext;
use crate::squad::{EntityFactory, Group, StandardFactory};
use crate::types::{CancelReason, GroupId, GroupState, MatchDomain, QueueKind, UnixSeconds};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

/// Groups taken out of a queue for one cycle
#[derive(Debug, Default)]
pub struct QueueSnapshot {
    /// Still queuing and within the timeout
    pub candidates: Vec<Arc<dyn Group>>,
    /// Cancelled with "match timeout", paired with how long they waited
    pub expired: Vec<(Arc<dyn Group>, i64)>,
    /// No longer queuing; dropped without notification
    pub abandoned: usize,
}

/// Snapshot plus pass result, for callers that drive a queue on their own
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub assembly: AssemblyOutcome,
    pub expired: Vec<(Arc<dyn Group>, i64)>,
}

#[derive(Debug, Default)]
struct QueueState {
    groups: BTreeMap<GroupId, Arc<dyn Group>>,
    closed: bool,
}

/// One of the two pools a matcher owns
pub struct MatchQueue {
    kind: QueueKind,
    domain: MatchDomain,
    state: Mutex<QueueState>,
    config: RwLock<MatchingConfig>,
    factory: Arc<dyn EntityFactory>,
}

impl std::fmt::Debug for MatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchQueue")
            .field("kind", &self.kind)
            .field("domain", &self.domain)
            .finish()
    }
}

impl MatchQueue {
    /// Create a queue, loading its configuration from `provider`
    pub fn new(kind: QueueKind, domain: MatchDomain, provider: &dyn ConfigProvider) -> Result<Self> {
        Self::with_factory(kind, domain, provider, Arc::new(StandardFactory))
    }

    /// Create a queue that builds teams and rooms through `factory`
    pub fn with_factory(
        kind: QueueKind,
        domain: MatchDomain,
        provider: &dyn ConfigProvider,
        factory: Arc<dyn EntityFactory>,
    ) -> Result<Self> {
        let config = load_validated(provider)?;
        Ok(Self {
            kind,
            domain,
            state: Mutex::new(QueueState::default()),
            config: RwLock::new(config),
            factory,
        })
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn domain(&self) -> &MatchDomain {
        &self.domain
    }

    /// Current configuration snapshot
    pub fn config(&self) -> Result<MatchingConfig> {
        let config = self
            .config
            .read()
            .map_err(|_| MatchmakingError::internal("Failed to acquire queue config lock"))?;
        Ok(config.clone())
    }

    /// Replace the configuration used by later passes
    pub fn apply_config(&self, config: MatchingConfig) -> Result<()> {
        let mut current = self
            .config
            .write()
            .map_err(|_| MatchmakingError::internal("Failed to acquire queue config lock"))?;
        *current = config;
        Ok(())
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| MatchmakingError::internal(format!("{} queue lock poisoned", self.kind)).into())
    }

    /// Add groups to the pool.
    ///
    /// Groups without a wait start are stamped with `now`. Re-adding a group
    /// that is already waiting replaces it.
    pub fn add_groups(&self, groups: Vec<Arc<dyn Group>>, now: UnixSeconds) -> Result<()> {
        let mut state = self.lock_state()?;
        if state.closed {
            return Err(MatchmakingError::QueueClosed {
                queue: self.kind.to_string(),
            }
            .into());
        }

        let count = groups.len();
        for group in groups {
            if group.start_match_time_sec() <= 0 {
                group.set_start_match_time_sec(now);
            }
            state.groups.insert(group.id().clone(), group);
        }

        debug!(
            "Added {} groups to {} queue ({}), {} waiting",
            count,
            self.kind,
            self.domain,
            state.groups.len()
        );
        Ok(())
    }

    /// Take every group out of the pool.
    ///
    /// Groups that waited longer than the timeout are set `Unready` and told
    /// "match timeout"; groups the party layer already pulled out are dropped.
    pub fn get_and_clear_groups(&self, now: UnixSeconds) -> Result<QueueSnapshot> {
        let timeout = self.config()?.match_timeout_sec;
        let drained = std::mem::take(&mut self.lock_state()?.groups);

        let mut snapshot = QueueSnapshot::default();
        for group in drained.into_values() {
            if group.state() != GroupState::Queuing {
                snapshot.abandoned += 1;
                continue;
            }

            let waited = group.wait_seconds(now);
            if waited > timeout {
                group.force_cancel_match(CancelReason::MatchTimeout, waited);
                snapshot.expired.push((group, waited));
            } else {
                snapshot.candidates.push(group);
            }
        }

        if !snapshot.expired.is_empty() {
            info!(
                "{} groups timed out in {} queue ({})",
                snapshot.expired.len(),
                self.kind,
                self.domain
            );
        }

        Ok(snapshot)
    }

    /// Run the assembly pass over `candidates` with the current configuration
    pub fn assemble(&self, candidates: Vec<Arc<dyn Group>>, now: UnixSeconds) -> Result<AssemblyOutcome> {
        let ctx = MatchContext::new(&self.config()?, now);
        Ok(assemble(candidates, &ctx, self.factory.as_ref()))
    }

    /// Snapshot the pool and run one pass; leftovers are returned, not re-added
    pub fn match_groups(&self, now: UnixSeconds) -> Result<CycleOutcome> {
        let snapshot = self.get_and_clear_groups(now)?;
        let assembly = self.assemble(snapshot.candidates, now)?;
        Ok(CycleOutcome {
            assembly,
            expired: snapshot.expired,
        })
    }

    /// Close the pool and cancel every group still waiting in it
    pub fn drain(&self, reason: CancelReason, now: UnixSeconds) -> Result<Vec<Arc<dyn Group>>> {
        let drained = {
            let mut state = self.lock_state()?;
            state.closed = true;
            std::mem::take(&mut state.groups)
        };

        let cancelled: Vec<Arc<dyn Group>> = drained
            .into_values()
            .filter(|g| g.state() == GroupState::Queuing)
            .collect();
        for group in &cancelled {
            group.force_cancel_match(reason, group.wait_seconds(now));
        }

        info!(
            "Drained {} queue ({}): {} groups cancelled with \"{}\"",
            self.kind,
            self.domain,
            cancelled.len(),
            reason
        );
        Ok(cancelled)
    }

    /// Refuse further submissions
    pub fn close(&self) -> Result<()> {
        self.lock_state()?.closed = true;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().map(|s| s.closed).unwrap_or(true)
    }

    pub fn len(&self) -> usize {
        self.lock_state().map(|s| s.groups.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, group_id: &str) -> bool {
        self.lock_state()
            .map(|s| s.groups.contains_key(group_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::provider::MockConfigProvider;
    use crate::config::StaticConfigProvider;
    use crate::error::is_queue_closed;
    use crate::rating::RatedPlayer;
    use crate::squad::PartyGroup;

    fn queue() -> MatchQueue {
        MatchQueue::new(
            QueueKind::Normal,
            MatchDomain::new("ranked", "1"),
            &StaticConfigProvider::default(),
        )
        .unwrap()
    }

    fn shared(group: &Arc<PartyGroup>) -> Arc<dyn Group> {
        group.clone()
    }

    fn solo(id: &str, wait_start: i64) -> Arc<PartyGroup> {
        Arc::new(
            PartyGroup::new(id, vec![RatedPlayer::with_mmr(format!("{}-p", id), 1000.0, wait_start)])
                .unwrap(),
        )
    }

    #[test]
    fn test_construction_rejects_bad_config() {
        let mut provider = MockConfigProvider::new();
        provider.expect_matching_config().returning(|| {
            let mut config = MatchingConfig::default();
            config.room_side_count = 0;
            Ok(config)
        });

        let err = MatchQueue::new(QueueKind::Team, MatchDomain::new("ranked", "1"), &provider)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_add_stamps_missing_start() {
        let queue = queue();
        let group = solo("g1", 0);
        queue.add_groups(vec![shared(&group)], 500).unwrap();

        assert_eq!(group.start_match_time_sec(), 500);
        assert_eq!(queue.len(), 1);
        assert!(queue.contains("g1"));
    }

    #[test]
    fn test_timeout_fires_once() {
        let queue = queue();
        let group = solo("late", 100);
        queue.add_groups(vec![shared(&group)], 100).unwrap();

        let snapshot = queue.get_and_clear_groups(401).unwrap();
        assert_eq!(snapshot.expired.len(), 1);
        assert_eq!(snapshot.expired[0].1, 301);
        assert!(snapshot.candidates.is_empty());
        assert_eq!(group.state(), GroupState::Unready);

        let again = queue.get_and_clear_groups(500).unwrap();
        assert!(again.expired.is_empty());
        assert_eq!(group.cancellations().len(), 1);
        assert_eq!(group.cancellations()[0].reason, CancelReason::MatchTimeout);
    }

    #[test]
    fn test_at_timeout_still_matches() {
        let queue = queue();
        queue.add_groups(vec![shared(&solo("edge", 100))], 100).unwrap();
        let snapshot = queue.get_and_clear_groups(400).unwrap();
        assert_eq!(snapshot.candidates.len(), 1);
    }

    #[test]
    fn test_cancelled_groups_are_dropped_silently() {
        let queue = queue();
        let group = solo("gone", 100);
        queue.add_groups(vec![shared(&group)], 100).unwrap();
        group.set_state(GroupState::Unready);

        let snapshot = queue.get_and_clear_groups(110).unwrap();
        assert_eq!(snapshot.abandoned, 1);
        assert!(snapshot.candidates.is_empty());
        assert!(group.cancellations().is_empty());
    }

    #[test]
    fn test_match_groups_returns_leftovers() {
        let queue = queue();
        let groups: Vec<Arc<dyn Group>> = (0..3)
            .map(|i| shared(&solo(&format!("s{}", i), 100)))
            .collect();
        queue.add_groups(groups, 100).unwrap();

        let outcome = queue.match_groups(105).unwrap();
        assert!(outcome.assembly.rooms.is_empty());
        assert_eq!(outcome.assembly.leftovers.len(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_closes_and_cancels() {
        let queue = queue();
        let group = solo("g1", 100);
        queue.add_groups(vec![shared(&group)], 100).unwrap();

        let cancelled = queue.drain(CancelReason::ServerStopping, 130).unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(group.state(), GroupState::Unready);
        let notices = group.cancellations();
        assert_eq!(notices[0].reason.as_str(), "server stopping");
        assert_eq!(notices[0].waited_sec, 30);

        assert!(queue.is_closed());
        let err = queue.add_groups(vec![shared(&solo("g2", 0))], 140).unwrap_err();
        assert!(is_queue_closed(&err));
    }
}

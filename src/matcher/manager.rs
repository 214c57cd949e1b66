//! Dual-queue matcher for one matching domain
//!
//! The matcher owns a team queue for full premade squads and a normal queue
//! for everyone else. Each cycle it snapshots both queues, runs the two
//! assembly passes on blocking tasks, publishes completed rooms without
//! waiting for the consumer, and re-submits what is left. Squads that waited
//! out their team-queue budget are moved to the normal queue for good.

use crate::config::{load_validated, ConfigProvider, MatchingConfig};
use crate::error::{is_queue_closed, CycleError, MatchmakingError, Result};
use crate::matcher::sink::RoomSink;
use crate::metrics::{MetricsCollector, MetricsTimer};
use crate::queue::{AssemblyOutcome, MatchQueue, QueueSnapshot};
use crate::squad::{EntityFactory, Group, Room, StandardFactory};
use crate::types::{CancelReason, GroupId, GroupState, MatchDomain, QueueKind, UnixSeconds};
use crate::utils::{Clock, SystemClock};
use crate::wait_time::{
    InMemoryStatisticsTracker, StatisticsTracker, StatsKey, WaitOutcome, WaitTimeStats,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Statistics about matcher operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatcherStats {
    /// Matching cycles run
    pub cycles: u64,
    /// Groups accepted by `add_groups`
    pub groups_queued: u64,
    /// Completed rooms, bot rooms included
    pub rooms_created: u64,
    /// Completed rooms with bot-filled sides
    pub bot_rooms_created: u64,
    /// Groups seated in completed rooms
    pub groups_matched: u64,
    /// Human players seated in completed rooms
    pub players_matched: u64,
    /// Groups cancelled with "match timeout"
    pub timeouts: u64,
    /// Squads moved from the team queue to the normal queue
    pub migrations: u64,
    /// Assembly passes that panicked and were recovered
    pub cycle_panics: u64,
    /// Groups currently waiting in the team queue
    pub team_queue_size: usize,
    /// Groups currently waiting in the normal queue
    pub normal_queue_size: usize,
    /// Duration of the last cycle
    pub last_cycle_ms: u64,
}

/// What a single cycle did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub rooms: usize,
    pub bot_rooms: usize,
    pub timed_out: usize,
    pub migrated: usize,
    pub panics: usize,
    pub team_waiting: usize,
    pub normal_waiting: usize,
    pub duration_ms: u64,
}

/// Optional collaborators of a matcher
pub struct MatcherOptions {
    pub clock: Arc<dyn Clock>,
    pub factory: Arc<dyn EntityFactory>,
    pub metrics: Option<Arc<MetricsCollector>>,
    pub error_buffer_size: usize,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            factory: Arc::new(StandardFactory),
            metrics: None,
            error_buffer_size: 64,
        }
    }
}

type PassResult = std::result::Result<Result<AssemblyOutcome>, JoinError>;

/// The dual-queue matcher
pub struct Matcher {
    domain: MatchDomain,
    team_queue: Arc<MatchQueue>,
    normal_queue: Arc<MatchQueue>,
    provider: Arc<dyn ConfigProvider>,
    config: RwLock<MatchingConfig>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn RoomSink>,
    metrics: Option<Arc<MetricsCollector>>,
    /// Squads that left the team queue; they never go back
    migrated: Mutex<HashSet<GroupId>>,
    stats: RwLock<MatcherStats>,
    wait_stats: InMemoryStatisticsTracker,
    error_tx: mpsc::Sender<CycleError>,
    error_rx: Mutex<Option<mpsc::Receiver<CycleError>>>,
    cycle_counter: AtomicU64,
    /// Held for the whole of a cycle and of shutdown
    cycle_lock: tokio::sync::Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Matcher {
    /// Create a matcher with the system clock and standard factory
    pub fn new(
        domain: MatchDomain,
        provider: Arc<dyn ConfigProvider>,
        sink: Arc<dyn RoomSink>,
    ) -> Result<Self> {
        Self::with_options(domain, provider, sink, MatcherOptions::default())
    }

    /// Create a matcher with custom collaborators
    pub fn with_options(
        domain: MatchDomain,
        provider: Arc<dyn ConfigProvider>,
        sink: Arc<dyn RoomSink>,
        options: MatcherOptions,
    ) -> Result<Self> {
        let config = load_validated(provider.as_ref())?;

        let team_queue = Arc::new(MatchQueue::with_factory(
            QueueKind::Team,
            domain.clone(),
            provider.as_ref(),
            Arc::clone(&options.factory),
        )?);
        let normal_queue = Arc::new(MatchQueue::with_factory(
            QueueKind::Normal,
            domain.clone(),
            provider.as_ref(),
            Arc::clone(&options.factory),
        )?);
        // Both queues must start from the same configuration as the matcher
        team_queue.apply_config(config.clone())?;
        normal_queue.apply_config(config.clone())?;

        let (error_tx, error_rx) = mpsc::channel(options.error_buffer_size.max(1));
        let (shutdown_tx, _) = watch::channel(false);

        info!(
            "Created matcher for {} (squad size {}, {} sides)",
            domain, config.squad_player_limit, config.room_side_count
        );

        Ok(Self {
            domain,
            team_queue,
            normal_queue,
            provider,
            config: RwLock::new(config),
            clock: options.clock,
            sink,
            metrics: options.metrics,
            migrated: Mutex::new(HashSet::new()),
            stats: RwLock::new(MatcherStats::default()),
            wait_stats: InMemoryStatisticsTracker::new(),
            error_tx,
            error_rx: Mutex::new(Some(error_rx)),
            cycle_counter: AtomicU64::new(0),
            cycle_lock: tokio::sync::Mutex::new(()),
            shutdown_tx,
            loop_handle: Mutex::new(None),
        })
    }

    pub fn domain(&self) -> &MatchDomain {
        &self.domain
    }

    pub fn team_queue(&self) -> &Arc<MatchQueue> {
        &self.team_queue
    }

    pub fn normal_queue(&self) -> &Arc<MatchQueue> {
        &self.normal_queue
    }

    /// Configuration in effect
    pub fn config(&self) -> Result<MatchingConfig> {
        let config = self
            .config
            .read()
            .map_err(|_| MatchmakingError::internal("Failed to acquire config lock"))?;
        Ok(config.clone())
    }

    /// Whether the matcher has been stopped
    pub fn is_closed(&self) -> bool {
        self.normal_queue.is_closed()
    }

    /// Whether a squad has been moved out of the team queue
    pub fn is_migrated(&self, group_id: &str) -> bool {
        self.migrated
            .lock()
            .map(|migrated| migrated.contains(group_id))
            .unwrap_or(false)
    }

    /// Receiver for recovered cycle failures; can be taken once
    pub fn take_error_receiver(&self) -> Option<mpsc::Receiver<CycleError>> {
        self.error_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    /// Submit groups for matching.
    ///
    /// Plain groups and squads that were migrated earlier go to the normal
    /// queue; full squads go to the team queue. The batch is rejected as a
    /// whole if any group is empty or larger than the squad size.
    pub fn add_groups(&self, groups: Vec<Arc<dyn Group>>) -> Result<()> {
        if self.is_closed() {
            return Err(MatchmakingError::QueueClosed {
                queue: self.domain.to_string(),
            }
            .into());
        }

        let config = self.config()?;
        let rules = config.squad_rules();
        if let Some(bad) = groups
            .iter()
            .find(|g| g.player_count() == 0 || g.player_count() > rules.squad_size)
        {
            return Err(MatchmakingError::InvalidGroup {
                group_id: bad.id().clone(),
                reason: format!(
                    "{} players does not fit a squad of {}",
                    bad.player_count(),
                    rules.squad_size
                ),
            }
            .into());
        }

        let count = groups.len();
        let (to_team, to_normal): (Vec<_>, Vec<_>) = {
            let migrated = self
                .migrated
                .lock()
                .map_err(|_| MatchmakingError::internal("Failed to acquire migrated set lock"))?;
            groups
                .into_iter()
                .partition(|g| g.group_type(&rules).is_squad() && !migrated.contains(g.id()))
        };

        let now = self.clock.now_secs();
        let (team_count, normal_count) = (to_team.len(), to_normal.len());
        if !to_team.is_empty() {
            self.team_queue.add_groups(to_team, now)?;
        }
        if !to_normal.is_empty() {
            self.normal_queue.add_groups(to_normal, now)?;
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_groups_queued(QueueKind::Team, team_count);
            metrics.record_groups_queued(QueueKind::Normal, normal_count);
        }
        self.update_stats(|stats| stats.groups_queued += count as u64)?;

        debug!(
            "Routed {} groups for {}: {} to team queue, {} to normal queue",
            count, self.domain, team_count, normal_count
        );
        Ok(())
    }

    /// Run one matching cycle
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _cycle_guard = self.cycle_lock.lock().await;
        if self.is_closed() {
            return Err(MatchmakingError::QueueClosed {
                queue: self.domain.to_string(),
            }
            .into());
        }

        let timer = self
            .metrics
            .as_ref()
            .map_or_else(MetricsTimer::start, |metrics| metrics.start_timer());
        let cycle = self.cycle_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.maybe_refresh_config(cycle)?;
        let config = self.config()?;
        let now = self.clock.now_secs();

        let mut report = CycleReport {
            cycle,
            ..CycleReport::default()
        };

        let QueueSnapshot {
            candidates: team_candidates,
            expired: team_expired,
            ..
        } = self.team_queue.get_and_clear_groups(now)?;
        let QueueSnapshot {
            candidates: normal_candidates,
            expired: normal_expired,
            ..
        } = self.normal_queue.get_and_clear_groups(now)?;

        report.timed_out = self.record_timeouts(QueueKind::Team, &team_expired)
            + self.record_timeouts(QueueKind::Normal, &normal_expired);

        let team_backup = team_candidates.clone();
        let normal_backup = normal_candidates.clone();
        let team_queue = Arc::clone(&self.team_queue);
        let normal_queue = Arc::clone(&self.normal_queue);

        let (team_result, normal_result) = tokio::join!(
            tokio::task::spawn_blocking(move || team_queue.assemble(team_candidates, now)),
            tokio::task::spawn_blocking(move || normal_queue.assemble(normal_candidates, now)),
        );

        let team_outcome = self.settle_pass(QueueKind::Team, cycle, team_result, team_backup, &mut report);
        let normal_outcome =
            self.settle_pass(QueueKind::Normal, cycle, normal_result, normal_backup, &mut report);

        report.bot_rooms = team_outcome.bot_rooms + normal_outcome.bot_rooms;
        report.rooms = team_outcome.rooms.len() + normal_outcome.rooms.len();
        self.publish_rooms(QueueKind::Team, team_outcome.rooms, now);
        self.publish_rooms(QueueKind::Normal, normal_outcome.rooms, now);

        report.migrated = self.resubmit(team_outcome.leftovers, normal_outcome.leftovers, now, &config)?;
        report.team_waiting = self.team_queue.len();
        report.normal_waiting = self.normal_queue.len();
        report.duration_ms = timer.elapsed().as_millis() as u64;

        self.update_stats(|stats| {
            stats.cycles += 1;
            stats.rooms_created += report.rooms as u64;
            stats.bot_rooms_created += report.bot_rooms as u64;
            stats.timeouts += report.timed_out as u64;
            stats.migrations += report.migrated as u64;
            stats.cycle_panics += report.panics as u64;
            stats.team_queue_size = report.team_waiting;
            stats.normal_queue_size = report.normal_waiting;
            stats.last_cycle_ms = report.duration_ms;
        })?;

        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(timer.stop());
            metrics.record_migrations(report.migrated);
            metrics.update_from_matcher_stats(&self.get_stats()?);
        }

        if report.rooms > 0 || report.timed_out > 0 || report.migrated > 0 {
            info!(
                "Cycle {} for {}: {} rooms ({} with bots), {} timed out, {} migrated, {}/{} waiting in {}ms",
                cycle,
                self.domain,
                report.rooms,
                report.bot_rooms,
                report.timed_out,
                report.migrated,
                report.team_waiting,
                report.normal_waiting,
                report.duration_ms
            );
        } else {
            debug!(
                "Cycle {} for {}: nothing matched, {}/{} waiting in {}ms",
                cycle, self.domain, report.team_waiting, report.normal_waiting, report.duration_ms
            );
        }

        Ok(report)
    }

    /// Start the periodic matching loop
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut slot = self
            .loop_handle
            .lock()
            .map_err(|_| MatchmakingError::internal("Failed to acquire loop handle lock"))?;
        if slot.is_some() {
            return Err(MatchmakingError::internal("Matcher already started").into());
        }
        if self.is_closed() {
            return Err(MatchmakingError::QueueClosed {
                queue: self.domain.to_string(),
            }
            .into());
        }

        let tick = self.config()?.tick_interval();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let matcher = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            matcher.run_loop(tick, shutdown_rx).await;
        }));

        info!("Started matching loop for {} every {}ms", self.domain, tick.as_millis());
        Ok(())
    }

    async fn run_loop(self: Arc<Self>, mut tick: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        if is_queue_closed(&e) {
                            break;
                        }
                        error!("Matching cycle for {} failed: {}", self.domain, e);
                        self.report_error(CycleError::CycleFailed {
                            cycle: self.cycle_counter.load(Ordering::SeqCst),
                            message: e.to_string(),
                        });
                    }

                    let configured = self.config().map(|c| c.tick_interval()).unwrap_or(tick);
                    if configured != tick {
                        info!("Matching tick for {} changed to {}ms", self.domain, configured.as_millis());
                        tick = configured;
                        ticker = interval(tick);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }

        debug!("Matching loop for {} exited", self.domain);
    }

    /// Stop matching.
    ///
    /// Waits for the in-flight cycle, closes both queues and cancels every
    /// waiting group with "server stopping". Returns how many were cancelled.
    pub async fn stop(&self) -> Result<usize> {
        self.shutdown_tx.send_replace(true);

        let handle = self
            .loop_handle
            .lock()
            .map_err(|_| MatchmakingError::internal("Failed to acquire loop handle lock"))?
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Matching loop for {} ended abnormally: {}", self.domain, e);
            }
        }

        let _cycle_guard = self.cycle_lock.lock().await;
        let now = self.clock.now_secs();
        let cancelled = self.team_queue.drain(CancelReason::ServerStopping, now)?.len()
            + self.normal_queue.drain(CancelReason::ServerStopping, now)?.len();

        if let Ok(mut migrated) = self.migrated.lock() {
            migrated.clear();
        }
        self.update_stats(|stats| {
            stats.team_queue_size = 0;
            stats.normal_queue_size = 0;
        })?;

        info!("Matcher for {} stopped, {} waiting groups cancelled", self.domain, cancelled);
        Ok(cancelled)
    }

    /// Get current matcher statistics
    pub fn get_stats(&self) -> Result<MatcherStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::internal("Failed to acquire stats lock"))?;
        Ok(stats.clone())
    }

    /// Wait statistics per queue and outcome
    pub fn wait_stats(&self) -> Result<HashMap<StatsKey, WaitTimeStats>> {
        self.wait_stats.get_all_stats()
    }

    fn update_stats(&self, update: impl FnOnce(&mut MatcherStats)) -> Result<()> {
        let mut stats = self
            .stats
            .write()
            .map_err(|_| MatchmakingError::internal("Failed to acquire stats lock"))?;
        update(&mut stats);
        Ok(())
    }

    fn report_error(&self, err: CycleError) {
        if let Err(e) = self.error_tx.try_send(err) {
            warn!("Dropping cycle error for {}: {}", self.domain, e);
        }
    }

    /// Pull configuration every `config_refresh_cycles` cycles
    fn maybe_refresh_config(&self, cycle: u64) -> Result<()> {
        let every = self.config()?.config_refresh_cycles.max(1);
        if cycle % every != 0 {
            return Ok(());
        }

        match load_validated(self.provider.as_ref()) {
            Ok(config) => {
                self.team_queue.apply_config(config.clone())?;
                self.normal_queue.apply_config(config.clone())?;
                let mut current = self
                    .config
                    .write()
                    .map_err(|_| MatchmakingError::internal("Failed to acquire config lock"))?;
                if *current != config {
                    info!("Matching configuration for {} refreshed", self.domain);
                }
                *current = config;
            }
            Err(e) => {
                warn!(
                    "Keeping previous matching configuration for {}: {}",
                    self.domain, e
                );
            }
        }
        Ok(())
    }

    fn record_timeouts(&self, queue: QueueKind, expired: &[(Arc<dyn Group>, i64)]) -> usize {
        for (_, waited) in expired {
            if let Err(e) = self
                .wait_stats
                .record_wait_time(StatsKey::new(queue, WaitOutcome::TimedOut), *waited)
            {
                warn!("Failed to record wait time: {}", e);
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_timeouts(queue, expired.len());
        }
        expired.len()
    }

    /// Turn a finished blocking pass into an outcome, recovering panics
    fn settle_pass(
        &self,
        queue: QueueKind,
        cycle: u64,
        result: PassResult,
        snapshot: Vec<Arc<dyn Group>>,
        report: &mut CycleReport,
    ) -> AssemblyOutcome {
        let failure = match result {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(e)) => CycleError::CycleFailed {
                cycle,
                message: format!("{} queue: {}", queue, e),
            },
            Err(join_error) => {
                report.panics += 1;
                if let Some(metrics) = &self.metrics {
                    metrics.record_panic(queue);
                }
                CycleError::AssemblyPanicked {
                    queue: queue.to_string(),
                    cycle,
                    message: panic_message(join_error),
                }
            }
        };

        error!("{} for {}", failure, self.domain);
        self.report_error(failure);

        // Rooms are only marked when published, so the whole snapshot is still queuing
        AssemblyOutcome {
            leftovers: snapshot,
            ..AssemblyOutcome::default()
        }
    }

    /// Mark completed rooms' groups `Matched` and hand the rooms to the sink
    /// without waiting for it
    fn publish_rooms(&self, queue: QueueKind, rooms: Vec<Box<dyn Room>>, now: UnixSeconds) {
        for room in rooms {
            let groups = room.groups();
            let players = room.player_count();
            let bot_room = room.bot_sides() > 0;

            for group in &groups {
                group.set_state(GroupState::Matched);
                let waited = group.wait_seconds(now);
                if let Err(e) = self
                    .wait_stats
                    .record_wait_time(StatsKey::new(queue, WaitOutcome::Matched), waited)
                {
                    warn!("Failed to record wait time: {}", e);
                }
                if let Some(metrics) = &self.metrics {
                    metrics.record_match_wait(queue, waited);
                }
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_room(bot_room, players);
            }
            if let Err(e) = self.update_stats(|stats| {
                stats.groups_matched += groups.len() as u64;
                stats.players_matched += players as u64;
            }) {
                warn!("Failed to update matcher stats: {}", e);
            }

            debug!(
                "Room {} completed in {} queue: {} groups, {} players, {} bot sides",
                room.id(),
                queue,
                groups.len(),
                players,
                room.bot_sides()
            );

            let sink = Arc::clone(&self.sink);
            tokio::spawn(async move {
                let room_id = room.id();
                if let Err(e) = sink.publish(room).await {
                    error!("Failed to publish room {}: {}", room_id, e);
                }
            });
        }
    }

    /// Put leftovers back, moving squads that exhausted their team-queue budget
    fn resubmit(
        &self,
        team_leftovers: Vec<Arc<dyn Group>>,
        mut normal_leftovers: Vec<Arc<dyn Group>>,
        now: UnixSeconds,
        config: &MatchingConfig,
    ) -> Result<usize> {
        let budget = config.wait_budget();
        let rules = config.squad_rules();
        let mut stay = Vec::new();
        let mut moved = 0;

        {
            let mut migrated = self
                .migrated
                .lock()
                .map_err(|_| MatchmakingError::internal("Failed to acquire migrated set lock"))?;
            for group in team_leftovers {
                let group_type = group.group_type(&rules);
                let waited = group.wait_seconds(now);
                if budget.should_migrate(group_type, waited) {
                    debug!(
                        "Migrating {} squad {} to normal queue after {}s",
                        group_type,
                        group.id(),
                        waited
                    );
                    migrated.insert(group.id().clone());
                    normal_leftovers.push(group);
                    moved += 1;
                } else {
                    stay.push(group);
                }
            }
        }

        if !stay.is_empty() {
            self.team_queue.add_groups(stay, now)?;
        }
        if !normal_leftovers.is_empty() {
            self.normal_queue.add_groups(normal_leftovers, now)?;
        }

        // Forget squads that left the normal queue
        let mut migrated = self
            .migrated
            .lock()
            .map_err(|_| MatchmakingError::internal("Failed to acquire migrated set lock"))?;
        migrated.retain(|id| self.normal_queue.contains(id));

        Ok(moved)
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "assembly pass panicked".to_string()),
        Err(err) => err.to_string(),
    }
}

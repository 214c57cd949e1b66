//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the war-room matchmaking core
//! using Prometheus metrics.

use crate::matcher::MatcherStats;
use crate::types::QueueKind;
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking core
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Queue-related metrics
    queue_metrics: QueueMetrics,

    /// Room-related metrics
    room_metrics: RoomMetrics,

    /// Matching cycle metrics
    cycle_metrics: CycleMetrics,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Total groups submitted, by queue
    pub groups_queued_total: IntCounterVec,

    /// Groups currently waiting, by queue
    pub groups_waiting: IntGaugeVec,

    /// Groups cancelled with "match timeout", by queue
    pub timeouts_total: IntCounterVec,

    /// Premade squads moved from the team queue to the normal queue
    pub migrations_total: IntCounter,

    /// Wait before a group was matched, by queue
    pub match_wait_seconds: HistogramVec,
}

/// Room-related metrics
#[derive(Clone)]
pub struct RoomMetrics {
    /// Completed rooms, by kind (human or bot)
    pub rooms_created_total: IntCounterVec,

    /// Human players seated in completed rooms
    pub players_matched_total: IntCounter,
}

/// Matching cycle metrics
#[derive(Clone)]
pub struct CycleMetrics {
    /// Cycles run
    pub cycles_total: IntCounter,

    /// Wall time of a full cycle
    pub cycle_duration_seconds: Histogram,

    /// Assembly passes that panicked, by queue
    pub cycle_panics_total: IntCounterVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let queue_metrics = QueueMetrics::new(&registry)?;
        let room_metrics = RoomMetrics::new(&registry)?;
        let cycle_metrics = CycleMetrics::new(&registry)?;

        Ok(Self {
            registry,
            queue_metrics,
            room_metrics,
            cycle_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn room(&self) -> &RoomMetrics {
        &self.room_metrics
    }

    pub fn cycle(&self) -> &CycleMetrics {
        &self.cycle_metrics
    }

    /// Record groups submitted to a queue
    pub fn record_groups_queued(&self, queue: QueueKind, count: usize) {
        self.queue_metrics
            .groups_queued_total
            .with_label_values(&[queue.as_str()])
            .inc_by(count as u64);
    }

    /// Record a completed room
    pub fn record_room(&self, bot_room: bool, players: usize) {
        let kind = if bot_room { "bot" } else { "human" };
        self.room_metrics
            .rooms_created_total
            .with_label_values(&[kind])
            .inc();
        self.room_metrics.players_matched_total.inc_by(players as u64);
    }

    /// Record how long a matched group waited
    pub fn record_match_wait(&self, queue: QueueKind, waited_sec: i64) {
        self.queue_metrics
            .match_wait_seconds
            .with_label_values(&[queue.as_str()])
            .observe(waited_sec.max(0) as f64);
    }

    pub fn record_timeouts(&self, queue: QueueKind, count: usize) {
        self.queue_metrics
            .timeouts_total
            .with_label_values(&[queue.as_str()])
            .inc_by(count as u64);
    }

    pub fn record_migrations(&self, count: usize) {
        self.queue_metrics.migrations_total.inc_by(count as u64);
    }

    pub fn record_panic(&self, queue: QueueKind) {
        self.cycle_metrics
            .cycle_panics_total
            .with_label_values(&[queue.as_str()])
            .inc();
    }

    /// Record a finished cycle
    pub fn record_cycle(&self, duration: Duration) {
        self.cycle_metrics.cycles_total.inc();
        self.cycle_metrics
            .cycle_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Update gauges from matcher stats
    pub fn update_from_matcher_stats(&self, stats: &MatcherStats) {
        self.queue_metrics
            .groups_waiting
            .with_label_values(&[QueueKind::Team.as_str()])
            .set(stats.team_queue_size as i64);
        self.queue_metrics
            .groups_waiting
            .with_label_values(&[QueueKind::Normal.as_str()])
            .set(stats.normal_queue_size as i64);
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::start()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    /// Start timing now
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let groups_queued_total = IntCounterVec::new(
            Opts::new("war_room_groups_queued_total", "Total groups queued"),
            &["queue"],
        )?;
        registry.register(Box::new(groups_queued_total.clone()))?;

        let groups_waiting = IntGaugeVec::new(
            Opts::new("war_room_groups_waiting", "Groups currently waiting"),
            &["queue"],
        )?;
        registry.register(Box::new(groups_waiting.clone()))?;

        let timeouts_total = IntCounterVec::new(
            Opts::new("war_room_timeouts_total", "Groups cancelled by match timeout"),
            &["queue"],
        )?;
        registry.register(Box::new(timeouts_total.clone()))?;

        let migrations_total = IntCounter::new(
            "war_room_migrations_total",
            "Squads migrated from the team queue to the normal queue",
        )?;
        registry.register(Box::new(migrations_total.clone()))?;

        let match_wait_seconds = HistogramVec::new(
            HistogramOpts::new("war_room_match_wait_seconds", "Group wait before matching")
                .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 90.0, 120.0, 180.0, 300.0]),
            &["queue"],
        )?;
        registry.register(Box::new(match_wait_seconds.clone()))?;

        Ok(Self {
            groups_queued_total,
            groups_waiting,
            timeouts_total,
            migrations_total,
            match_wait_seconds,
        })
    }
}

impl RoomMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rooms_created_total = IntCounterVec::new(
            Opts::new("war_room_rooms_created_total", "Completed rooms"),
            &["kind"],
        )?;
        registry.register(Box::new(rooms_created_total.clone()))?;

        let players_matched_total = IntCounter::new(
            "war_room_players_matched_total",
            "Human players seated in completed rooms",
        )?;
        registry.register(Box::new(players_matched_total.clone()))?;

        Ok(Self {
            rooms_created_total,
            players_matched_total,
        })
    }
}

impl CycleMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let cycles_total = IntCounter::new("war_room_cycles_total", "Matching cycles run")?;
        registry.register(Box::new(cycles_total.clone()))?;

        let cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "war_room_cycle_duration_seconds",
                "Matching cycle duration",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        let cycle_panics_total = IntCounterVec::new(
            Opts::new("war_room_cycle_panics_total", "Assembly passes that panicked"),
            &["queue"],
        )?;
        registry.register(Box::new(cycle_panics_total.clone()))?;

        Ok(Self {
            cycles_total,
            cycle_duration_seconds,
            cycle_panics_total,
        })
    }
}

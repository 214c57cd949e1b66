//! Metrics and monitoring for the war-room matchmaking core
//!
//! This module provides Prometheus metrics for queues, rooms and matching
//! cycles, with text exposition for whatever surface scrapes them.

pub mod collector;

pub use collector::{CycleMetrics, MetricsCollector, MetricsTimer, QueueMetrics, RoomMetrics};

//! Utility functions for the matchmaking core

use crate::types::{RoomId, TeamId, UnixSeconds};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

/// Generate a new unique team ID
pub fn generate_team_id() -> TeamId {
    Uuid::new_v4()
}

/// Generate a new unique room ID
pub fn generate_room_id() -> RoomId {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Calculate the absolute difference between two ratings
pub fn rating_difference(rating1: f64, rating2: f64) -> f64 {
    (rating1 - rating2).abs()
}

/// Arithmetic mean, zero for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance, zero for an empty slice
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// Source of "now" for wait-time decisions.
///
/// Injected into queues and matchers so tests can drive time explicitly.
pub trait Clock: Send + Sync {
    /// Current time in unix seconds
    fn now_secs(&self) -> UnixSeconds;
}

/// Wall clock backed by chrono
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> UnixSeconds {
        current_timestamp().timestamp()
    }
}

/// Manually advanced clock for deterministic tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: UnixSeconds) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: UnixSeconds) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> UnixSeconds {
        self.now.load(Ordering::SeqCst)
    }
}

//! Statistical tracking for match wait times
//!
//! Records how long groups waited before they were matched or cancelled,
//! per queue, for monitoring and tuning of the fairness ladder.

use crate::types::QueueKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// How a wait ended
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitOutcome {
    Matched,
    TimedOut,
}

/// Statistics for a specific wait time category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitTimeStats {
    /// Number of samples collected
    pub sample_count: u64,
    /// Sum of all wait times (for calculating mean)
    pub sum_seconds: f64,
    /// Sum of squared wait times (for calculating variance)
    pub sum_squared_seconds: f64,
    /// Minimum wait time observed
    pub min_seconds: f64,
    /// Maximum wait time observed
    pub max_seconds: f64,
}

impl WaitTimeStats {
    /// Create new empty statistics
    pub fn new() -> Self {
        Self {
            sample_count: 0,
            sum_seconds: 0.0,
            sum_squared_seconds: 0.0,
            min_seconds: f64::INFINITY,
            max_seconds: 0.0,
        }
    }

    /// Add a new wait time sample
    pub fn add_sample(&mut self, wait_time: Duration) {
        let seconds = wait_time.as_secs_f64();

        self.sample_count += 1;
        self.sum_seconds += seconds;
        self.sum_squared_seconds += seconds * seconds;
        self.min_seconds = self.min_seconds.min(seconds);
        self.max_seconds = self.max_seconds.max(seconds);
    }

    /// Add a sample measured in whole seconds; negative waits count as zero
    pub fn add_seconds(&mut self, waited_sec: i64) {
        self.add_sample(Duration::from_secs(waited_sec.max(0) as u64));
    }

    /// Calculate the mean wait time
    pub fn mean(&self) -> Duration {
        if self.sample_count == 0 {
            return Duration::from_secs(0);
        }

        Duration::from_secs_f64(self.sum_seconds / self.sample_count as f64)
    }

    /// Calculate the standard deviation
    pub fn standard_deviation(&self) -> Duration {
        if self.sample_count <= 1 {
            return Duration::from_secs(0);
        }

        let mean_seconds = self.sum_seconds / self.sample_count as f64;
        let variance =
            (self.sum_squared_seconds / self.sample_count as f64) - (mean_seconds * mean_seconds);

        Duration::from_secs_f64(variance.max(0.0).sqrt())
    }

    /// Get minimum wait time
    pub fn min(&self) -> Duration {
        if self.min_seconds == f64::INFINITY {
            Duration::from_secs(0)
        } else {
            Duration::from_secs_f64(self.min_seconds)
        }
    }

    /// Get maximum wait time
    pub fn max(&self) -> Duration {
        Duration::from_secs_f64(self.max_seconds)
    }
}

impl Default for WaitTimeStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Key for identifying different wait time categories
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsKey {
    pub queue: QueueKind,
    pub outcome: WaitOutcome,
}

impl StatsKey {
    pub fn new(queue: QueueKind, outcome: WaitOutcome) -> Self {
        Self { queue, outcome }
    }
}

/// Trait for tracking wait time statistics
pub trait StatisticsTracker: Send + Sync {
    /// Record a wait time sample
    fn record_wait_time(&self, key: StatsKey, waited_sec: i64) -> crate::error::Result<()>;

    /// Get statistics for a specific category
    fn get_stats(&self, key: &StatsKey) -> crate::error::Result<Option<WaitTimeStats>>;

    /// Get all tracked statistics
    fn get_all_stats(&self) -> crate::error::Result<HashMap<StatsKey, WaitTimeStats>>;

    /// Clear all statistics
    fn clear_all_stats(&self) -> crate::error::Result<()>;
}

/// In-memory statistics tracker
#[derive(Debug, Default)]
pub struct InMemoryStatisticsTracker {
    stats: std::sync::RwLock<HashMap<StatsKey, WaitTimeStats>>,
}

impl InMemoryStatisticsTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatisticsTracker for InMemoryStatisticsTracker {
    fn record_wait_time(&self, key: StatsKey, waited_sec: i64) -> crate::error::Result<()> {
        let mut stats = self.stats.write().map_err(|_| {
            crate::error::MatchmakingError::internal("Failed to acquire statistics write lock")
        })?;

        stats.entry(key).or_default().add_seconds(waited_sec);
        Ok(())
    }

    fn get_stats(&self, key: &StatsKey) -> crate::error::Result<Option<WaitTimeStats>> {
        let stats = self.stats.read().map_err(|_| {
            crate::error::MatchmakingError::internal("Failed to acquire statistics read lock")
        })?;

        Ok(stats.get(key).cloned())
    }

    fn get_all_stats(&self) -> crate::error::Result<HashMap<StatsKey, WaitTimeStats>> {
        let stats = self.stats.read().map_err(|_| {
            crate::error::MatchmakingError::internal("Failed to acquire statistics read lock")
        })?;

        Ok(stats.clone())
    }

    fn clear_all_stats(&self) -> crate::error::Result<()> {
        let mut stats = self.stats.write().map_err(|_| {
            crate::error::MatchmakingError::internal("Failed to acquire statistics write lock")
        })?;

        stats.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_time_stats_empty() {
        let stats = WaitTimeStats::new();
        assert_eq!(stats.sample_count, 0);
        assert_eq!(stats.mean(), Duration::from_secs(0));
        assert_eq!(stats.standard_deviation(), Duration::from_secs(0));
        assert_eq!(stats.min(), Duration::from_secs(0));
    }

    #[test]
    fn test_wait_time_stats_multiple_samples() {
        let mut stats = WaitTimeStats::new();
        stats.add_seconds(30);
        stats.add_seconds(60);
        stats.add_seconds(90);

        assert_eq!(stats.sample_count, 3);
        assert_eq!(stats.mean(), Duration::from_secs(60));
        assert_eq!(stats.min(), Duration::from_secs(30));
        assert_eq!(stats.max(), Duration::from_secs(90));

        // Population standard deviation is ~24.49 seconds
        let std_dev = stats.standard_deviation();
        assert!(std_dev.as_secs() >= 24 && std_dev.as_secs() <= 25);
    }

    #[test]
    fn test_negative_wait_clamped() {
        let mut stats = WaitTimeStats::new();
        stats.add_seconds(-5);
        assert_eq!(stats.max(), Duration::from_secs(0));
    }

    #[test]
    fn test_in_memory_statistics_tracker() {
        let tracker = InMemoryStatisticsTracker::new();
        let matched = StatsKey::new(QueueKind::Team, WaitOutcome::Matched);
        let timed_out = StatsKey::new(QueueKind::Normal, WaitOutcome::TimedOut);

        assert!(tracker.get_stats(&matched).unwrap().is_none());

        tracker.record_wait_time(matched, 10).unwrap();
        tracker.record_wait_time(matched, 20).unwrap();
        tracker.record_wait_time(timed_out, 300).unwrap();

        let stats = tracker.get_stats(&matched).unwrap().unwrap();
        assert_eq!(stats.sample_count, 2);
        assert_eq!(stats.mean(), Duration::from_secs(15));
        assert_eq!(tracker.get_all_stats().unwrap().len(), 2);

        tracker.clear_all_stats().unwrap();
        assert!(tracker.get_all_stats().unwrap().is_empty());
    }
}

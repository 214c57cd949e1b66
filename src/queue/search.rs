//! Nearest-compatible candidate search
//!
//! Candidates are kept sorted by matching MMR. Small pools are scanned
//! linearly for the exact nearest compatible candidate; large pools only
//! probe a fixed window around the binary-search anchor, trading optimality
//! for bounded latency.

/// Pools smaller than this are scanned linearly
pub const LINEAR_SEARCH_THRESHOLD: usize = 1000;

/// Candidates probed on each side of the anchor in large pools
pub const BINARY_SEARCH_WINDOW: usize = 10;

/// Available candidates of one assembly stage, sorted by key.
///
/// Entries are candidate indices into the caller's own storage; the pool
/// never owns the candidates themselves.
#[derive(Debug, Clone, Default)]
pub struct SortedPool {
    entries: Vec<usize>,
    keys: Vec<f64>,
}

impl SortedPool {
    /// Build a pool from `(candidate, key)` pairs already in matching order
    pub fn from_sorted(items: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let (entries, keys) = items.into_iter().unzip();
        Self { entries, keys }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take a candidate out of the pool; returns false if it was not present
    pub fn remove(&mut self, candidate: usize, key: f64) -> bool {
        let start = self.keys.partition_point(|k| *k < key);
        let position = (start..self.entries.len())
            .take_while(|&i| self.keys[i] == key)
            .find(|&i| self.entries[i] == candidate);

        match position {
            Some(i) => {
                self.entries.remove(i);
                self.keys.remove(i);
                true
            }
            None => false,
        }
    }

    /// Nearest candidate to `target` that `accept` admits.
    ///
    /// Picks the strategy by pool size. Ties go to the lower key.
    pub fn nearest(&self, target: f64, accept: impl FnMut(usize) -> bool) -> Option<usize> {
        if self.len() < LINEAR_SEARCH_THRESHOLD {
            self.linear_nearest(target, accept)
        } else {
            self.windowed_nearest(target, BINARY_SEARCH_WINDOW, accept)
        }
    }

    /// Full scan, stopping once keys above the target are farther than the best match
    pub fn linear_nearest(
        &self,
        target: f64,
        mut accept: impl FnMut(usize) -> bool,
    ) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;

        for (i, key) in self.keys.iter().enumerate() {
            let distance = (key - target).abs();
            if let Some((_, best_distance)) = best {
                if distance >= best_distance {
                    if *key >= target {
                        break;
                    }
                    continue;
                }
            }
            if accept(self.entries[i]) {
                best = Some((i, distance));
            }
        }

        best.map(|(i, _)| self.entries[i])
    }

    /// Probe `window` entries on each side of the binary-search anchor
    pub fn windowed_nearest(
        &self,
        target: f64,
        window: usize,
        mut accept: impl FnMut(usize) -> bool,
    ) -> Option<usize> {
        if self.is_empty() {
            return None;
        }

        let anchor = self.keys.partition_point(|k| *k < target);
        let low = anchor.saturating_sub(window);
        let high = (anchor + window).min(self.len());

        let mut best: Option<(usize, f64)> = None;
        for i in low..high {
            let distance = (self.keys[i] - target).abs();
            if best.map_or(true, |(_, best_distance)| distance < best_distance)
                && accept(self.entries[i])
            {
                best = Some((i, distance));
            }
        }

        best.map(|(i, _)| self.entries[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(keys: &[f64]) -> SortedPool {
        SortedPool::from_sorted(keys.iter().copied().enumerate())
    }

    #[test]
    fn test_linear_finds_nearest() {
        let pool = pool(&[900.0, 1000.0, 1080.0, 1300.0]);
        assert_eq!(pool.linear_nearest(1050.0, |_| true), Some(2));
        assert_eq!(pool.linear_nearest(100.0, |_| true), Some(0));
        assert_eq!(pool.linear_nearest(5000.0, |_| true), Some(3));
    }

    #[test]
    fn test_linear_skips_incompatible() {
        let pool = pool(&[900.0, 1000.0, 1080.0, 1300.0]);
        assert_eq!(pool.linear_nearest(1050.0, |c| c != 2), Some(1));
        assert_eq!(pool.linear_nearest(1050.0, |c| c == 3), Some(3));
        assert_eq!(pool.linear_nearest(1050.0, |_| false), None);
    }

    #[test]
    fn test_linear_tie_prefers_lower_key() {
        let pool = pool(&[900.0, 1100.0]);
        assert_eq!(pool.linear_nearest(1000.0, |_| true), Some(0));
    }

    #[test]
    fn test_remove() {
        let mut pool = pool(&[1000.0, 1000.0, 1200.0]);
        assert!(pool.remove(1, 1000.0));
        assert!(!pool.remove(1, 1000.0));
        assert!(!pool.remove(2, 1000.0));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.linear_nearest(1000.0, |_| true), Some(0));
    }

    #[test]
    fn test_window_limits_probe() {
        let keys: Vec<f64> = (0..100).map(|i| i as f64 * 10.0).collect();
        let pool = pool(&keys);

        // Anchor at index 50; only 40..60 is probed
        assert_eq!(pool.windowed_nearest(500.0, 10, |_| true), Some(50));
        assert_eq!(pool.windowed_nearest(500.0, 10, |c| c < 45), Some(44));
        assert_eq!(pool.windowed_nearest(500.0, 10, |c| c < 30), None);
    }

    #[test]
    fn test_strategy_switch() {
        let keys: Vec<f64> = (0..LINEAR_SEARCH_THRESHOLD).map(|i| i as f64).collect();
        let pool = pool(&keys);

        // Large pools never reach far-away candidates
        assert_eq!(pool.nearest(500.0, |c| c == 0), None);
        assert_eq!(pool.linear_nearest(500.0, |c| c == 0), Some(0));
        assert_eq!(pool.nearest(500.3, |_| true), Some(500));
    }
}

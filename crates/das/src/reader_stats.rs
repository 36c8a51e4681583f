//! Per-reader latency and success statistics.

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Identifies a reader within one [`crate::ReaderAggregator`].
pub type ReaderId = usize;

/// Outcome of one retrieval attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderStat {
    pub latency: Duration,
    pub success: bool,
}

/// Bounded window of the most recent attempts against one reader.
#[derive(Debug, Clone, Default)]
pub struct ReaderStats {
    window: VecDeque<ReaderStat>,
    max_samples: usize,
}

impl ReaderStats {
    pub fn new(max_samples: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn record(&mut self, stat: ReaderStat) {
        if self.max_samples == 0 {
            return;
        }
        if self.window.len() == self.max_samples {
            self.window.pop_front();
        }
        self.window.push_back(stat);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn successes(&self) -> usize {
        self.window.iter().filter(|s| s.success).count()
    }

    pub fn failures(&self) -> usize {
        self.window.len() - self.successes()
    }

    pub fn success_ratio(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.successes() as f64 / self.window.len() as f64
    }

    /// Mean latency over every sample, successful or not.
    pub fn mean_latency(&self) -> Duration {
        if self.window.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.window.iter().map(|s| s.latency).sum();
        total / self.window.len() as u32
    }

    /// Ranking score, lower is better. Readers that never succeeded rank last.
    pub fn success_ratio_weighted_mean_latency(&self) -> f64 {
        let ratio = self.success_ratio();
        if ratio <= 0.0 {
            return f64::MAX;
        }
        self.mean_latency().as_secs_f64() / ratio
    }
}

/// Statistics shared between a reader aggregator and its in-flight requests.
#[derive(Debug, Clone)]
pub struct SharedReaderStats {
    inner: Arc<RwLock<HashMap<ReaderId, ReaderStats>>>,
    max_samples: usize,
}

impl SharedReaderStats {
    pub fn new(max_samples: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            max_samples,
        }
    }

    pub fn record(&self, reader: ReaderId, stat: ReaderStat) {
        let mut stats = self.inner.write();
        stats
            .entry(reader)
            .or_insert_with(|| ReaderStats::new(self.max_samples))
            .record(stat);
    }

    /// Point-in-time copy; later updates do not affect it.
    pub fn snapshot(&self) -> HashMap<ReaderId, ReaderStats> {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(ms: u64, success: bool) -> ReaderStat {
        ReaderStat {
            latency: Duration::from_millis(ms),
            success,
        }
    }

    #[test]
    fn test_window_is_bounded() {
        let mut stats = ReaderStats::new(3);
        for ms in [10, 20, 30, 40] {
            stats.record(stat(ms, true));
        }
        assert_eq!(stats.len(), 3);
        assert_eq!(stats.mean_latency(), Duration::from_millis(30));
    }

    #[test]
    fn test_weighted_latency() {
        let mut stats = ReaderStats::new(20);
        assert_eq!(stats.success_ratio_weighted_mean_latency(), f64::MAX);

        stats.record(stat(100, true));
        stats.record(stat(300, false));
        assert_eq!(stats.successes(), 1);
        assert_eq!(stats.failures(), 1);
        assert!((stats.success_ratio() - 0.5).abs() < f64::EPSILON);
        // mean 200ms / 0.5
        assert!((stats.success_ratio_weighted_mean_latency() - 0.4).abs() < 1e-9);

        let mut failing = ReaderStats::new(20);
        failing.record(stat(1, false));
        assert_eq!(failing.success_ratio_weighted_mean_latency(), f64::MAX);
    }

    #[test]
    fn test_snapshot_isolated_from_updates() {
        let shared = SharedReaderStats::new(5);
        shared.record(0, stat(10, true));
        let snapshot = shared.snapshot();
        shared.record(0, stat(10, false));
        shared.record(1, stat(10, true));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&0].len(), 1);
        assert_eq!(shared.snapshot()[&0].len(), 2);
    }
}

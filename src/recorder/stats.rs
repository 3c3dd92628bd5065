//! Per-recorder counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by a recorder
#[derive(Debug, Default)]
pub struct RecorderStats {
    hits: AtomicU64,
    misses: AtomicU64,
    recorded: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`RecorderStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Requests answered from a stored fixture
    pub hits: u64,
    /// Requests with no stored fixture
    pub misses: u64,
    /// Exchanges written to the store
    pub recorded: u64,
    /// Requests that ended in an error
    pub errors: u64,
}

impl RecorderStats {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn recorded(&self) {
        self.recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            recorded: self.recorded.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Fraction of lookups served from fixtures
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = RecorderStats::default();
        stats.hit();
        stats.hit();
        stats.miss();
        stats.recorded();
        stats.error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.recorded, 1);
        assert_eq!(snapshot.errors, 1);
        assert!((snapshot.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_hit_rate() {
        assert!(StatsSnapshot::default().hit_rate().abs() < f64::EPSILON);
    }
}

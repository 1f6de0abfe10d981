//! Tracing setup and per-run counters

use std::sync::atomic::{AtomicU64, Ordering};

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Counters shared by the workers of one run
#[derive(Debug, Default)]
pub struct RunMetrics {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    retried: AtomicU64,
    quarantined: AtomicU64,
    interrupted: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item_attempted(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn attempt_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_quarantined(&self) {
        self.quarantined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_interrupted(&self) {
        self.interrupted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            quarantined: self.quarantined.load(Ordering::Relaxed),
            interrupted: self.interrupted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub attempted: u64,
    pub succeeded: u64,
    pub retried: u64,
    pub quarantined: u64,
    pub interrupted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = RunMetrics::new();
        metrics.item_attempted();
        metrics.item_attempted();
        metrics.item_succeeded();
        metrics.attempt_retried();
        metrics.item_quarantined();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.attempted, 2);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.retried, 1);
        assert_eq!(snapshot.quarantined, 1);
        assert_eq!(snapshot.interrupted, 0);
    }
}

//! Usage statistics aggregation.
//!
//! One aggregator instance is shared by every request handler; all mutation
//! goes through [`StatsAggregator::record`], which is safe under concurrent
//! invocation. The total count is mirrored to the cache backend's durable
//! counter so it survives restarts; when that counter is unavailable the
//! aggregator keeps working from its in-memory count alone.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheBackend, TOTAL_CONVERSIONS_KEY};

#[derive(Debug, Default, Clone)]
struct StatsInner {
    total: u64,
    successful: u64,
    failed: u64,
    mean_secs: f64,
    operation_usage: BTreeMap<String, u64>,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_conversions: u64,
    pub successful_conversions: u64,
    pub failed_conversions: u64,
    /// Running mean over successes and failures combined.
    pub average_processing_secs: f64,
    pub operation_usage: BTreeMap<String, u64>,
    /// Total across process restarts, from the durable counter when present.
    pub lifetime_conversions: u64,
}

/// Thread-safe counters and running averages for the pipeline.
pub struct StatsAggregator {
    inner: Mutex<StatsInner>,
    backend: Arc<dyn CacheBackend>,
}

impl StatsAggregator {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            inner: Mutex::new(StatsInner::default()),
            backend,
        }
    }

    /// Record one finished request. Called exactly once per request,
    /// successes and failures alike (cache hits included).
    pub fn record(&self, success: bool, operation: &str, elapsed: Duration) {
        {
            let mut inner = self.inner.lock();
            inner.total += 1;
            if success {
                inner.successful += 1;
            } else {
                inner.failed += 1;
            }
            *inner
                .operation_usage
                .entry(operation.to_string())
                .or_default() += 1;

            let count = inner.total as f64;
            inner.mean_secs += (elapsed.as_secs_f64() - inner.mean_secs) / count;
        }

        // Durable mirror is best-effort; the in-memory count stands alone.
        if let Err(e) = self.backend.increment(TOTAL_CONVERSIONS_KEY) {
            tracing::debug!("durable conversion counter unavailable: {}", e);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock().clone();

        let durable = self
            .backend
            .counter_value(TOTAL_CONVERSIONS_KEY)
            .ok()
            .flatten()
            .unwrap_or(0);

        StatsSnapshot {
            total_conversions: inner.total,
            successful_conversions: inner.successful,
            failed_conversions: inner.failed,
            average_processing_secs: inner.mean_secs,
            operation_usage: inner.operation_usage,
            lifetime_conversions: durable.max(inner.total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DiskCacheBackend, NullCacheBackend};

    #[test]
    fn test_counts_and_success_split() {
        let stats = StatsAggregator::new(Arc::new(NullCacheBackend));

        stats.record(true, "standard", Duration::from_secs(2));
        stats.record(false, "standard", Duration::from_secs(4));
        stats.record(true, "merge_pdf", Duration::from_secs(6));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_conversions, 3);
        assert_eq!(snapshot.successful_conversions, 2);
        assert_eq!(snapshot.failed_conversions, 1);
        assert_eq!(snapshot.operation_usage["standard"], 2);
        assert_eq!(snapshot.operation_usage["merge_pdf"], 1);
    }

    #[test]
    fn test_incremental_mean_over_all_outcomes() {
        let stats = StatsAggregator::new(Arc::new(NullCacheBackend));

        stats.record(true, "standard", Duration::from_secs(2));
        assert!((stats.snapshot().average_processing_secs - 2.0).abs() < 1e-9);

        // The mean covers failures too.
        stats.record(false, "standard", Duration::from_secs(4));
        assert!((stats.snapshot().average_processing_secs - 3.0).abs() < 1e-9);

        stats.record(true, "standard", Duration::from_secs(9));
        assert!((stats.snapshot().average_processing_secs - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_records_are_exact() {
        let stats = Arc::new(StatsAggregator::new(Arc::new(NullCacheBackend)));

        let mut handles = Vec::new();
        for worker in 0..8 {
            let stats = stats.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    stats.record((i + worker) % 2 == 0, "standard", Duration::from_millis(10));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_conversions, 400);
        assert_eq!(
            snapshot.successful_conversions + snapshot.failed_conversions,
            400
        );
        assert_eq!(snapshot.operation_usage["standard"], 400);
    }

    #[test]
    fn test_durable_counter_mirrors_total() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(DiskCacheBackend::new(dir.path()).unwrap());

        let stats = StatsAggregator::new(backend.clone());
        stats.record(true, "standard", Duration::from_secs(1));
        stats.record(true, "standard", Duration::from_secs(1));

        assert_eq!(
            backend.counter_value(TOTAL_CONVERSIONS_KEY).unwrap(),
            Some(2)
        );

        // A fresh aggregator over the same backend reports the lifetime
        // total even though its own memory is empty.
        let restarted = StatsAggregator::new(backend);
        let snapshot = restarted.snapshot();
        assert_eq!(snapshot.total_conversions, 0);
        assert_eq!(snapshot.lifetime_conversions, 2);
    }
}

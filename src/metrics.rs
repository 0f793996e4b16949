//! In-process operation metrics
//!
//! Per-(service, operation) success/failure/duration counters. All
//! operations are lock-free atomics behind a concurrent map; a snapshot is
//! serializable for the status surface.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one (service, operation) pair
#[derive(Debug, Default)]
struct OpCounters {
    successes: AtomicU64,
    failures: AtomicU64,
    total_duration_ms: AtomicU64,
}

/// Snapshot of one (service, operation) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpStats {
    pub service: String,
    pub operation: String,
    pub successes: u64,
    pub failures: u64,
    pub total_duration_ms: u64,
}

impl OpStats {
    /// Mean duration across all recorded calls
    pub fn avg_duration_ms(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / total as f64
        }
    }

    /// Success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            0.0
        } else {
            (self.successes as f64 / total as f64) * 100.0
        }
    }
}

/// Engine-wide metrics registry
#[derive(Debug, Default)]
pub struct EngineMetrics {
    counters: DashMap<(String, String), OpCounters>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed call
    pub fn record(&self, service: &str, operation: &str, success: bool, duration_ms: u64) {
        let entry = self
            .counters
            .entry((service.to_string(), operation.to_string()))
            .or_default();
        if success {
            entry.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            entry.failures.fetch_add(1, Ordering::Relaxed);
        }
        entry
            .total_duration_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
    }

    /// Snapshot all counters, sorted by service then operation
    pub fn snapshot(&self) -> Vec<OpStats> {
        let mut stats: Vec<OpStats> = self
            .counters
            .iter()
            .map(|entry| {
                let (service, operation) = entry.key().clone();
                OpStats {
                    service,
                    operation,
                    successes: entry.successes.load(Ordering::Relaxed),
                    failures: entry.failures.load(Ordering::Relaxed),
                    total_duration_ms: entry.total_duration_ms.load(Ordering::Relaxed),
                }
            })
            .collect();
        stats.sort_by(|a, b| (&a.service, &a.operation).cmp(&(&b.service, &b.operation)));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let metrics = EngineMetrics::new();
        metrics.record("ledger", "certify", true, 120);
        metrics.record("ledger", "certify", false, 80);
        metrics.record("storage", "put", true, 40);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.len(), 2);

        let certify = &snapshot[0];
        assert_eq!(certify.service, "ledger");
        assert_eq!(certify.successes, 1);
        assert_eq!(certify.failures, 1);
        assert_eq!(certify.total_duration_ms, 200);
        assert_eq!(certify.avg_duration_ms(), 100.0);
        assert_eq!(certify.success_rate(), 50.0);
    }

    #[test]
    fn test_empty_stats_have_zero_rates() {
        let stats = OpStats {
            service: "ledger".to_string(),
            operation: "lookup".to_string(),
            successes: 0,
            failures: 0,
            total_duration_ms: 0,
        };
        assert_eq!(stats.avg_duration_ms(), 0.0);
        assert_eq!(stats.success_rate(), 0.0);
    }
}

//! In-process counters for discovery and execution.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

use crate::inventory::ToolKey;

pub struct ProxyMetrics {
    discover_calls: AtomicU64,
    execute_calls: AtomicU64,
    successful_executions: AtomicU64,
    failed_executions: AtomicU64,
    backend_connection_failures: AtomicU64,
    active_executions: AtomicU64,
    tool_latencies: DashMap<ToolKey, LatencyStats>,
}

impl ProxyMetrics {
    pub fn new() -> Self {
        Self {
            discover_calls: AtomicU64::new(0),
            execute_calls: AtomicU64::new(0),
            successful_executions: AtomicU64::new(0),
            failed_executions: AtomicU64::new(0),
            backend_connection_failures: AtomicU64::new(0),
            active_executions: AtomicU64::new(0),
            tool_latencies: DashMap::new(),
        }
    }

    pub fn record_discover(&self) {
        self.discover_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_execute_start(&self) {
        self.execute_calls.fetch_add(1, Ordering::Relaxed);
        self.active_executions.fetch_add(1, Ordering::Relaxed);
    }

    /// Pairs with [`record_execute_start`](Self::record_execute_start). Runs
    /// even when the execution is cancelled.
    pub fn record_execute_finished(&self) {
        self.active_executions.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record the outcome of an execution. Latency is tracked only for
    /// `key`s that were routed to a known tool.
    pub fn record_execute_end(&self, key: Option<&ToolKey>, success: bool, duration_ms: u64) {
        if success {
            self.successful_executions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_executions.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(key) = key {
            self.tool_latencies
                .entry(key.clone())
                .or_insert_with(LatencyStats::new)
                .record(duration_ms);
        }
    }

    pub fn record_connection_failure(&self) {
        self.backend_connection_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            discover_calls: self.discover_calls.load(Ordering::Relaxed),
            execute_calls: self.execute_calls.load(Ordering::Relaxed),
            successful_executions: self.successful_executions.load(Ordering::Relaxed),
            failed_executions: self.failed_executions.load(Ordering::Relaxed),
            backend_connection_failures: self.backend_connection_failures.load(Ordering::Relaxed),
            active_executions: self.active_executions.load(Ordering::Relaxed),
        }
    }

    pub fn tool_latency(&self, key: &ToolKey) -> Option<LatencySnapshot> {
        self.tool_latencies.get(key).map(|stats| stats.snapshot())
    }

    /// Latency for every tool that has been executed, sorted by key.
    pub fn all_tool_latencies(&self) -> Vec<(ToolKey, LatencySnapshot)> {
        let mut latencies: Vec<_> = self
            .tool_latencies
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect();
        latencies.sort_by(|a, b| a.0.cmp(&b.0));
        latencies
    }
}

impl Default for ProxyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

struct LatencyStats {
    count: AtomicU64,
    total_ms: AtomicU64,
    min_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl LatencyStats {
    fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            total_ms: AtomicU64::new(0),
            min_ms: AtomicU64::new(u64::MAX),
            max_ms: AtomicU64::new(0),
        }
    }

    fn record(&self, ms: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(ms, Ordering::Relaxed);
        self.min_ms.fetch_min(ms, Ordering::Relaxed);
        self.max_ms.fetch_max(ms, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LatencySnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let min = self.min_ms.load(Ordering::Relaxed);

        LatencySnapshot {
            count,
            total_ms: self.total_ms.load(Ordering::Relaxed),
            min_ms: if min == u64::MAX { 0 } else { min },
            max_ms: self.max_ms.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub discover_calls: u64,
    pub execute_calls: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub backend_connection_failures: u64,
    pub active_executions: u64,
}

impl MetricsSnapshot {
    /// Percentage of completed executions that succeeded (100 when none ran).
    pub fn success_rate(&self) -> f64 {
        let completed = self.successful_executions + self.failed_executions;
        if completed == 0 {
            100.0
        } else {
            (self.successful_executions as f64 / completed as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatencySnapshot {
    pub count: u64,
    pub total_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
}

impl LatencySnapshot {
    pub fn avg_ms(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_ms / self.count
        }
    }
}

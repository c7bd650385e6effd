//! Running statistics for the engine.
//!
//! Counters are atomics so the receive task, the scheduler and the CLI can
//! share one instance without taking the engine lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Engine statistics for the current process.
#[derive(Debug)]
pub struct EngineStats {
    /// Inbound messages decoded
    messages_received: AtomicU64,
    /// Samples applied to the registry
    samples_applied: AtomicU64,
    /// Messages dropped as malformed (including undecodable packets)
    messages_dropped: AtomicU64,
    /// Samples rejected because the subject exceeded capacity
    capacity_rejections: AtomicU64,
    /// Scheduler ticks completed
    ticks: AtomicU64,
    /// Similarity results emitted
    results_emitted: AtomicU64,
    /// Per-metric computations that failed numerically
    computation_failures: AtomicU64,
    /// Process start time
    started_at: DateTime<Utc>,
}

impl EngineStats {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            samples_applied: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            capacity_rejections: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            results_emitted: AtomicU64::new(0),
            computation_failures: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_applied(&self) {
        self.samples_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capacity_rejection(&self) {
        self.capacity_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emitted(&self) {
        self.results_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_computation_failure(&self) {
        self.computation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            samples_applied: self.samples_applied.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            capacity_rejections: self.capacity_rejections.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            results_emitted: self.results_emitted.load(Ordering::Relaxed),
            computation_failures: self.computation_failures.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Engine Statistics:\n\
             - Messages received: {}\n\
             - Samples applied: {}\n\
             - Messages dropped: {}\n\
             - Capacity rejections: {}\n\
             - Ticks: {}\n\
             - Results emitted: {}\n\
             - Computation failures: {}\n\
             - Uptime: {} seconds",
            stats.messages_received,
            stats.samples_applied,
            stats.messages_dropped,
            stats.capacity_rejections,
            stats.ticks,
            stats.results_emitted,
            stats.computation_failures,
            stats.uptime_secs
        )
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub messages_received: u64,
    pub samples_applied: u64,
    pub messages_dropped: u64,
    pub capacity_rejections: u64,
    pub ticks: u64,
    pub results_emitted: u64,
    pub computation_failures: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Thread-safe shared statistics.
pub type SharedStats = Arc<EngineStats>;

/// Create a new shared statistics instance.
pub fn create_shared_stats() -> SharedStats {
    Arc::new(EngineStats::new())
}

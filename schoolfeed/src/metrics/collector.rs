//! Atomic counters for the feed pipeline.
//!
//! Collects refresh and synchronization counters for the notification feed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Metrics collector for the notification feed.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    // Refresh pipeline
    total_refreshes: AtomicU64,
    published_updates: AtomicU64,
    suppressed_updates: AtomicU64,
    throttled_refreshes: AtomicU64,
    refresh_failures: AtomicU64,
    last_refresh: RwLock<Option<DateTime<Utc>>>,

    // Cache
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    // Live events
    events_received: AtomicU64,
    events_ignored: AtomicU64,
    adaptive_delay_ms: AtomicU64,

    // Deletes
    deletes_succeeded: AtomicU64,
    deletes_failed: AtomicU64,
}

impl MetricsCollector {
    /// All counters start at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Refresh Metrics ==========

    /// Record a completed refresh cycle.
    pub fn record_refresh(&self, published: bool) {
        self.total_refreshes.fetch_add(1, Ordering::Relaxed);
        if published {
            self.published_updates.fetch_add(1, Ordering::Relaxed);
        } else {
            self.suppressed_updates.fetch_add(1, Ordering::Relaxed);
        }
        *self.last_refresh.write() = Some(Utc::now());
    }

    pub fn record_throttled(&self) {
        self.throttled_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    // ========== Cache Metrics ==========

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }


    // ========== Live Event Metrics ==========

    pub fn record_event(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_ignored(&self) {
        self.events_ignored.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the delay computed for the latest scheduled refresh.
    pub fn record_adaptive_delay(&self, delay: Duration) {
        self.adaptive_delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    // ========== Delete Metrics ==========

    pub fn record_deletes(&self, succeeded: usize, failed: usize) {
        self.deletes_succeeded
            .fetch_add(succeeded as u64, Ordering::Relaxed);
        self.deletes_failed.fetch_add(failed as u64, Ordering::Relaxed);
    }

    // ========== Snapshot ==========

    /// Copy every counter into a serializable snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);

        MetricsSnapshot {
            last_refresh: *self.last_refresh.read(),
            total_refreshes: self.total_refreshes.load(Ordering::Relaxed),
            published_updates: self.published_updates.load(Ordering::Relaxed),
            suppressed_updates: self.suppressed_updates.load(Ordering::Relaxed),
            throttled_refreshes: self.throttled_refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_rate: hit_rate(cache_hits, cache_misses),
            events_received: self.events_received.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            adaptive_delay_ms: self.adaptive_delay_ms.load(Ordering::Relaxed),
            deletes_succeeded: self.deletes_succeeded.load(Ordering::Relaxed),
            deletes_failed: self.deletes_failed.load(Ordering::Relaxed),
        }
    }

    /// Reset every counter.
    pub fn reset(&self) {
        for counter in [
            &self.total_refreshes,
            &self.published_updates,
            &self.suppressed_updates,
            &self.throttled_refreshes,
            &self.refresh_failures,
            &self.cache_hits,
            &self.cache_misses,
            &self.events_received,
            &self.events_ignored,
            &self.adaptive_delay_ms,
            &self.deletes_succeeded,
            &self.deletes_failed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.last_refresh.write() = None;
    }
}

/// Share of cache lookups that hit, in the range [0, 1].
fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Point-in-time copy of the feed counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub last_refresh: Option<DateTime<Utc>>,
    pub total_refreshes: u64,
    pub published_updates: u64,
    pub suppressed_updates: u64,
    pub throttled_refreshes: u64,
    pub refresh_failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub events_received: u64,
    pub events_ignored: u64,
    pub adaptive_delay_ms: u64,
    pub deletes_succeeded: u64,
    pub deletes_failed: u64,
}

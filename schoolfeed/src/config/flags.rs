//! Feature flags consulted by the feed.

use std::sync::atomic::{AtomicBool, Ordering};

use super::FlagsConfig;

pub trait FeatureFlags: Send + Sync {
    /// When false the feed is emptied and nothing is fetched.
    fn feed_enabled(&self) -> bool;

    /// When false live change events no longer trigger refreshes.
    fn live_sync_enabled(&self) -> bool;
}

/// Flags held in memory and switchable at runtime.
#[derive(Debug)]
pub struct StaticFeatureFlags {
    feed_enabled: AtomicBool,
    live_sync_enabled: AtomicBool,
}

impl StaticFeatureFlags {
    pub fn new(feed_enabled: bool, live_sync_enabled: bool) -> Self {
        Self {
            feed_enabled: AtomicBool::new(feed_enabled),
            live_sync_enabled: AtomicBool::new(live_sync_enabled),
        }
    }

    pub fn from_config(config: &FlagsConfig) -> Self {
        Self::new(config.feed_enabled, config.live_sync_enabled)
    }

    pub fn set_feed_enabled(&self, enabled: bool) {
        self.feed_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_live_sync_enabled(&self, enabled: bool) {
        self.live_sync_enabled.store(enabled, Ordering::SeqCst);
    }
}

impl Default for StaticFeatureFlags {
    fn default() -> Self {
        Self::from_config(&FlagsConfig::default())
    }
}

impl FeatureFlags for StaticFeatureFlags {
    fn feed_enabled(&self) -> bool {
        self.feed_enabled.load(Ordering::SeqCst)
    }

    fn live_sync_enabled(&self) -> bool {
        self.live_sync_enabled.load(Ordering::SeqCst)
    }
}

//! Feed configuration.
//!
//! All knobs have defaults; `FeedConfig::from_env` overrides them from
//! `SCHOOLFEED_*` variables (after `.env` has been loaded by the binary).

pub mod flags;

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use flags::{FeatureFlags, StaticFeatureFlags};

/// Upper bound accepted for `max_age_days` (about a century).
pub const MAX_AGE_DAYS_LIMIT: i64 = 36_500;

/// Retention limits applied on every recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Maximum number of items kept in the feed.
    pub max_items: usize,
    /// Items older than this many days are dropped.
    pub max_age_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_items: 500,
            max_age_days: 90,
        }
    }
}

impl RetentionConfig {
    /// Values outside chrono's range saturate instead of panicking.
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.max_age_days).unwrap_or(chrono::Duration::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of the cached feed in milliseconds.
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_ms: 5_000 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Refresh calls closer than this to the last completed fetch are no-ops.
    pub min_fetch_interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            min_fetch_interval_ms: 2_000,
        }
    }
}

impl RefreshConfig {
    pub fn min_fetch_interval(&self) -> Duration {
        Duration::from_millis(self.min_fetch_interval_ms)
    }
}

/// Adaptive debounce of live change events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Delay for an isolated event.
    pub base_delay_ms: u64,
    /// Extra delay per additional event in the burst window.
    pub step_delay_ms: u64,
    /// Upper bound of the computed delay.
    pub max_delay_ms: u64,
    /// Window over which events count towards a burst.
    pub burst_window_ms: u64,
    /// Events arriving this soon after a completed refresh are dropped.
    pub min_event_interval_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 300,
            step_delay_ms: 200,
            max_delay_ms: 2_000,
            burst_window_ms: 3_000,
            min_event_interval_ms: 1_000,
        }
    }
}

impl DebounceConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn burst_window(&self) -> Duration {
        Duration::from_millis(self.burst_window_ms)
    }

    pub fn min_event_interval(&self) -> Duration {
        Duration::from_millis(self.min_event_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagsConfig {
    pub feed_enabled: bool,
    pub live_sync_enabled: bool,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            feed_enabled: true,
            live_sync_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite URL; `None` keeps state in memory only.
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive; `RUST_LOG` wins when set.
    pub filter: Option<String>,
    /// Directory for rolling log files; console only when unset.
    pub log_dir: Option<String>,
    pub json: bool,
}

/// Complete feed configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub retention: RetentionConfig,
    pub cache: CacheConfig,
    pub refresh: RefreshConfig,
    pub debounce: DebounceConfig,
    pub flags: FlagsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingSettings,
}

impl FeedConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let env = EnvReader { lookup: &lookup };

        env.apply("SCHOOLFEED_MAX_ITEMS", &mut config.retention.max_items)?;
        env.apply("SCHOOLFEED_MAX_AGE_DAYS", &mut config.retention.max_age_days)?;
        env.apply("SCHOOLFEED_CACHE_TTL_MS", &mut config.cache.ttl_ms)?;
        env.apply(
            "SCHOOLFEED_MIN_FETCH_INTERVAL_MS",
            &mut config.refresh.min_fetch_interval_ms,
        )?;
        env.apply("SCHOOLFEED_DEBOUNCE_BASE_MS", &mut config.debounce.base_delay_ms)?;
        env.apply("SCHOOLFEED_DEBOUNCE_STEP_MS", &mut config.debounce.step_delay_ms)?;
        env.apply("SCHOOLFEED_DEBOUNCE_MAX_MS", &mut config.debounce.max_delay_ms)?;
        env.apply(
            "SCHOOLFEED_BURST_WINDOW_MS",
            &mut config.debounce.burst_window_ms,
        )?;
        env.apply(
            "SCHOOLFEED_MIN_EVENT_INTERVAL_MS",
            &mut config.debounce.min_event_interval_ms,
        )?;
        env.apply("SCHOOLFEED_FEED_ENABLED", &mut config.flags.feed_enabled)?;
        env.apply(
            "SCHOOLFEED_LIVE_SYNC_ENABLED",
            &mut config.flags.live_sync_enabled,
        )?;
        env.apply("SCHOOLFEED_LOG_JSON", &mut config.logging.json)?;

        config.storage.database_url = env.string("DATABASE_URL");
        config.logging.filter = env.string("SCHOOLFEED_LOG_FILTER");
        config.logging.log_dir = env.string("SCHOOLFEED_LOG_DIR");

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the feed cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.retention.max_items == 0 {
            return Err(Error::config("max_items must be greater than zero"));
        }
        if !(1..=MAX_AGE_DAYS_LIMIT).contains(&self.retention.max_age_days) {
            return Err(Error::config(format!(
                "max_age_days must be between 1 and {MAX_AGE_DAYS_LIMIT}, got {}",
                self.retention.max_age_days
            )));
        }
        if self.debounce.max_delay_ms < self.debounce.base_delay_ms {
            return Err(Error::config(format!(
                "debounce max delay ({}ms) is below the base delay ({}ms)",
                self.debounce.max_delay_ms, self.debounce.base_delay_ms
            )));
        }
        Ok(())
    }
}

struct EnvReader<'a, F> {
    lookup: &'a F,
}

impl<F> EnvReader<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn apply<T>(&self, key: &str, target: &mut T) -> Result<()>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if let Some(raw) = self.string(key) {
            *target = raw
                .parse()
                .map_err(|e| Error::config(format!("Invalid value for {key} ({raw}): {e}")))?;
        }
        Ok(())
    }
}

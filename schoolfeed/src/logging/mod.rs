//! Logging setup with an env-driven filter and optional rolling log files.
//!
//! - Console output with local timezone timestamps, plain or JSON
//! - Daily log files plus retention cleanup when a log directory is set

use chrono::{Local, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::LoggingSettings;
use crate::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "schoolfeed=info,sqlx=warn";

/// Log retention period in days.
pub const LOG_RETENTION_DAYS: i64 = 7;

const LOG_FILE_PREFIX: &str = "schoolfeed.log";

/// Formats timestamps in the local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Handle to the installed subscriber. Keep it alive for the process lifetime;
/// dropping it flushes the file writer.
pub struct LoggingHandle {
    log_dir: Option<PathBuf>,
    _guard: Option<WorkerGuard>,
}

impl LoggingHandle {
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Pick the initial filter: `RUST_LOG`, then the configured one, then the default.
fn initial_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| {
            settings
                .filter
                .as_deref()
                .and_then(|directive| EnvFilter::try_new(directive).ok())
        })
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the global subscriber.
pub fn init_logging(settings: &LoggingSettings) -> Result<LoggingHandle> {
    let filter = initial_filter(settings);

    let log_dir = settings.log_dir.as_deref().map(PathBuf::from);
    let (file_layer, guard) = match &log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let (plain_console, json_console) = if settings.json {
        (None, Some(fmt::layer().json().with_timer(LocalTimer)))
    } else {
        (
            Some(fmt::layer().with_ansi(true).with_timer(LocalTimer)),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain_console)
        .with(json_console)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {e}")))?;

    Ok(LoggingHandle {
        log_dir,
        _guard: guard,
    })
}

/// Delete rolled log files older than `retention_days`. Returns how many.
pub async fn cleanup_old_logs(log_dir: &Path, retention_days: i64) -> std::io::Result<usize> {
    let cutoff = (Utc::now() - chrono::Duration::days(retention_days)).date_naive();

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted_count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        // schoolfeed.log.YYYY-MM-DD
        let Some(date_str) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|name| name.strip_prefix(LOG_FILE_PREFIX))
            .and_then(|rest| rest.strip_prefix('.'))
        else {
            continue;
        };

        let Ok(file_date) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
            continue;
        };

        if file_date < cutoff {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    deleted_count += 1;
                    debug!(path = %path.display(), "Deleted old log file");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to delete old log file");
                }
            }
        }
    }

    if deleted_count > 0 {
        info!(count = deleted_count, "Cleaned up old log files");
    }

    Ok(deleted_count)
}

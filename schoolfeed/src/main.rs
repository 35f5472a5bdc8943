use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use schoolfeed::config::{FeedConfig, StaticFeatureFlags};
use schoolfeed::feed::{ChangeEventBroadcaster, FeedService};
use schoolfeed::logging::{self, LOG_RETENTION_DAYS};
use schoolfeed::source::{InMemorySources, SourceCollections};
use schoolfeed::storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = FeedConfig::from_env().context("loading configuration")?;
    let log_handle = logging::init_logging(&config.logging)?;
    if let Some(dir) = log_handle.log_dir()
        && let Err(e) = logging::cleanup_old_logs(dir, LOG_RETENTION_DAYS).await
    {
        tracing::warn!(error = %e, "Failed to cleanup old logs");
    }

    let fixture = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SCHOOLFEED_FIXTURE").ok())
        .map(PathBuf::from);
    let collections = match fixture {
        Some(path) => SourceCollections::load_from_file(&path)
            .await
            .with_context(|| format!("loading fixture {}", path.display()))?,
        None => {
            tracing::info!("No fixture given, starting with empty collections");
            SourceCollections::default()
        }
    };
    tracing::info!(records = collections.len(), "Source collections loaded");

    let store = storage::open_store(config.storage.database_url.as_deref()).await;
    let user_id = std::env::var("SCHOOLFEED_USER").ok();

    let service = FeedService::new(
        config.clone(),
        Arc::new(InMemorySources::with_collections(collections)),
        store,
        Arc::new(ChangeEventBroadcaster::new()),
        Arc::new(StaticFeatureFlags::from_config(&config.flags)),
    );
    service.start(user_id.as_deref()).await;

    let feed = service.notifications();
    println!("{}", serde_json::to_string_pretty(feed.as_ref())?);

    tracing::info!(
        items = feed.len(),
        unread = service.unread_count(),
        metrics = ?service.metrics(),
        "schoolfeed finished"
    );
    service.shutdown();

    Ok(())
}

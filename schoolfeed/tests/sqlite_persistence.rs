mod common;

use std::sync::Arc;

use chrono::Utc;
use common::{eager_config, message};
use schoolfeed::config::StaticFeatureFlags;
use schoolfeed::feed::{ChangeEventBroadcaster, FeedService};
use schoolfeed::source::InMemorySources;
use schoolfeed::storage::{self, KeyValueStore};

async fn service_on(
    database_url: &str,
    sources: Arc<InMemorySources>,
) -> (Arc<FeedService>, Arc<dyn KeyValueStore>) {
    let store = storage::open_store(Some(database_url)).await;
    let service = FeedService::new(
        eager_config(),
        sources,
        store.clone(),
        Arc::new(ChangeEventBroadcaster::new()),
        Arc::new(StaticFeatureFlags::default()),
    );
    (service, store)
}

#[tokio::test]
async fn test_read_state_survives_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("feed.db").display());

    let sources = Arc::new(InMemorySources::new());
    sources.add_message(message("1", Utc::now()));
    sources.add_message(message("2", Utc::now()));

    {
        let (service, store) = service_on(&url, sources.clone()).await;
        assert_eq!(store.backend_name(), "sqlite");
        service.start(Some("parent-3")).await;
        service.mark_as_read("message-2").await;
        service.shutdown();
    }

    let (service, _store) = service_on(&url, sources).await;
    service.start(Some("parent-3")).await;

    assert!(service.is_read("message-2"));
    assert!(!service.is_read("message-1"));
    assert_eq!(service.unread_count(), 1);
}

#[tokio::test]
async fn test_unusable_database_falls_back_to_memory() {
    let sources = Arc::new(InMemorySources::new());
    sources.add_message(message("1", Utc::now()));

    let (service, store) =
        service_on("sqlite:/nonexistent-schoolfeed-dir/feed.db?mode=rwc", sources).await;
    assert_eq!(store.backend_name(), "memory");

    service.start(Some("parent-3")).await;
    service.mark_as_read("message-1").await;

    assert!(service.is_read("message-1"));
    assert_eq!(service.unread_count(), 0);
}

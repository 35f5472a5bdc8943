#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use schoolfeed::config::{FeedConfig, StaticFeatureFlags};
use schoolfeed::domain::{MaterialRecord, MessageRecord, ScheduledKind, ScheduledRecord};
use schoolfeed::feed::{ChangeEventBroadcaster, FeedService};
use schoolfeed::source::InMemorySources;
use schoolfeed::storage::{KeyValueStore, MemoryKeyValueStore};

/// Config without throttle or cache, so every refresh hits the sources.
pub fn eager_config() -> FeedConfig {
    let mut config = FeedConfig::default();
    config.refresh.min_fetch_interval_ms = 0;
    config.cache.ttl_ms = 0;
    config
}

pub struct Harness {
    pub service: Arc<FeedService>,
    pub sources: Arc<InMemorySources>,
    pub kv: Arc<MemoryKeyValueStore>,
    pub live: Arc<ChangeEventBroadcaster>,
    pub flags: Arc<StaticFeatureFlags>,
}

impl Harness {
    pub fn new(config: FeedConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(InMemorySources::new()),
            Arc::new(MemoryKeyValueStore::new()),
        )
    }

    pub fn with_parts(
        config: FeedConfig,
        sources: Arc<InMemorySources>,
        kv: Arc<MemoryKeyValueStore>,
    ) -> Self {
        let live = Arc::new(ChangeEventBroadcaster::new());
        let flags = Arc::new(StaticFeatureFlags::default());
        let store: Arc<dyn KeyValueStore> = kv.clone();
        let service = FeedService::new(
            config,
            sources.clone(),
            store,
            live.clone(),
            flags.clone(),
        );
        Self {
            service,
            sources,
            kv,
            live,
            flags,
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.service
            .notifications()
            .iter()
            .map(|item| item.id.clone())
            .collect()
    }
}

pub fn message(id: &str, created_at: DateTime<Utc>) -> MessageRecord {
    MessageRecord {
        id: id.to_string(),
        sender_name: Some("Class teacher".to_string()),
        subject: Some(format!("Message {id}")),
        body: None,
        created_at,
    }
}

pub fn scheduled(id: &str, due_in: Duration) -> ScheduledRecord {
    let now = Utc::now();
    ScheduledRecord {
        id: id.to_string(),
        kind: ScheduledKind::Assignment,
        title: Some(format!("Homework {id}")),
        subject_name: Some("Biology".to_string()),
        due_at: now + due_in,
        created_at: now - Duration::minutes(5),
    }
}

pub fn material(id: &str, published_at: DateTime<Utc>) -> MaterialRecord {
    MaterialRecord {
        id: id.to_string(),
        title: Some(format!("Slides {id}")),
        subject_name: Some("History".to_string()),
        description: None,
        published_at,
    }
}

pub fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

//! Feed cache implementation.
//!
//! Holds computed feed lists per logical query slot with TTL-based expiry, so
//! repeated refreshes inside the TTL skip the backend entirely.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::NotificationItem;

/// Slot used by the notification feed.
pub const FEED_SLOT: &str = "feed";

#[derive(Clone)]
struct CacheEntry {
    items: Arc<Vec<NotificationItem>>,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(items: Arc<Vec<NotificationItem>>, ttl: Duration) -> Self {
        Self {
            items,
            stored_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// Thread-safe TTL cache of computed feed lists.
#[derive(Clone)]
pub struct FeedCache {
    slots: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl FeedCache {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Get the list cached under `slot`.
    ///
    /// Returns None if not cached or expired. Expired entries are evicted.
    pub fn get(&self, slot: &str) -> Option<Arc<Vec<NotificationItem>>> {
        let entry = self.slots.get(slot)?;

        if entry.is_expired() {
            drop(entry); // Release the shard lock before removing
            self.slots.remove(slot);
            return None;
        }

        Some(entry.items.clone())
    }

    pub fn insert(&self, slot: impl Into<String>, items: Arc<Vec<NotificationItem>>) {
        self.slots
            .insert(slot.into(), CacheEntry::new(items, self.ttl));
    }

    pub fn invalidate(&self, slot: &str) {
        self.slots.remove(slot);
    }

    pub fn invalidate_all(&self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SourceRecord, SystemNotice};
    use chrono::Utc;

    fn items(n: usize) -> Arc<Vec<NotificationItem>> {
        let now = Utc::now();
        Arc::new(
            (0..n)
                .map(|i| {
                    let notice = SystemNotice {
                        id: i.to_string(),
                        title: format!("Notice {i}"),
                        message: String::new(),
                        created_at: now,
                    };
                    crate::feed::normalizer::normalize(SourceRecord::System(notice), now)
                })
                .collect(),
        )
    }

    #[test]
    fn test_cache_insert_and_get() {
        let cache = FeedCache::with_ttl(Duration::from_secs(5));
        let list = items(3);

        cache.insert(FEED_SLOT, list.clone());

        let cached = cache.get(FEED_SLOT).unwrap();
        assert!(Arc::ptr_eq(&cached, &list));
    }

    #[test]
    fn test_cache_miss() {
        let cache = FeedCache::with_ttl(Duration::from_secs(5));
        assert!(cache.get(FEED_SLOT).is_none());
    }

    #[test]
    fn test_cache_invalidate() {
        let cache = FeedCache::with_ttl(Duration::from_secs(5));
        cache.insert(FEED_SLOT, items(1));
        cache.insert("other", items(1));

        cache.invalidate(FEED_SLOT);

        assert!(cache.get(FEED_SLOT).is_none());
        assert!(cache.get("other").is_some());

        cache.invalidate_all();
        assert!(cache.get("other").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_ttl_expiration() {
        let cache = FeedCache::with_ttl(Duration::from_secs(5));
        cache.insert(FEED_SLOT, items(2));

        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert!(cache.get(FEED_SLOT).is_some());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get(FEED_SLOT).is_none());
        assert!(!cache.slots.contains_key(FEED_SLOT));
    }
}

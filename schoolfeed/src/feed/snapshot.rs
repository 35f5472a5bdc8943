//! Recovery snapshot of the last published feed.
//!
//! Lets a restarted session show the previous feed before its first fetch
//! completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::NotificationItem;
use crate::storage::KeyValueStore;
use crate::utils::json::{self, JsonContext};

pub fn snapshot_key(user_id: &str) -> String {
    format!("feed:snapshot:{user_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub saved_at: DateTime<Utc>,
    pub items: Vec<NotificationItem>,
}

pub async fn save(store: &dyn KeyValueStore, user_id: &str, items: &[NotificationItem]) {
    #[derive(Serialize)]
    struct Borrowed<'a> {
        saved_at: DateTime<Utc>,
        items: &'a [NotificationItem],
    }

    let ctx = JsonContext::FeedSnapshot { user_id };
    let snapshot = Borrowed {
        saved_at: Utc::now(),
        items,
    };
    let Some(payload) =
        json::to_string_option_or_warn(&snapshot, ctx, "Failed to serialize feed snapshot")
    else {
        return;
    };

    if let Err(e) = store.set(&snapshot_key(user_id), &payload).await {
        warn!(user_id = %user_id, error = %e, "Failed to persist feed snapshot");
    }
}

pub async fn load(store: &dyn KeyValueStore, user_id: &str) -> Option<FeedSnapshot> {
    let raw = match store.get(&snapshot_key(user_id)).await {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Failed to load feed snapshot");
            return None;
        }
    };

    let snapshot: FeedSnapshot = json::parse_optional(
        Some(&raw),
        JsonContext::FeedSnapshot { user_id },
        "Discarding unreadable feed snapshot",
    )?;
    debug!(
        user_id = %user_id,
        count = snapshot.items.len(),
        saved_at = %snapshot.saved_at,
        "Loaded feed snapshot"
    );
    Some(snapshot)
}

pub async fn clear(store: &dyn KeyValueStore, user_id: &str) {
    if let Err(e) = store.remove(&snapshot_key(user_id)).await {
        warn!(user_id = %user_id, error = %e, "Failed to clear feed snapshot");
    }
}

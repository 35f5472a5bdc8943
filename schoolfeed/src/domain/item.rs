//! The unified feed item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::priority::Priority;
use super::source::{Category, SourceKind, SourceRecord};

/// One entry of the notification feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationItem {
    /// `<tag>-<record id>`, unique within the feed.
    pub id: String,
    pub kind: SourceKind,
    pub title: String,
    pub message: String,
    pub data: SourceRecord,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub priority: Priority,
    pub category: Category,
}

impl NotificationItem {
    pub fn record_id(&self) -> &str {
        self.data.record_id()
    }

    pub fn color(&self) -> &'static str {
        self.kind.color()
    }

    pub fn icon(&self) -> &'static str {
        self.kind.icon()
    }

    /// Age of the item relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.timestamp)
    }
}

/// Sort items newest first; equal timestamps fall back to id order.
pub fn sort_newest_first(items: &mut [NotificationItem]) {
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
}

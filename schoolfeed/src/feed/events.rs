//! Live change events consumed by the feed, and feed events it emits.
//!
//! The backend announces row changes per source collection through
//! [`LiveEvents`]; [`ChangeEventBroadcaster`] is the in-process implementation.
//! UI consumers follow the published feed through [`FeedEvent`]s.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::SourceKind;

/// Default channel capacity for change and feed events.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

/// A row change in one backend collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: SourceKind,
    pub action: ChangeAction,
    pub record_id: Option<String>,
}

impl ChangeEvent {
    pub fn new(kind: SourceKind, action: ChangeAction, record_id: impl Into<String>) -> Self {
        Self {
            kind,
            action,
            record_id: Some(record_id.into()),
        }
    }

    pub fn description(&self) -> String {
        match &self.record_id {
            Some(id) => format!("{:?} on {} record {}", self.action, self.kind, id),
            None => format!("{:?} on {} collection", self.action, self.kind),
        }
    }
}

/// Source of live change events.
pub trait LiveEvents: Send + Sync {
    /// Subscribe to changes of one collection. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self, kind: SourceKind) -> broadcast::Receiver<ChangeEvent>;
}

/// In-process change event hub with one channel per backend collection.
#[derive(Clone)]
pub struct ChangeEventBroadcaster {
    senders: HashMap<SourceKind, broadcast::Sender<ChangeEvent>>,
}

impl ChangeEventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let senders = SourceKind::BACKEND
            .into_iter()
            .map(|kind| (kind, broadcast::channel(capacity).0))
            .collect();
        Self { senders }
    }

    /// Publish a change event.
    ///
    /// Returns the number of receivers that got the event, 0 when nobody
    /// listens or the kind has no backend collection.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        tracing::debug!("Publishing change event: {}", event.description());
        self.senders
            .get(&event.kind)
            .and_then(|sender| sender.send(event).ok())
            .unwrap_or(0)
    }

    pub fn subscriber_count(&self, kind: SourceKind) -> usize {
        self.senders
            .get(&kind)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }
}

impl Default for ChangeEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveEvents for ChangeEventBroadcaster {
    fn subscribe(&self, kind: SourceKind) -> broadcast::Receiver<ChangeEvent> {
        match self.senders.get(&kind) {
            Some(sender) => sender.subscribe(),
            // Local-only kinds never change on the backend.
            None => broadcast::channel(1).1,
        }
    }
}

/// Events broadcast when the published feed changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FeedEvent {
    /// A new list was published.
    Published { count: usize, unread: usize },
    /// Items left the published list.
    Removed { ids: Vec<String> },
    /// Read flags of the given items changed.
    ReadStateChanged { ids: Vec<String>, read: bool },
    /// The feed was emptied (feed disabled or full reset).
    Cleared,
}

impl FeedEvent {
    pub fn description(&self) -> String {
        match self {
            Self::Published { count, unread } => {
                format!("Feed published: {count} items, {unread} unread")
            }
            Self::Removed { ids } => format!("Removed {} items", ids.len()),
            Self::ReadStateChanged { ids, read } => {
                format!("Marked {} items as {}", ids.len(), if *read { "read" } else { "unread" })
            }
            Self::Cleared => "Feed cleared".to_string(),
        }
    }
}

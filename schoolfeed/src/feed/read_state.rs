//! Durable per-user set of read notification ids.
//!
//! Mutations touch the in-memory set synchronously; [`ReadStateStore::persist`]
//! writes the whole set under `feed:read:<user>`. Without an identity the set
//! is ephemeral and never written.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::storage::KeyValueStore;
use crate::utils::json::{self, JsonContext};

/// Storage key of a user's read set.
pub fn read_state_key(user_id: &str) -> String {
    format!("feed:read:{user_id}")
}

pub struct ReadStateStore {
    store: Arc<dyn KeyValueStore>,
    user_id: RwLock<Option<String>>,
    ids: RwLock<HashSet<String>>,
    /// Serializes writes so the newest set always lands last.
    write_lock: Mutex<()>,
}

impl ReadStateStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            user_id: RwLock::new(None),
            ids: RwLock::new(HashSet::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_id.read().clone()
    }

    /// Switch to `user_id` and rehydrate its set from storage.
    ///
    /// The previous set is discarded first. Unreadable or corrupt data yields
    /// an empty set.
    pub async fn load(&self, user_id: Option<&str>) {
        *self.user_id.write() = user_id.map(str::to_string);
        self.ids.write().clear();

        let Some(user_id) = user_id else {
            return;
        };

        let raw = match self.store.get(&read_state_key(user_id)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to load read state");
                None
            }
        };
        let ids: Vec<String> = json::parse_optional_or_default(
            raw.as_deref(),
            JsonContext::ReadState { user_id },
            "Discarding unreadable read state",
        );

        // The identity may have moved on while storage was being read.
        if self.user_id.read().as_deref() != Some(user_id) {
            return;
        }
        debug!(user_id = %user_id, count = ids.len(), "Read state rehydrated");
        self.ids.write().extend(ids);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }

    /// Returns true if the id was not read before.
    pub fn insert(&self, id: &str) -> bool {
        self.ids.write().insert(id.to_string())
    }

    /// Returns true if the id was read before.
    pub fn remove(&self, id: &str) -> bool {
        self.ids.write().remove(id)
    }

    pub fn insert_many<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> usize {
        let mut set = self.ids.write();
        ids.into_iter()
            .filter(|id| set.insert(id.to_string()))
            .count()
    }

    pub fn remove_many<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> usize {
        let mut set = self.ids.write();
        ids.into_iter().filter(|id| set.remove(*id)).count()
    }

    pub fn clear(&self) {
        self.ids.write().clear();
    }

    /// Write the current set. Failures are logged; memory stays authoritative.
    pub async fn persist(&self) {
        let _guard = self.write_lock.lock().await;

        let Some(user_id) = self.user_id() else {
            return;
        };
        let mut ids: Vec<String> = self.ids.read().iter().cloned().collect();
        ids.sort();

        let ctx = JsonContext::ReadState { user_id: &user_id };
        let Some(payload) =
            json::to_string_option_or_warn(&ids, ctx, "Failed to serialize read state")
        else {
            return;
        };

        if let Err(e) = self.store.set(&read_state_key(&user_id), &payload).await {
            warn!(
                user_id = %user_id,
                backend = self.store.backend_name(),
                error = %e,
                "Failed to persist read state"
            );
        }
    }

    /// Remove the persisted set of the current user.
    pub async fn clear_persisted(&self) {
        let _guard = self.write_lock.lock().await;

        let Some(user_id) = self.user_id() else {
            return;
        };
        if let Err(e) = self.store.remove(&read_state_key(&user_id)).await {
            warn!(user_id = %user_id, error = %e, "Failed to clear persisted read state");
        }
    }
}

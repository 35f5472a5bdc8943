//! In-memory source adapter with scripted failures.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BulkDeleteOutcome, SourceAdapter};
use crate::domain::{MaterialRecord, MessageRecord, ScheduledRecord, SourceKind};
use crate::{Error, Result};

/// Snapshot of all three source collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCollections {
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    #[serde(default)]
    pub scheduled: Vec<ScheduledRecord>,
    #[serde(default)]
    pub materials: Vec<MaterialRecord>,
}

impl SourceCollections {
    /// Load collections from a JSON fixture file.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn remove(&mut self, kind: SourceKind, record_id: &str) -> bool {
        let before = self.len();
        match kind {
            SourceKind::Message => self.messages.retain(|r| r.id != record_id),
            SourceKind::Scheduled => self.scheduled.retain(|r| r.id != record_id),
            SourceKind::Material => self.materials.retain(|r| r.id != record_id),
            SourceKind::System => {}
        }
        self.len() < before
    }

    pub fn len(&self) -> usize {
        self.messages.len() + self.scheduled.len() + self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source adapter keeping every collection in memory.
///
/// Messages support bulk deletes, the other collections only single deletes.
pub struct InMemorySources {
    collections: RwLock<SourceCollections>,
    failing_lists: RwLock<HashSet<SourceKind>>,
    failing_deletes: RwLock<HashSet<(SourceKind, String)>>,
    viewed: RwLock<Vec<(SourceKind, String)>>,
    fail_viewed: AtomicBool,
    connected: AtomicBool,
    list_delay: RwLock<Option<Duration>>,
    fetch_count: AtomicU64,
    delete_calls: AtomicU64,
    bulk_delete_calls: AtomicU64,
}

impl InMemorySources {
    pub fn new() -> Self {
        Self::with_collections(SourceCollections::default())
    }

    pub fn with_collections(collections: SourceCollections) -> Self {
        Self {
            collections: RwLock::new(collections),
            failing_lists: RwLock::new(HashSet::new()),
            failing_deletes: RwLock::new(HashSet::new()),
            viewed: RwLock::new(Vec::new()),
            fail_viewed: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            list_delay: RwLock::new(None),
            fetch_count: AtomicU64::new(0),
            delete_calls: AtomicU64::new(0),
            bulk_delete_calls: AtomicU64::new(0),
        }
    }

    pub fn add_message(&self, record: MessageRecord) {
        self.collections.write().messages.push(record);
    }

    pub fn add_scheduled(&self, record: ScheduledRecord) {
        self.collections.write().scheduled.push(record);
    }

    pub fn add_material(&self, record: MaterialRecord) {
        self.collections.write().materials.push(record);
    }

    pub fn replace(&self, collections: SourceCollections) {
        *self.collections.write() = collections;
    }

    pub fn collections(&self) -> SourceCollections {
        self.collections.read().clone()
    }

    /// Make listing `kind` fail until reset.
    pub fn set_list_failure(&self, kind: SourceKind, failing: bool) {
        let mut failing_lists = self.failing_lists.write();
        if failing {
            failing_lists.insert(kind);
        } else {
            failing_lists.remove(&kind);
        }
    }

    /// Make deleting one record fail.
    pub fn fail_delete_of(&self, kind: SourceKind, record_id: impl Into<String>) {
        self.failing_deletes.write().insert((kind, record_id.into()));
    }

    pub fn set_viewed_failure(&self, failing: bool) {
        self.fail_viewed.store(failing, Ordering::SeqCst);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Delay every list call, to widen the fetch window in tests.
    pub fn set_list_delay(&self, delay: Option<Duration>) {
        *self.list_delay.write() = delay;
    }

    /// Number of message list calls, i.e. completed fetch fan-outs.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u64 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn bulk_delete_calls(&self) -> u64 {
        self.bulk_delete_calls.load(Ordering::SeqCst)
    }

    pub fn viewed(&self) -> Vec<(SourceKind, String)> {
        self.viewed.read().clone()
    }

    async fn before_list(&self, kind: SourceKind) -> Result<()> {
        let delay = *self.list_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_lists.read().contains(&kind) {
            return Err(Error::source_failed(kind.tag(), "collection unavailable"));
        }
        Ok(())
    }

    fn delete_one(&self, kind: SourceKind, record_id: &str) -> bool {
        if self
            .failing_deletes
            .read()
            .contains(&(kind, record_id.to_string()))
        {
            return false;
        }
        self.collections.write().remove(kind, record_id)
    }
}

impl Default for InMemorySources {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for InMemorySources {
    async fn list_messages(&self) -> Result<Vec<MessageRecord>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.before_list(SourceKind::Message).await?;
        Ok(self.collections.read().messages.clone())
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledRecord>> {
        self.before_list(SourceKind::Scheduled).await?;
        Ok(self.collections.read().scheduled.clone())
    }

    async fn list_materials(&self) -> Result<Vec<MaterialRecord>> {
        self.before_list(SourceKind::Material).await?;
        Ok(self.collections.read().materials.clone())
    }

    async fn delete(&self, kind: SourceKind, record_id: &str) -> Result<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if !kind.is_backend() {
            return Err(Error::Unsupported(format!("delete of {kind} records")));
        }
        Ok(self.delete_one(kind, record_id))
    }

    fn supports_bulk_delete(&self, kind: SourceKind) -> bool {
        matches!(kind, SourceKind::Message)
    }

    async fn bulk_delete(
        &self,
        kind: SourceKind,
        record_ids: &[String],
    ) -> Result<BulkDeleteOutcome> {
        if !self.supports_bulk_delete(kind) {
            return Err(Error::Unsupported(format!("bulk delete of {kind} records")));
        }
        self.bulk_delete_calls.fetch_add(1, Ordering::SeqCst);

        let mut outcome = BulkDeleteOutcome::default();
        for record_id in record_ids {
            if self.delete_one(kind, record_id) {
                outcome.success_ids.push(record_id.clone());
            } else {
                outcome.failed_ids.push(record_id.clone());
            }
        }
        debug!(
            kind = %kind,
            succeeded = outcome.success_ids.len(),
            failed = outcome.failed_ids.len(),
            "Bulk delete applied"
        );
        Ok(outcome)
    }

    async fn register_viewed(&self, kind: SourceKind, record_id: &str) -> Result<()> {
        if self.fail_viewed.load(Ordering::SeqCst) {
            return Err(Error::source_failed(kind.tag(), "viewed signal rejected"));
        }
        self.viewed.write().push((kind, record_id.to_string()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(id: &str) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            sender_name: Some("Ms. Rossi".to_string()),
            subject: Some("Field trip".to_string()),
            body: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_bulk_delete_reports_per_record_outcome() {
        let sources = InMemorySources::new();
        sources.add_message(message("1"));
        sources.add_message(message("2"));
        sources.fail_delete_of(SourceKind::Message, "2");

        let outcome = sources
            .bulk_delete(
                SourceKind::Message,
                &["1".to_string(), "2".to_string(), "3".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(outcome.success_ids, vec!["1".to_string()]);
        assert_eq!(outcome.failed_ids, vec!["2".to_string(), "3".to_string()]);
        assert_eq!(sources.collections().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_delete_only_for_messages() {
        let sources = InMemorySources::new();
        assert!(
            sources
                .bulk_delete(SourceKind::Material, &["1".to_string()])
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_list_failure_injection() {
        let sources = InMemorySources::new();
        sources.set_list_failure(SourceKind::Scheduled, true);
        assert!(sources.list_scheduled().await.is_err());
        sources.set_list_failure(SourceKind::Scheduled, false);
        assert!(sources.list_scheduled().await.unwrap().is_empty());
    }

    #[test]
    fn test_fixture_deserializes_with_missing_collections() {
        let raw = r#"{"messages":[{"id":"m1","created_at":"2026-01-10T08:00:00Z"}]}"#;
        let collections: SourceCollections = serde_json::from_str(raw).unwrap();
        assert_eq!(collections.messages.len(), 1);
        assert!(collections.messages[0].sender_name.is_none());
        assert!(collections.scheduled.is_empty());
    }
}

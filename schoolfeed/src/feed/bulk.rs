//! Deletes across heterogeneous source collections.
//!
//! Ids are grouped by source kind. Kinds with a bulk primitive get one call
//! per group, the others one concurrent call per record, local notices need no
//! backend call at all. Failures are reported per id, never raised.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{NotificationItem, SourceKind, split_notification_id};
use crate::source::SourceAdapter;

/// Outcome of one bulk delete, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteResult {
    pub success_ids: Vec<String>,
    pub failed_ids: Vec<String>,
}

impl BulkDeleteResult {
    pub fn is_complete_success(&self) -> bool {
        self.failed_ids.is_empty()
    }
}

/// A feed id resolved to the collection record it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTarget {
    pub id: String,
    pub kind: SourceKind,
    pub record_id: String,
}

impl DeleteTarget {
    /// Resolve `id`, preferring the resident item over parsing the id.
    pub fn resolve(id: &str, resident: Option<&NotificationItem>) -> Option<Self> {
        if let Some(item) = resident {
            return Some(Self {
                id: id.to_string(),
                kind: item.kind,
                record_id: item.record_id().to_string(),
            });
        }

        let (kind, record_id) = split_notification_id(id)?;
        Some(Self {
            id: id.to_string(),
            kind,
            record_id: record_id.to_string(),
        })
    }
}

/// Delete one target. Returns whether the record is gone.
pub async fn delete_one(adapter: &dyn SourceAdapter, target: &DeleteTarget) -> bool {
    if !target.kind.is_backend() {
        return true;
    }

    match adapter.delete(target.kind, &target.record_id).await {
        Ok(true) => true,
        Ok(false) => {
            debug!(id = %target.id, "Backend refused delete");
            false
        }
        Err(e) => {
            warn!(id = %target.id, error = %e, "Delete failed");
            false
        }
    }
}

/// Delete every id, resolving them through `resident` first.
pub async fn delete_many<F>(
    adapter: &dyn SourceAdapter,
    ids: &[String],
    resident: F,
) -> BulkDeleteResult
where
    F: Fn(&str) -> Option<NotificationItem>,
{
    let mut outcome: HashMap<String, bool> = HashMap::with_capacity(ids.len());
    let mut groups: HashMap<SourceKind, Vec<DeleteTarget>> = HashMap::new();
    let mut seen = HashSet::with_capacity(ids.len());

    for id in ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        match DeleteTarget::resolve(id, resident(id.as_str()).as_ref()) {
            Some(target) => groups.entry(target.kind).or_default().push(target),
            None => {
                warn!(id = %id, "Cannot delete item with unknown source");
                outcome.insert(id.clone(), false);
            }
        }
    }

    let results = join_all(
        groups
            .into_iter()
            .map(|(kind, targets)| delete_group(adapter, kind, targets)),
    )
    .await;
    outcome.extend(results.into_iter().flatten());

    let mut result = BulkDeleteResult::default();
    let mut emitted = HashSet::with_capacity(ids.len());
    for id in ids {
        if !emitted.insert(id.as_str()) {
            continue;
        }
        if outcome.get(id).copied().unwrap_or(false) {
            result.success_ids.push(id.clone());
        } else {
            result.failed_ids.push(id.clone());
        }
    }
    result
}

async fn delete_group(
    adapter: &dyn SourceAdapter,
    kind: SourceKind,
    targets: Vec<DeleteTarget>,
) -> Vec<(String, bool)> {
    if !kind.is_backend() {
        return targets.into_iter().map(|t| (t.id, true)).collect();
    }

    if adapter.supports_bulk_delete(kind) {
        let record_ids: Vec<String> = targets.iter().map(|t| t.record_id.clone()).collect();
        return match adapter.bulk_delete(kind, &record_ids).await {
            Ok(bulk) => {
                let succeeded: HashSet<&str> =
                    bulk.success_ids.iter().map(String::as_str).collect();
                debug!(
                    kind = %kind,
                    succeeded = bulk.success_ids.len(),
                    failed = bulk.failed_ids.len(),
                    "Bulk delete finished"
                );
                targets
                    .into_iter()
                    .map(|t| {
                        let ok = succeeded.contains(t.record_id.as_str());
                        (t.id, ok)
                    })
                    .collect()
            }
            Err(e) => {
                warn!(kind = %kind, count = targets.len(), error = %e, "Bulk delete failed");
                targets.into_iter().map(|t| (t.id, false)).collect()
            }
        };
    }

    let outcomes = join_all(targets.iter().map(|t| delete_one(adapter, t))).await;
    targets
        .into_iter()
        .zip(outcomes)
        .map(|(t, ok)| (t.id, ok))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MaterialRecord, MessageRecord, ScheduledKind, ScheduledRecord};
    use crate::source::InMemorySources;
    use chrono::Utc;

    fn sources() -> InMemorySources {
        let sources = InMemorySources::new();
        let now = Utc::now();
        for id in ["1", "2", "3"] {
            sources.add_message(MessageRecord {
                id: id.to_string(),
                sender_name: None,
                subject: None,
                body: None,
                created_at: now,
            });
        }
        sources.add_scheduled(ScheduledRecord {
            id: "7".to_string(),
            kind: ScheduledKind::Assignment,
            title: None,
            subject_name: None,
            due_at: now,
            created_at: now,
        });
        sources.add_material(MaterialRecord {
            id: "9".to_string(),
            title: None,
            subject_name: None,
            description: None,
            published_at: now,
        });
        sources
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_parses_prefix() {
        let target = DeleteTarget::resolve("scheduled-a-b", None).unwrap();
        assert_eq!(target.kind, SourceKind::Scheduled);
        assert_eq!(target.record_id, "a-b");
        assert!(DeleteTarget::resolve("grade-1", None).is_none());
        assert!(DeleteTarget::resolve("nodash", None).is_none());
    }

    #[tokio::test]
    async fn test_partial_failure() {
        let sources = sources();
        sources.fail_delete_of(SourceKind::Message, "3");

        let result =
            delete_many(&sources, &ids(&["message-1", "message-2", "message-3"]), |_| None).await;

        assert_eq!(result.success_ids, ids(&["message-1", "message-2"]));
        assert_eq!(result.failed_ids, ids(&["message-3"]));
        assert_eq!(sources.bulk_delete_calls(), 1);
        assert_eq!(sources.delete_calls(), 0);
    }

    #[tokio::test]
    async fn test_mixed_kinds_keep_input_order() {
        let sources = sources();

        let result = delete_many(
            &sources,
            &ids(&["material-9", "bogus-1", "message-1", "system-abc", "scheduled-7"]),
            |_| None,
        )
        .await;

        assert_eq!(
            result.success_ids,
            ids(&["material-9", "message-1", "system-abc", "scheduled-7"])
        );
        assert_eq!(result.failed_ids, ids(&["bogus-1"]));
        assert_eq!(sources.delete_calls(), 2);
        assert!(sources.collections().materials.is_empty());
    }

    struct BrokenBulk;

    #[async_trait::async_trait]
    impl SourceAdapter for BrokenBulk {
        async fn list_messages(&self) -> crate::Result<Vec<MessageRecord>> {
            Ok(Vec::new())
        }

        async fn list_scheduled(&self) -> crate::Result<Vec<ScheduledRecord>> {
            Ok(Vec::new())
        }

        async fn list_materials(&self) -> crate::Result<Vec<MaterialRecord>> {
            Ok(Vec::new())
        }

        async fn delete(&self, _kind: SourceKind, _record_id: &str) -> crate::Result<bool> {
            Ok(true)
        }

        fn supports_bulk_delete(&self, kind: SourceKind) -> bool {
            kind == SourceKind::Message
        }

        async fn bulk_delete(
            &self,
            kind: SourceKind,
            _record_ids: &[String],
        ) -> crate::Result<crate::source::BulkDeleteOutcome> {
            Err(crate::Error::source_failed(kind.tag(), "timeout"))
        }

        async fn register_viewed(&self, _kind: SourceKind, _record_id: &str) -> crate::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_bulk_call_fails_group() {
        let result = delete_many(
            &BrokenBulk,
            &ids(&["message-1", "scheduled-7", "message-2"]),
            |_| None,
        )
        .await;

        assert_eq!(result.success_ids, ids(&["scheduled-7"]));
        assert_eq!(result.failed_ids, ids(&["message-1", "message-2"]));
    }

    #[tokio::test]
    async fn test_missing_record_in_bulk_fails() {
        let sources = sources();
        let result = delete_many(&sources, &ids(&["message-1", "message-404"]), |_| None).await;
        assert_eq!(result.success_ids, ids(&["message-1"]));
        assert_eq!(result.failed_ids, ids(&["message-404"]));
    }

    #[tokio::test]
    async fn test_duplicate_ids_reported_once() {
        let sources = sources();
        let result = delete_many(&sources, &ids(&["message-2", "message-2"]), |_| None).await;
        assert_eq!(result.success_ids, ids(&["message-2"]));
        assert!(result.is_complete_success());
    }

    #[tokio::test]
    async fn test_delete_one() {
        let sources = sources();
        let target = DeleteTarget::resolve("scheduled-7", None).unwrap();
        assert!(delete_one(&sources, &target).await);
        assert!(!delete_one(&sources, &target).await);
    }
}

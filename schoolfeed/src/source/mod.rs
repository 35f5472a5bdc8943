//! Source collections adapter.
//!
//! The feed consumes three backend collections (messages, scheduled items and
//! materials) through the [`SourceAdapter`] port. Implementations talk to the
//! real backend; [`InMemorySources`] backs the demo binary and the tests.

mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{MaterialRecord, MessageRecord, ScheduledRecord, SourceKind};
use crate::{Error, Result};

pub use memory::{InMemorySources, SourceCollections};

/// Per-record outcome of a bulk delete issued against one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteOutcome {
    pub success_ids: Vec<String>,
    pub failed_ids: Vec<String>,
}

/// Access to the backend source collections.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn list_messages(&self) -> Result<Vec<MessageRecord>>;
    async fn list_scheduled(&self) -> Result<Vec<ScheduledRecord>>;
    async fn list_materials(&self) -> Result<Vec<MaterialRecord>>;

    /// Delete one record. `Ok(false)` means the backend refused the delete.
    async fn delete(&self, kind: SourceKind, record_id: &str) -> Result<bool>;

    /// Whether `kind` offers a bulk delete primitive.
    fn supports_bulk_delete(&self, _kind: SourceKind) -> bool {
        false
    }

    async fn bulk_delete(
        &self,
        kind: SourceKind,
        _record_ids: &[String],
    ) -> Result<BulkDeleteOutcome> {
        Err(Error::Unsupported(format!("bulk delete of {kind} records")))
    }

    /// Best-effort "viewed" signal for a record.
    async fn register_viewed(&self, kind: SourceKind, record_id: &str) -> Result<()>;

    fn is_connected(&self) -> bool {
        true
    }
}

//! The notification feed service.
//!
//! One [`FeedService`] serves one identity session. It owns the published
//! feed, runs the refresh pipeline, applies read-state mutations and deletes,
//! and turns live change events into debounced refreshes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::bulk::{self, BulkDeleteResult, DeleteTarget};
use super::cache::{FEED_SLOT, FeedCache};
use super::debounce::{AdaptiveDebouncer, DebounceDecision, PendingTimer};
use super::events::{ChangeEvent, DEFAULT_CHANNEL_CAPACITY, FeedEvent, LiveEvents};
use super::normalizer::normalize;
use super::read_state::ReadStateStore;
use super::{diff, retention, snapshot};
use crate::Result;
use crate::config::{FeatureFlags, FeedConfig};
use crate::domain::{
    NotificationItem, Priority, SourceKind, SourceRecord, SystemNotice, notification_id,
    sort_newest_first,
};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::source::SourceAdapter;
use crate::storage::KeyValueStore;

/// Published list plus its id index.
#[derive(Default)]
struct PublishedFeed {
    items: Arc<Vec<NotificationItem>>,
    index: HashMap<String, usize>,
}

impl PublishedFeed {
    fn replace(&mut self, items: Vec<NotificationItem>) {
        self.index = items
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.id.clone(), pos))
            .collect();
        self.items = Arc::new(items);
    }

    fn get(&self, id: &str) -> Option<&NotificationItem> {
        self.index.get(id).map(|&pos| &self.items[pos])
    }

    fn unread(&self) -> usize {
        self.items.iter().filter(|item| !item.read).count()
    }
}

/// Result of dropping ids from local state.
#[derive(Debug, Default)]
struct LocalRemoval {
    /// Ids that were in the published feed.
    removed: Vec<String>,
    read_state_changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitOutcome {
    Published,
    Suppressed,
    /// The session changed while the candidate was being computed.
    Stale,
}

struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The notification feed service.
pub struct FeedService {
    config: FeedConfig,
    adapter: Arc<dyn SourceAdapter>,
    store: Arc<dyn KeyValueStore>,
    live_events: Arc<dyn LiveEvents>,
    flags: Arc<dyn FeatureFlags>,

    read_state: ReadStateStore,
    cache: FeedCache,
    metrics: MetricsCollector,
    published: RwLock<PublishedFeed>,
    notices: RwLock<Vec<SystemNotice>>,

    debouncer: Mutex<AdaptiveDebouncer>,
    timer: PendingTimer,
    refresh_lock: tokio::sync::Mutex<()>,
    snapshot_lock: tokio::sync::Mutex<()>,
    last_fetch: Mutex<Option<Instant>>,
    loading: AtomicBool,
    /// Bumped whenever the session is reset, so stale refreshes are dropped.
    generation: AtomicU64,

    event_tx: broadcast::Sender<FeedEvent>,
    cancellation_token: CancellationToken,
    session_token: Mutex<CancellationToken>,
    this: Weak<FeedService>,
}

impl FeedService {
    /// Create a new feed service. Call [`FeedService::start`] to load state.
    pub fn new(
        config: FeedConfig,
        adapter: Arc<dyn SourceAdapter>,
        store: Arc<dyn KeyValueStore>,
        live_events: Arc<dyn LiveEvents>,
        flags: Arc<dyn FeatureFlags>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        let cancellation_token = CancellationToken::new();
        let session_token = cancellation_token.child_token();

        Arc::new_cyclic(|this| Self {
            read_state: ReadStateStore::new(store.clone()),
            cache: FeedCache::with_ttl(config.cache.ttl()),
            metrics: MetricsCollector::new(),
            published: RwLock::new(PublishedFeed::default()),
            notices: RwLock::new(Vec::new()),
            debouncer: Mutex::new(AdaptiveDebouncer::new(config.debounce.clone())),
            timer: PendingTimer::new(),
            refresh_lock: tokio::sync::Mutex::new(()),
            snapshot_lock: tokio::sync::Mutex::new(()),
            last_fetch: Mutex::new(None),
            loading: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            event_tx,
            cancellation_token,
            session_token: Mutex::new(session_token),
            this: this.clone(),
            config,
            adapter,
            store,
            live_events,
            flags,
        })
    }

    // ========== Lifecycle ==========

    /// Start a session for `user_id` (`None` for an anonymous session).
    ///
    /// Rehydrates read state, shows the recovery snapshot, subscribes to live
    /// events and runs the first refresh.
    pub async fn start(&self, user_id: Option<&str>) {
        info!(user_id = ?user_id, backend = self.store.backend_name(), "Starting feed session");

        self.read_state.load(user_id).await;
        if let Some(user_id) = user_id {
            self.bootstrap_from_snapshot(user_id).await;
        }
        self.listen_for_changes();
        self.refresh().await;
    }

    /// Tear down the current session and start one for `user_id`.
    pub async fn switch_identity(&self, user_id: Option<&str>) {
        info!(user_id = ?user_id, "Switching feed identity");
        self.end_session();
        self.clear_published();
        self.cache.invalidate_all();
        self.start(user_id).await;
    }

    /// Stop listening for live events and cancel the pending refresh timer.
    pub fn shutdown(&self) {
        info!("Stopping feed service");
        self.cancellation_token.cancel();
        self.timer.cancel();
    }

    fn end_session(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let fresh = self.cancellation_token.child_token();
        let previous = std::mem::replace(&mut *self.session_token.lock(), fresh);
        previous.cancel();
        self.timer.cancel();
        self.debouncer.lock().reset();
        *self.last_fetch.lock() = None;
    }

    fn listen_for_changes(&self) {
        let token = self.session_token.lock().clone();
        if token.is_cancelled() {
            return;
        }

        for kind in SourceKind::BACKEND {
            let mut rx = self.live_events.subscribe(kind);
            let service = self.this.clone();
            let token = token.clone();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            debug!(kind = %kind, "Change listener shutting down");
                            break;
                        }
                        result = rx.recv() => {
                            match result {
                                Ok(event) => {
                                    let Some(service) = service.upgrade() else {
                                        break;
                                    };
                                    service.on_change_event(event);
                                }
                                Err(broadcast::error::RecvError::Lagged(n)) => {
                                    warn!(kind = %kind, "Change listener lagged by {} events", n);
                                }
                                Err(broadcast::error::RecvError::Closed) => {
                                    debug!(kind = %kind, "Change event channel closed");
                                    break;
                                }
                            }
                        }
                    }
                }
            });
        }
    }

    async fn bootstrap_from_snapshot(&self, user_id: &str) {
        if !self.flags.feed_enabled() {
            return;
        }
        let Some(snapshot) = snapshot::load(self.store.as_ref(), user_id).await else {
            return;
        };

        let generation = self.generation.load(Ordering::SeqCst);
        let now = Utc::now();
        let mut items = snapshot.items;
        for item in &mut items {
            if let SourceRecord::Scheduled(record) = &item.data {
                item.priority = Priority::for_due_date(record.due_at, now);
            }
        }
        sort_newest_first(&mut items);
        retention::apply(&mut items, &self.config.retention, now);

        if self.commit(items, generation) == CommitOutcome::Published {
            info!(user_id = %user_id, "Feed restored from snapshot");
        }
    }

    // ========== Read Accessors ==========

    /// The published feed, newest first.
    pub fn notifications(&self) -> Arc<Vec<NotificationItem>> {
        self.published.read().items.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.published.read().unread()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn is_read(&self, id: &str) -> bool {
        self.read_state.contains(id)
    }

    pub fn user_id(&self) -> Option<String> {
        self.read_state.user_id()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.event_tx.subscribe()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn item(&self, id: &str) -> Option<NotificationItem> {
        self.published.read().get(id).cloned()
    }

    fn emit(&self, event: FeedEvent) {
        debug!("Feed event: {}", event.description());
        // No receivers is fine.
        let _ = self.event_tx.send(event);
    }

    // ========== Refresh Pipeline ==========

    /// Refresh the feed. Never fails; errors keep the previous feed.
    ///
    /// A no-op within the minimum fetch interval of the last fetch, or while
    /// another refresh is in flight.
    pub async fn refresh(&self) {
        self.run_refresh(false).await;
    }

    /// Refresh regardless of the fetch throttle, waiting for any refresh in
    /// flight.
    async fn force_refresh(&self) {
        self.run_refresh(true).await;
    }

    async fn run_refresh(&self, force: bool) {
        if !self.flags.feed_enabled() {
            debug!("Feed disabled, clearing");
            self.cache.invalidate(FEED_SLOT);
            self.clear_published();
            return;
        }

        // Fresh cache entries bypass the fetch throttle.
        let cached = self.cache.get(FEED_SLOT);
        if cached.is_none() && !force && self.is_throttled() {
            debug!("Refresh throttled");
            self.metrics.record_throttled();
            return;
        }

        let _guard = if force {
            self.refresh_lock.lock().await
        } else {
            match self.refresh_lock.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    debug!("Refresh already in flight, coalescing");
                    return;
                }
            }
        };
        let _loading = LoadingGuard::new(&self.loading);
        let generation = self.generation.load(Ordering::SeqCst);

        let candidate = match cached {
            Some(cached) => {
                self.metrics.record_cache_hit();
                debug!(count = cached.len(), "Serving feed from cache");
                cached
            }
            None => {
                self.metrics.record_cache_miss();
                match self.fetch_feed().await {
                    Ok(items) => {
                        let items = Arc::new(items);
                        self.cache.insert(FEED_SLOT, items.clone());
                        *self.last_fetch.lock() = Some(Instant::now());
                        items
                    }
                    Err(e) => {
                        warn!(error = %e, "Feed refresh failed, keeping previous feed");
                        self.metrics.record_refresh_failure();
                        return;
                    }
                }
            }
        };

        let outcome = self.commit(candidate.as_ref().clone(), generation);
        if outcome == CommitOutcome::Stale {
            debug!("Discarding refresh of a previous session");
            return;
        }

        self.debouncer.lock().record_refresh(Instant::now());
        self.metrics
            .record_refresh(outcome == CommitOutcome::Published);

        if outcome == CommitOutcome::Published {
            self.persist_snapshot().await;
        }
    }

    fn is_throttled(&self) -> bool {
        let interval = self.config.refresh.min_fetch_interval();
        self.last_fetch
            .lock()
            .is_some_and(|last| last.elapsed() < interval)
    }

    /// Fetch, normalize, merge, sort and trim the feed.
    async fn fetch_feed(&self) -> Result<Vec<NotificationItem>> {
        let (messages, scheduled, materials) = tokio::try_join!(
            self.adapter.list_messages(),
            self.adapter.list_scheduled(),
            self.adapter.list_materials(),
        )?;

        let now = Utc::now();
        let notices = self.notices.read().clone();
        let records = messages
            .into_iter()
            .map(SourceRecord::Message)
            .chain(scheduled.into_iter().map(SourceRecord::Scheduled))
            .chain(materials.into_iter().map(SourceRecord::Material))
            .chain(notices.into_iter().map(SourceRecord::System));

        // Duplicate ids collapse to the last one seen.
        let mut by_id: HashMap<String, NotificationItem> = HashMap::new();
        for record in records {
            let item = normalize(record, now);
            by_id.insert(item.id.clone(), item);
        }

        let mut items: Vec<NotificationItem> = by_id.into_values().collect();
        sort_newest_first(&mut items);
        let dropped = retention::apply(&mut items, &self.config.retention, now);
        debug!(count = items.len(), dropped, "Feed computed");

        Ok(items)
    }

    /// Annotate read flags and publish `candidate` unless it equals the
    /// published feed.
    fn commit(&self, mut candidate: Vec<NotificationItem>, generation: u64) -> CommitOutcome {
        let (count, unread) = {
            let mut published = self.published.write();
            if self.generation.load(Ordering::SeqCst) != generation {
                return CommitOutcome::Stale;
            }

            // Read flags come from the store as of now, not as of the fetch.
            for item in &mut candidate {
                item.read = self.read_state.contains(&item.id);
            }

            if !diff::has_changed(&published.items, &candidate) {
                debug!("Feed unchanged, suppressing update");
                return CommitOutcome::Suppressed;
            }

            published.replace(candidate);
            (published.items.len(), published.unread())
        };

        self.emit(FeedEvent::Published { count, unread });
        CommitOutcome::Published
    }

    fn clear_published(&self) {
        let was_empty = {
            let mut published = self.published.write();
            let was_empty = published.items.is_empty();
            published.replace(Vec::new());
            was_empty
        };
        if !was_empty {
            self.emit(FeedEvent::Cleared);
        }
    }

    async fn persist_snapshot(&self) {
        let _guard = self.snapshot_lock.lock().await;
        let Some(user_id) = self.read_state.user_id() else {
            return;
        };
        let items = self.notifications();
        snapshot::save(self.store.as_ref(), &user_id, &items).await;
    }

    // ========== Live Events ==========

    /// Feed one live change event to the adaptive debouncer.
    pub fn on_change_event(&self, event: ChangeEvent) {
        self.metrics.record_event();

        if !self.flags.live_sync_enabled() || !self.flags.feed_enabled() {
            debug!("Live sync disabled, ignoring: {}", event.description());
            self.metrics.record_event_ignored();
            return;
        }

        let decision = self.debouncer.lock().on_event(Instant::now());
        match decision {
            DebounceDecision::Ignored => {
                self.metrics.record_event_ignored();
            }
            DebounceDecision::Schedule { delay, burst } => {
                debug!(
                    burst,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling refresh for: {}",
                    event.description()
                );
                self.metrics.record_adaptive_delay(delay);

                let service = self.this.clone();
                self.timer.schedule(delay, async move {
                    if let Some(service) = service.upgrade() {
                        service.cache.invalidate(FEED_SLOT);
                        service.force_refresh().await;
                    }
                });
            }
        }
    }

    /// Whether a debounced refresh is waiting to fire.
    pub fn has_pending_refresh(&self) -> bool {
        self.timer.is_pending()
    }

    // ========== Read State ==========

    pub async fn mark_as_read(&self, id: &str) {
        let newly_read = self.read_state.insert(id);
        let resident = self.set_read_flags(std::slice::from_ref(&id), true);

        if newly_read || !resident.is_empty() {
            self.emit(FeedEvent::ReadStateChanged {
                ids: vec![id.to_string()],
                read: true,
            });
        }
        self.read_state.persist().await;

        for item in resident {
            self.register_viewed(&item);
        }
    }

    pub async fn mark_as_unread(&self, id: &str) {
        let was_read = self.read_state.remove(id);
        let changed = self.set_read_flags(std::slice::from_ref(&id), false);

        if was_read || !changed.is_empty() {
            self.emit(FeedEvent::ReadStateChanged {
                ids: vec![id.to_string()],
                read: false,
            });
        }
        self.read_state.persist().await;
    }

    /// Mark every published item as read. Sends no viewed signals.
    pub async fn mark_all_as_read(&self) {
        let items = self.notifications();
        let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();

        self.read_state.insert_many(ids.iter().copied());
        let changed = self.set_read_flags(&ids, true);

        if !changed.is_empty() {
            self.emit(FeedEvent::ReadStateChanged {
                ids: changed.into_iter().map(|item| item.id).collect(),
                read: true,
            });
        }
        self.read_state.persist().await;
    }

    /// Set the read flag on resident items. Returns the items that changed.
    fn set_read_flags(&self, ids: &[&str], read: bool) -> Vec<NotificationItem> {
        let mut published = self.published.write();
        let positions: Vec<usize> = ids
            .iter()
            .filter_map(|id| published.index.get(*id).copied())
            .filter(|&pos| published.items[pos].read != read)
            .collect();
        if positions.is_empty() {
            return Vec::new();
        }

        let items = Arc::make_mut(&mut published.items);
        positions
            .into_iter()
            .map(|pos| {
                items[pos].read = read;
                items[pos].clone()
            })
            .collect()
    }

    fn register_viewed(&self, item: &NotificationItem) {
        if !item.kind.is_backend() || !self.adapter.is_connected() {
            return;
        }

        let adapter = self.adapter.clone();
        let kind = item.kind;
        let record_id = item.record_id().to_string();
        tokio::spawn(async move {
            if let Err(e) = adapter.register_viewed(kind, &record_id).await {
                debug!(kind = %kind, record_id = %record_id, error = %e, "Viewed signal failed");
            }
        });
    }

    // ========== Removal and Deletes ==========

    /// Remove an item from the local feed only.
    pub async fn remove_by_id(&self, id: &str) -> bool {
        let removal = self.remove_local(&[id.to_string()]);
        if removal.removed.is_empty() {
            // Nothing resident, but a stored read flag may still have been dropped.
            if removal.read_state_changed {
                self.read_state.persist().await;
            }
            return false;
        }
        self.persist_after_removal().await;
        true
    }

    /// Delete one item at its source. Returns whether the delete succeeded.
    pub async fn delete_by_id(&self, id: &str) -> bool {
        let Some(target) = DeleteTarget::resolve(id, self.item(id).as_ref()) else {
            warn!(id = %id, "Cannot delete item with unknown source");
            self.metrics.record_deletes(0, 1);
            return false;
        };

        let deleted = bulk::delete_one(self.adapter.as_ref(), &target).await;
        if deleted {
            self.metrics.record_deletes(1, 0);
            self.remove_local(&[id.to_string()]);
            self.persist_after_removal().await;
        } else {
            self.metrics.record_deletes(0, 1);
        }
        deleted
    }

    /// Delete many items across source kinds, then refresh.
    pub async fn bulk_delete(&self, ids: &[String]) -> BulkDeleteResult {
        if ids.is_empty() {
            return BulkDeleteResult::default();
        }

        let result = bulk::delete_many(self.adapter.as_ref(), ids, |id| self.item(id)).await;
        info!(
            succeeded = result.success_ids.len(),
            failed = result.failed_ids.len(),
            "Bulk delete finished"
        );
        self.metrics
            .record_deletes(result.success_ids.len(), result.failed_ids.len());

        self.remove_local(&result.success_ids);
        self.persist_after_removal().await;
        self.force_refresh().await;

        result
    }

    /// Delete every item currently marked read.
    pub async fn delete_read(&self) -> BulkDeleteResult {
        let ids: Vec<String> = self
            .notifications()
            .iter()
            .filter(|item| item.read)
            .map(|item| item.id.clone())
            .collect();
        self.bulk_delete(&ids).await
    }

    /// Drop items from the published feed, read state and local notices.
    fn remove_local(&self, ids: &[String]) -> LocalRemoval {
        if ids.is_empty() {
            return LocalRemoval::default();
        }
        let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();

        let removed: Vec<String> = {
            let mut published = self.published.write();
            let (removed, kept): (Vec<NotificationItem>, Vec<NotificationItem>) = published
                .items
                .iter()
                .cloned()
                .partition(|item| targets.contains(item.id.as_str()));
            if !removed.is_empty() {
                published.replace(kept);
            }
            removed.into_iter().map(|item| item.id).collect()
        };

        let read_state_changed = self.read_state.remove_many(targets.iter().copied()) > 0;
        self.notices.write().retain(|notice| {
            let id = notification_id(SourceKind::System, &notice.id);
            !targets.contains(id.as_str())
        });
        self.cache.invalidate(FEED_SLOT);

        if !removed.is_empty() {
            self.emit(FeedEvent::Removed {
                ids: removed.clone(),
            });
        }
        LocalRemoval {
            removed,
            read_state_changed,
        }
    }

    async fn persist_after_removal(&self) {
        self.read_state.persist().await;
        self.persist_snapshot().await;
    }

    // ========== System Notices ==========

    /// Add a local-only notice to the feed. Returns its feed id.
    pub fn post_system_notice(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> String {
        let notice = SystemNotice {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            message: message.into(),
            created_at: Utc::now(),
        };
        self.notices.write().push(notice.clone());
        self.cache.invalidate(FEED_SLOT);

        let now = Utc::now();
        let mut item = normalize(SourceRecord::System(notice), now);
        item.read = self.read_state.contains(&item.id);
        let id = item.id.clone();

        if !self.flags.feed_enabled() {
            debug!(id = %id, "Feed disabled, notice queued for the next refresh");
            return id;
        }

        let (count, unread) = {
            let mut published = self.published.write();
            let mut items = published.items.as_ref().clone();
            items.push(item);
            sort_newest_first(&mut items);
            retention::apply(&mut items, &self.config.retention, now);
            published.replace(items);
            (published.items.len(), published.unread())
        };
        info!(id = %id, "System notice posted");
        self.emit(FeedEvent::Published { count, unread });

        id
    }

    // ========== Reset ==========

    /// Forget everything: metrics, cache, feed, notices and persisted state.
    pub async fn reset_all(&self) {
        info!("Resetting feed state");
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.timer.cancel();
        self.debouncer.lock().reset();
        *self.last_fetch.lock() = None;

        self.metrics.reset();
        self.cache.invalidate_all();
        self.notices.write().clear();
        self.read_state.clear();
        {
            let mut published = self.published.write();
            published.replace(Vec::new());
        }
        self.emit(FeedEvent::Cleared);

        self.read_state.clear_persisted().await;
        if let Some(user_id) = self.read_state.user_id() {
            let _guard = self.snapshot_lock.lock().await;
            snapshot::clear(self.store.as_ref(), &user_id).await;
        }
    }
}

impl Drop for FeedService {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

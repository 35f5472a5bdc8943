//! Notification feed engine.
//!
//! The refresh pipeline runs adapter fetch, normalization, merge and sort,
//! retention, cache write and the diff gate before publishing. Mutations act
//! on the published feed and the read-state store directly.

pub mod bulk;
pub mod cache;
pub mod debounce;
pub mod diff;
pub mod events;
pub mod normalizer;
pub mod read_state;
pub mod retention;
pub mod service;
pub mod snapshot;

pub use bulk::BulkDeleteResult;
pub use cache::{FEED_SLOT, FeedCache};
pub use debounce::{AdaptiveDebouncer, DebounceDecision, PendingTimer};
pub use events::{ChangeAction, ChangeEvent, ChangeEventBroadcaster, FeedEvent, LiveEvents};
pub use read_state::ReadStateStore;
pub use service::FeedService;

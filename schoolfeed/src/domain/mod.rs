//! Domain types shared across the feed engine.

pub mod item;
pub mod priority;
pub mod source;

pub use item::{NotificationItem, sort_newest_first};
pub use priority::Priority;
pub use source::{
    Category, MaterialRecord, MessageRecord, ScheduledKind, ScheduledRecord, SourceKind,
    SourceRecord, SystemNotice, notification_id, split_notification_id,
};

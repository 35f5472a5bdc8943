//! Conversion of raw source records into feed items.

use chrono::{DateTime, Utc};

use crate::domain::{
    MaterialRecord, MessageRecord, NotificationItem, Priority, ScheduledRecord, SourceRecord,
    SystemNotice, notification_id,
};

/// Build the feed item for `record`.
///
/// Never fails: absent optional fields render as empty strings. `now` is the
/// reference instant for the priority of date-bearing records.
pub fn normalize(record: SourceRecord, now: DateTime<Utc>) -> NotificationItem {
    let kind = record.kind();
    let (title, message, timestamp, priority) = match &record {
        SourceRecord::Message(r) => message_fields(r),
        SourceRecord::Scheduled(r) => scheduled_fields(r, now),
        SourceRecord::Material(r) => material_fields(r),
        SourceRecord::System(r) => system_fields(r),
    };

    NotificationItem {
        id: notification_id(kind, record.record_id()),
        kind,
        title,
        message,
        timestamp,
        read: false,
        priority,
        category: kind.category(),
        data: record,
    }
}

type Fields = (String, String, DateTime<Utc>, Priority);

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

fn message_fields(r: &MessageRecord) -> Fields {
    let title = format!("Message from {}", text(&r.sender_name));
    let message = match text(&r.subject) {
        "" => text(&r.body).to_string(),
        subject => subject.to_string(),
    };
    (title, message, r.created_at, Priority::Normal)
}

fn scheduled_fields(r: &ScheduledRecord, now: DateTime<Utc>) -> Fields {
    let title = format!("New {}: {}", r.kind.label(), text(&r.title));
    let message = format!(
        "{}, due {}",
        text(&r.subject_name),
        r.due_at.format("%Y-%m-%d")
    );
    (
        title,
        message,
        r.created_at,
        Priority::for_due_date(r.due_at, now),
    )
}

fn material_fields(r: &MaterialRecord) -> Fields {
    let title = format!("New material: {}", text(&r.title));
    let message = match text(&r.description) {
        "" => text(&r.subject_name).to_string(),
        description => format!("{}: {}", text(&r.subject_name), description),
    };
    (title, message, r.published_at, Priority::Normal)
}

fn system_fields(r: &SystemNotice) -> Fields {
    (
        r.title.clone(),
        r.message.clone(),
        r.created_at,
        Priority::Normal,
    )
}

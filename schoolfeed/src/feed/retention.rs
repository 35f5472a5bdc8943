//! Retention limits for the published feed.

use chrono::{DateTime, Utc};

use crate::config::RetentionConfig;
use crate::domain::NotificationItem;

/// Apply the age cap, then the count cap, to a list sorted newest first.
///
/// Every item is measured against the same `now`. Returns how many items were
/// dropped.
pub fn apply(
    items: &mut Vec<NotificationItem>,
    config: &RetentionConfig,
    now: DateTime<Utc>,
) -> usize {
    let before = items.len();
    let max_age = config.max_age();

    items.retain(|item| item.age(now) <= max_age);
    items.truncate(config.max_items);

    before - items.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SourceRecord, SystemNotice, sort_newest_first};
    use crate::feed::normalizer::normalize;
    use chrono::Duration;

    fn item(id: usize, timestamp: DateTime<Utc>) -> NotificationItem {
        let notice = SystemNotice {
            id: id.to_string(),
            title: String::new(),
            message: String::new(),
            created_at: timestamp,
        };
        normalize(SourceRecord::System(notice), timestamp)
    }

    #[test]
    fn test_count_cap_keeps_most_recent() {
        let now = Utc::now();
        let mut items: Vec<_> = (0..600)
            .map(|i| item(i, now - Duration::minutes(i as i64)))
            .collect();
        sort_newest_first(&mut items);

        let dropped = apply(&mut items, &RetentionConfig::default(), now);

        assert_eq!(dropped, 100);
        assert_eq!(items.len(), 500);
        assert_eq!(items[0].id, "system-0");
        assert_eq!(items[499].id, "system-499");
    }

    #[test]
    fn test_age_cap_before_count_cap() {
        let now = Utc::now();
        let mut items: Vec<_> = (0..=120)
            .map(|day| item(day, now - Duration::days(day as i64)))
            .collect();
        sort_newest_first(&mut items);

        apply(&mut items, &RetentionConfig::default(), now);

        assert_eq!(items.len(), 91);
        assert!(items.iter().all(|i| i.age(now) <= Duration::days(90)));
    }

    #[test]
    fn test_small_count_cap() {
        let now = Utc::now();
        let mut items: Vec<_> = (0..10).map(|i| item(i, now)).collect();
        let config = RetentionConfig {
            max_items: 3,
            max_age_days: 1,
        };

        assert_eq!(apply(&mut items, &config, now), 7);
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_out_of_range_age_keeps_everything() {
        let now = Utc::now();
        let mut items: Vec<_> = (0..5)
            .map(|i| item(i, now - Duration::days(365 * i as i64)))
            .collect();
        let config = RetentionConfig {
            max_items: 500,
            max_age_days: 9_000_000_000_000,
        };

        assert_eq!(apply(&mut items, &config, now), 0);
        assert_eq!(items.len(), 5);
    }
}

//! Priority value object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Priority level of a feed item.
///
/// Only date-bearing items (assignments and tests) get a computed priority;
/// everything else stays at [`Priority::Normal`]. Variants are ordered from
/// least to most pressing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// More than a week away.
    Low,
    #[default]
    Normal,
    /// Due within three days.
    High,
    /// Due within a day, or overdue.
    Urgent,
}

impl Priority {
    /// Map a whole-day distance to a priority level.
    fn from_days_until(days: i64) -> Self {
        match days {
            d if d <= 1 => Self::Urgent,
            d if d <= 3 => Self::High,
            d if d <= 7 => Self::Normal,
            _ => Self::Low,
        }
    }

    /// Priority of an item due at `due`, seen from `now`.
    pub fn for_due_date(due: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::from_days_until(days_until_ceil(due, now))
    }
}

/// Whole days from `now` until `due`, rounded up.
fn days_until_ceil(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let diff_ms = due.signed_duration_since(now).num_milliseconds();
    -((-diff_ms).div_euclid(MILLIS_PER_DAY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn test_priority_default() {
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_priority_serde_names() {
        assert_eq!(serde_json::to_string(&Priority::Urgent).unwrap(), "\"urgent\"");
        let parsed: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(parsed, Priority::Low);
    }

    #[rstest]
    #[case(Duration::days(1), Priority::Urgent)]
    #[case(Duration::hours(3), Priority::Urgent)]
    #[case(Duration::days(-2), Priority::Urgent)]
    #[case(Duration::days(1) + Duration::minutes(1), Priority::High)]
    #[case(Duration::days(3), Priority::High)]
    #[case(Duration::days(5), Priority::Normal)]
    #[case(Duration::days(7), Priority::Normal)]
    #[case(Duration::days(8), Priority::Low)]
    #[case(Duration::days(30), Priority::Low)]
    fn test_priority_for_due_date(#[case] offset: Duration, #[case] expected: Priority) {
        let now = Utc::now();
        assert_eq!(Priority::for_due_date(now + offset, now), expected);
    }

    #[test]
    fn test_days_until_rounds_up() {
        let now = Utc::now();
        assert_eq!(days_until_ceil(now + Duration::hours(25), now), 2);
        assert_eq!(days_until_ceil(now, now), 0);
        assert_eq!(days_until_ceil(now - Duration::hours(25), now), -1);
    }
}

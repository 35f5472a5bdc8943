mod common;

use std::time::Duration;

use chrono::Utc;
use common::{Harness, eager_config, message};
use schoolfeed::domain::SourceKind;
use schoolfeed::feed::{ChangeAction, ChangeEvent};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn insert_event(id: &str) -> ChangeEvent {
    ChangeEvent::new(SourceKind::Message, ChangeAction::Insert, id)
}

#[tokio::test(start_paused = true)]
async fn test_isolated_event_uses_base_delay() {
    let h = Harness::new(eager_config());
    h.service.start(None).await;
    tokio::time::advance(ms(1_500)).await;

    h.sources.add_message(message("1", Utc::now()));
    h.service.on_change_event(insert_event("1"));

    assert_eq!(h.service.metrics().adaptive_delay_ms, 300);
    assert!(h.service.has_pending_refresh());

    tokio::time::sleep(ms(299)).await;
    assert!(h.service.notifications().is_empty());

    tokio::time::sleep(ms(50)).await;
    assert_eq!(h.ids(), vec!["message-1".to_string()]);
    assert!(!h.service.has_pending_refresh());
}

#[tokio::test(start_paused = true)]
async fn test_burst_grows_delay_and_collapses_refreshes() {
    let h = Harness::new(eager_config());
    h.service.start(None).await;
    tokio::time::advance(ms(1_500)).await;
    let fetches = h.sources.fetch_count();

    for i in 0..5 {
        h.sources.add_message(message(&i.to_string(), Utc::now()));
        h.service.on_change_event(insert_event(&i.to_string()));
    }

    let delay = h.service.metrics().adaptive_delay_ms;
    assert!(delay > 300);
    assert!(delay <= 2_000);
    assert_eq!(delay, 1_100);

    tokio::time::sleep(ms(1_200)).await;
    assert_eq!(h.sources.fetch_count(), fetches + 1);
    assert_eq!(h.service.notifications().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_event_right_after_refresh_is_ignored() {
    let h = Harness::new(eager_config());
    h.service.start(None).await;

    h.service.on_change_event(insert_event("1"));

    let metrics = h.service.metrics();
    assert_eq!(metrics.events_received, 1);
    assert_eq!(metrics.events_ignored, 1);
    assert!(!h.service.has_pending_refresh());
}

#[tokio::test(start_paused = true)]
async fn test_live_sync_disabled_ignores_events() {
    let h = Harness::new(eager_config());
    h.service.start(None).await;
    tokio::time::advance(ms(1_500)).await;
    h.flags.set_live_sync_enabled(false);

    h.sources.add_message(message("1", Utc::now()));
    h.service.on_change_event(insert_event("1"));
    tokio::time::sleep(ms(3_000)).await;

    assert!(h.service.notifications().is_empty());
    assert_eq!(h.service.metrics().events_ignored, 1);

    // Manual refresh still works.
    h.service.refresh().await;
    assert_eq!(h.service.notifications().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_broadcast_events_reach_the_service() {
    let h = Harness::new(eager_config());
    h.service.start(None).await;
    tokio::time::advance(ms(1_500)).await;
    assert_eq!(h.live.subscriber_count(SourceKind::Message), 1);

    h.sources.add_message(message("7", Utc::now()));
    h.live.publish(insert_event("7"));

    tokio::time::sleep(ms(400)).await;
    assert_eq!(h.ids(), vec!["message-7".to_string()]);
    assert_eq!(h.service.metrics().events_received, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_unsubscribes_and_cancels_timer() {
    let h = Harness::new(eager_config());
    h.service.start(None).await;
    tokio::time::advance(ms(1_500)).await;

    h.service.on_change_event(insert_event("1"));
    assert!(h.service.has_pending_refresh());

    h.service.shutdown();
    tokio::time::sleep(ms(10)).await;

    assert!(!h.service.has_pending_refresh());
    assert_eq!(h.live.subscriber_count(SourceKind::Message), 0);
}

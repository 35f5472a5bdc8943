//! Adaptive debounce of live change events.
//!
//! # Delay Algorithm
//!
//! - Events arriving less than `min_event_interval` after a completed refresh
//!   are ignored
//! - Otherwise the event joins a rolling window of `burst_window`
//! - delay = base + (events in window - 1) * step, capped at max
//! - Every accepted event replaces the pending timer

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::config::DebounceConfig;

/// Outcome of feeding one event to the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceDecision {
    /// Too close to the last refresh; nothing to do.
    Ignored,
    /// Reschedule the refresh timer.
    Schedule { delay: Duration, burst: usize },
}

/// Burst-aware delay calculator. Time is passed in by the caller.
#[derive(Debug, Clone)]
pub struct AdaptiveDebouncer {
    config: DebounceConfig,
    /// Instants of accepted events inside the burst window.
    events: VecDeque<Instant>,
    last_refresh: Option<Instant>,
}

impl AdaptiveDebouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            events: VecDeque::new(),
            last_refresh: None,
        }
    }

    pub fn record_refresh(&mut self, now: Instant) {
        self.last_refresh = Some(now);
    }

    pub fn on_event(&mut self, now: Instant) -> DebounceDecision {
        if let Some(last) = self.last_refresh
            && now.saturating_duration_since(last) < self.config.min_event_interval()
        {
            debug!("Change event right after a refresh, ignoring");
            return DebounceDecision::Ignored;
        }

        self.prune(now);
        self.events.push_back(now);

        let burst = self.events.len();
        let delay = self.calculate_delay(burst);
        debug!(burst, delay_ms = delay.as_millis() as u64, "Change event debounced");

        DebounceDecision::Schedule { delay, burst }
    }

    /// Number of accepted events inside the window ending at `now`.
    pub fn burst_count(&self, now: Instant) -> usize {
        let window = self.config.burst_window();
        self.events
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) < window)
            .count()
    }

    pub fn reset(&mut self) {
        self.events.clear();
        self.last_refresh = None;
    }

    fn prune(&mut self, now: Instant) {
        let window = self.config.burst_window();
        while let Some(&front) = self.events.front() {
            if now.saturating_duration_since(front) < window {
                break;
            }
            self.events.pop_front();
        }
    }

    fn calculate_delay(&self, burst: usize) -> Duration {
        let extra = burst.saturating_sub(1).min(u32::MAX as usize) as u32;
        let delay = self
            .config
            .base_delay()
            .saturating_add(self.config.step_delay().saturating_mul(extra));

        delay.min(self.config.max_delay())
    }
}

/// Single cancellable timer slot.
///
/// Scheduling replaces (aborts) the pending timer. A timer that already fired
/// hands its work to a separate task, so replacing it never cuts that work
/// short.
#[derive(Debug, Default)]
pub struct PendingTimer {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PendingTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(task);
        });

        if let Some(previous) = self.handle.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for PendingTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

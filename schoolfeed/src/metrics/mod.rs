//! Metrics module.
//!
//! Counts refresh cycles, suppressed updates, cache effectiveness and live
//! event handling, and records the last adaptive debounce delay.

mod collector;

pub use collector::{MetricsCollector, MetricsSnapshot};

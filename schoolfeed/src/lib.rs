//! schoolfeed library crate.
//!
//! Notification aggregation and synchronization engine for a school
//! dashboard: merges messages, scheduled work and shared materials into one
//! feed with durable read state.

pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod feed;
pub mod logging;
pub mod metrics;
pub mod source;
pub mod storage;
pub mod utils;

pub use error::{Error, Result};

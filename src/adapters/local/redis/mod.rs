//! Redis adapter for the shared job store.
//!
//! This module provides Redis-backed implementations of:
//! - `JobStore` for job records, statuses and active-task markers
//! - `NotificationChannel` over Redis pub/sub

mod pool;
mod pubsub;
mod store;

pub use pool::RedisPool;

/// Pattern matching every active-task marker.
const TASK_PATTERN: &str = "tasks:*";

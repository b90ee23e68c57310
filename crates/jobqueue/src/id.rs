//! Job identifier generation.
//!
//! The service never mints ids itself; it asks the [`IdGenerator`] it was
//! built with, so tests can swap in deterministic ids.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of unique job identifiers
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Monotonic counter, optionally combined with a timestamp
#[derive(Debug)]
pub struct SequentialIdGenerator {
    counter: AtomicU64,
    prefix: String,
    timestamped: bool,
}

impl SequentialIdGenerator {
    /// Ids of the form `job-<unix-nanos>-<n>`.
    pub fn timestamped() -> Self {
        Self {
            counter: AtomicU64::new(0),
            prefix: "job".to_string(),
            timestamped: true,
        }
    }

    /// Deterministic ids of the form `<prefix><n>`, starting at 1.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            counter: AtomicU64::new(0),
            prefix: prefix.into(),
            timestamped: false,
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::timestamped()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        if self.timestamped {
            let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
            format!("{}-{}-{}", self.prefix, nanos, n)
        } else {
            format!("{}{}", self.prefix, n)
        }
    }
}

/// Random v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

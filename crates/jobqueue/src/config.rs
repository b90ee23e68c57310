//! Queue configuration.
//!
//! Defaults match the historical deployment: five workers draining a queue
//! of 200 slots, three attempts per job and a 300ms linear backoff step.
//!
//! # Example
//!
//! ```rust
//! use jobqueue::QueueConfig;
//! use std::time::Duration;
//!
//! let config = QueueConfig::new()
//!     .workers(8)
//!     .backoff_base(Duration::from_millis(50));
//!
//! assert_eq!(config.backoff_for(2), Duration::from_millis(100));
//! ```

use crate::error::{JobError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the job service and its worker pool
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of concurrent workers, fixed for the lifetime of the service
    pub workers: usize,
    /// Capacity of the shared dispatch queue
    pub queue_capacity: usize,
    /// Attempt cap given to every new job
    pub max_attempts: u32,
    /// Backoff step; the delay after attempt `n` is `n * backoff_base`
    #[serde(rename = "backoff_base_ms", deserialize_with = "deserialize_millis")]
    pub backoff_base: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            queue_capacity: 200,
            max_attempts: 3,
            backoff_base: Duration::from_millis(300),
        }
    }
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn backoff_base(mut self, duration: Duration) -> Self {
        self.backoff_base = duration;
        self
    }

    /// Delay before the attempt following attempt number `attempt`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(JobError::ConfigError(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(JobError::ConfigError(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(JobError::ConfigError(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from `JOBQUEUE_`-prefixed environment variables.
    ///
    /// A `.env` file is loaded first if one exists. Unset variables keep
    /// their defaults, e.g. `JOBQUEUE_WORKERS=8` only changes the pool size.
    #[cfg(feature = "config")]
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let config = envy::prefixed("JOBQUEUE_")
            .from_env::<Self>()
            .map_err(|e| JobError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

fn deserialize_millis<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

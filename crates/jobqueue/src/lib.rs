//! In-process asynchronous job queue
//!
//! Callers submit named tasks to a [`JobService`]. A fixed pool of workers
//! drains a bounded queue, retrying failed attempts in place with a linear
//! backoff until each job completes or runs out of attempts. Job state lives
//! in a [`JobRepository`] and can be read back individually, by idempotency
//! token, in bulk, or as a [`JobStatusSummary`].
//!
//! # Example
//!
//! ```rust,no_run
//! use jobqueue::{JobService, JobStatus, QueueConfig};
//!
//! #[tokio::main]
//! async fn main() -> jobqueue::Result<()> {
//!     let service = JobService::new(QueueConfig::default())?;
//!
//!     let id = service.enqueue("normal-job").await?;
//!     if let Some(job) = service.get_job_by_id(&id).await? {
//!         println!("{} is {}", job.id, job.status);
//!     }
//!
//!     let summary = service.get_all_job_status().await;
//!     assert_eq!(summary.total(), 1);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod id;
pub mod job;
pub mod repository;
pub mod service;
pub mod telemetry;

pub use config::QueueConfig;
pub use error::{JobError, Result};
pub use executor::{FnExecutor, PolicyExecutor, TaskExecutor, TaskPolicy};
pub use id::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use job::{Job, JobStatus, JobStatusSummary};
pub use repository::memory::InMemoryRepository;
pub use repository::JobRepository;
pub use service::{JobService, JobServiceBuilder};

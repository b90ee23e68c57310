use crate::error::Result;
use crate::job::{Job, JobStatusSummary};
use async_trait::async_trait;

pub mod memory;

/// Storage for jobs, keyed by id with a secondary idempotency token index
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert or overwrite the job at its id.
    /// Also (re)writes the token index entry when the job carries a token.
    async fn save(&self, job: &Job) -> Result<()>;

    /// Overwrite a job that must already exist.
    /// Fails with `NotFound` when nothing is stored at that id yet.
    async fn update(&self, job: &Job) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Job>;

    /// Resolve token to id, then id to job
    async fn find_by_token(&self, token: &str) -> Result<Job>;

    /// Snapshot of every stored job, in no particular order
    async fn find_all(&self) -> Result<Vec<Job>>;

    /// Per-status counts over the current contents, computed fresh each call
    async fn status_summary(&self) -> Result<JobStatusSummary>;
}

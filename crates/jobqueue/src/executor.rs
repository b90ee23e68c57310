//! Task execution.
//!
//! Workers hand every attempt to a [`TaskExecutor`]. An `Err` return is an
//! execution failure; the worker records it and retries in place while the
//! job has attempts left. Executors never see the repository.

use crate::error::{JobError, Result};
use crate::job::Job;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Task name that fails its first two attempts in [`PolicyExecutor::reference`]
pub const UNSTABLE_TASK: &str = "unstable-job";

/// Runs one attempt of a job
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, job: &Job) -> Result<()>;

    /// Called once `job` has reached a terminal state and will not be
    /// executed again.
    async fn finish(&self, _job: &Job) {}
}

#[async_trait]
impl<T: TaskExecutor + ?Sized> TaskExecutor for Arc<T> {
    async fn execute(&self, job: &Job) -> Result<()> {
        (**self).execute(job).await
    }

    async fn finish(&self, job: &Job) {
        (**self).finish(job).await
    }
}

/// How a task kind behaves across attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskPolicy {
    /// Every attempt succeeds
    Succeed,
    /// Every attempt fails
    Fail,
    /// The first `n` attempts fail, later ones succeed
    FailTimes(u32),
    /// Attempt `n` succeeds iff the `n`th entry is `true`; attempts past the
    /// end succeed
    Sequence(Vec<bool>),
}

impl TaskPolicy {
    fn succeeds_on(&self, attempt: u32) -> bool {
        match self {
            Self::Succeed => true,
            Self::Fail => false,
            Self::FailTimes(n) => attempt > *n,
            Self::Sequence(outcomes) => {
                let index = attempt.saturating_sub(1) as usize;
                outcomes.get(index).copied().unwrap_or(true)
            }
        }
    }
}

/// Executor driven by a task-name-keyed policy table.
///
/// Unknown task names succeed. Attempts are counted per job id by the
/// executor itself, under a lock separate from the repository's. A job's
/// counter is dropped once the job finishes, so only in-flight jobs are
/// tracked.
#[derive(Debug, Default)]
pub struct PolicyExecutor {
    policies: HashMap<String, TaskPolicy>,
    calls: Mutex<HashMap<String, u32>>,
}

impl PolicyExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `unstable-job` fails twice then succeeds; everything else succeeds.
    pub fn reference() -> Self {
        Self::new().with_policy(UNSTABLE_TASK, TaskPolicy::FailTimes(2))
    }

    pub fn with_policy(mut self, task: impl Into<String>, policy: TaskPolicy) -> Self {
        self.policies.insert(task.into(), policy);
        self
    }

    /// Number of times an in-flight `job_id` has been executed so far.
    /// Zero once the job has finished.
    pub fn calls_for(&self, job_id: &str) -> u32 {
        self.calls
            .lock()
            .map(|calls| calls.get(job_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of jobs with a live counter
    pub fn tracked_jobs(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TaskExecutor for PolicyExecutor {
    async fn execute(&self, job: &Job) -> Result<()> {
        let attempt = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| JobError::ExecutionFailure("Lock poisoned".to_string()))?;
            let count = calls.entry(job.id.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let succeeds = self
            .policies
            .get(&job.task)
            .map_or(true, |policy| policy.succeeds_on(attempt));

        if succeeds {
            Ok(())
        } else {
            Err(JobError::ExecutionFailure(format!(
                "{} failed on attempt {}",
                job.task, attempt
            )))
        }
    }

    async fn finish(&self, job: &Job) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.remove(&job.id);
        }
    }
}

/// Adapts a plain closure into a [`TaskExecutor`]
pub struct FnExecutor<F>(pub F);

#[async_trait]
impl<F> TaskExecutor for FnExecutor<F>
where
    F: Fn(&Job) -> Result<()> + Send + Sync,
{
    async fn execute(&self, job: &Job) -> Result<()> {
        (self.0)(job)
    }
}

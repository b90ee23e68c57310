use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a job.
///
/// `Pending -> Running -> Completed`, or `Running -> Failed -> Running` while
/// attempts remain. A `Failed` job with no attempts left is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Failed,
    Completed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Failed => "FAILED",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work tracked by the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub task: String,
    /// Idempotency token, indexed by the repository when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a fresh `Pending` job with no attempts made.
    pub fn new(id: impl Into<String>, task: impl Into<String>, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            task: task.into(),
            token: None,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Move to `status` and refresh `updated_at`.
    pub fn transition(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// True once no further transitions will happen.
    pub fn is_terminal(&self) -> bool {
        match self.status {
            JobStatus::Completed => true,
            JobStatus::Failed => !self.has_attempts_left(),
            JobStatus::Pending | JobStatus::Running => false,
        }
    }
}

/// Per-status job counts, computed on demand
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusSummary {
    pub pending: u32,
    pub running: u32,
    pub failed: u32,
    pub completed: u32,
}

impl JobStatusSummary {
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Running => self.running += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Completed => self.completed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.pending + self.running + self.failed + self.completed
    }
}

impl<'a> FromIterator<&'a Job> for JobStatusSummary {
    fn from_iter<I: IntoIterator<Item = &'a Job>>(iter: I) -> Self {
        let mut summary = Self::default();
        for job in iter {
            summary.record(job.status);
        }
        summary
    }
}

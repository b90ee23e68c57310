use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Execution failure: {0}")]
    ExecutionFailure(String),

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl JobError {
    /// Whether this error reports a missing job rather than a real failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, JobError>;

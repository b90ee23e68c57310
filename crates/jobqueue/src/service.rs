use crate::config::QueueConfig;
use crate::error::{JobError, Result};
use crate::executor::{PolicyExecutor, TaskExecutor};
use crate::id::{IdGenerator, SequentialIdGenerator};
use crate::job::{Job, JobStatus, JobStatusSummary};
use crate::repository::memory::InMemoryRepository;
use crate::repository::JobRepository;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Main job service.
///
/// Owns the bounded dispatch queue and the worker pool draining it. Cloning
/// is cheap and every clone submits to the same queue; once the last clone
/// is dropped the queue closes and idle workers exit.
#[derive(Clone)]
pub struct JobService {
    repository: Arc<dyn JobRepository>,
    ids: Arc<dyn IdGenerator>,
    sender: mpsc::Sender<Job>,
    config: QueueConfig,
}

impl JobService {
    /// Builder with an in-memory repository, the reference executor and
    /// timestamped ids unless told otherwise
    pub fn builder() -> JobServiceBuilder {
        JobServiceBuilder::default()
    }

    /// Start a service with default collaborators and the given configuration.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: QueueConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Submit a task and return the new job's id.
    ///
    /// Returns once the job is stored and queued, not when it finishes.
    /// Waits for a free slot while the queue is full.
    pub async fn enqueue(&self, task: impl Into<String>) -> Result<String> {
        self.submit(task.into(), None).await
    }

    /// Like [`enqueue`](Self::enqueue), also indexing the job under `token`.
    ///
    /// An earlier job submitted with the same token stays reachable by id,
    /// but the token resolves to the newest one.
    pub async fn enqueue_with_token(
        &self,
        task: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<String> {
        self.submit(task.into(), Some(token.into())).await
    }

    async fn submit(&self, task: String, token: Option<String>) -> Result<String> {
        let mut job = Job::new(self.ids.next_id(), task, self.config.max_attempts);
        job.token = token;

        self.repository.save(&job).await?;

        let id = job.id.clone();
        let task = job.task.clone();
        self.sender
            .send(job)
            .await
            .map_err(|_| JobError::QueueClosed)?;

        tracing::debug!(job_id = %id, task = %task, "Job enqueued");
        Ok(id)
    }

    /// `None` when no job has that id
    pub async fn get_job_by_id(&self, id: &str) -> Result<Option<Job>> {
        found(self.repository.find_by_id(id).await)
    }

    /// `None` when the token was never used
    pub async fn get_job_by_token(&self, token: &str) -> Result<Option<Job>> {
        found(self.repository.find_by_token(token).await)
    }

    pub async fn get_all_jobs(&self) -> Result<Vec<Job>> {
        self.repository.find_all().await
    }

    /// Per-status counts over every stored job; empty when the store is empty
    /// or cannot be read.
    pub async fn get_all_job_status(&self) -> JobStatusSummary {
        match self.repository.status_summary().await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to compute job status summary");
                JobStatusSummary::default()
            }
        }
    }
}

fn found(result: Result<Job>) -> Result<Option<Job>> {
    match result {
        Ok(job) => Ok(Some(job)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Builder for [`JobService`]
#[derive(Default)]
pub struct JobServiceBuilder {
    repository: Option<Arc<dyn JobRepository>>,
    executor: Option<Arc<dyn TaskExecutor>>,
    ids: Option<Arc<dyn IdGenerator>>,
    config: QueueConfig,
}

impl JobServiceBuilder {
    pub fn repository<R: JobRepository + 'static>(mut self, repository: R) -> Self {
        self.repository = Some(Arc::new(repository));
        self
    }

    pub fn executor<E: TaskExecutor + 'static>(mut self, executor: E) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    pub fn id_generator<G: IdGenerator + 'static>(mut self, ids: G) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Open the queue and spawn the worker pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<JobService> {
        self.config.validate()?;

        let repository: Arc<dyn JobRepository> = match self.repository {
            Some(repository) => repository,
            None => Arc::new(InMemoryRepository::new()),
        };
        let executor: Arc<dyn TaskExecutor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(PolicyExecutor::reference()),
        };
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(SequentialIdGenerator::timestamped()),
        };

        let (sender, receiver) = mpsc::channel(self.config.queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        for id in 0..self.config.workers {
            let worker = Worker {
                id,
                receiver: receiver.clone(),
                repository: repository.clone(),
                executor: executor.clone(),
                config: self.config.clone(),
            };
            tokio::spawn(worker.run());
        }

        Ok(JobService {
            repository,
            ids,
            sender,
            config: self.config,
        })
    }
}

/// One member of the pool. Owns each job it dequeues for the job's whole
/// attempt sequence, backoff sleeps included.
struct Worker {
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    repository: Arc<dyn JobRepository>,
    executor: Arc<dyn TaskExecutor>,
    config: QueueConfig,
}

impl Worker {
    async fn run(self) {
        tracing::info!(worker = self.id, "Job worker started");

        loop {
            // Only the receive is under the lock; processing happens after release
            let next = self.receiver.lock().await.recv().await;
            match next {
                Some(job) => self.process(job).await,
                None => break,
            }
        }

        tracing::info!(worker = self.id, "Job worker stopped");
    }

    async fn process(&self, mut job: Job) {
        while job.has_attempts_left() {
            job.attempts += 1;
            job.transition(JobStatus::Running);
            self.persist(&job).await;

            match self.attempt(&job).await {
                Ok(()) => {
                    job.transition(JobStatus::Completed);
                    self.persist(&job).await;
                    self.executor.finish(&job).await;
                    tracing::info!(
                        worker = self.id,
                        job_id = %job.id,
                        attempt = job.attempts,
                        "Job completed"
                    );
                    return;
                }
                Err(e) => {
                    job.transition(JobStatus::Failed);
                    self.persist(&job).await;

                    if job.has_attempts_left() {
                        let delay = self.config.backoff_for(job.attempts);
                        tracing::warn!(
                            worker = self.id,
                            job_id = %job.id,
                            attempt = job.attempts,
                            retry_in = ?delay,
                            error = %e,
                            "Job attempt failed"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        tracing::warn!(
                            worker = self.id,
                            job_id = %job.id,
                            attempts = job.attempts,
                            error = %e,
                            "Job failed permanently"
                        );
                    }
                }
            }
        }
        self.executor.finish(&job).await;
    }

    /// Run one attempt. A panicking executor counts as a failed attempt so
    /// the worker survives and the job still reaches a terminal state.
    async fn attempt(&self, job: &Job) -> Result<()> {
        let execution = AssertUnwindSafe(async { self.executor.execute(job).await });
        match execution.catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::error!(
                    worker = self.id,
                    job_id = %job.id,
                    attempt = job.attempts,
                    panic = %message,
                    "Executor panicked"
                );
                Err(JobError::ExecutionFailure(format!(
                    "executor panicked: {}",
                    message
                )))
            }
        }
    }

    async fn persist(&self, job: &Job) {
        if let Err(e) = self.repository.update(job).await {
            tracing::error!(
                worker = self.id,
                job_id = %job.id,
                status = %job.status,
                error = %e,
                "Failed to persist job state"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

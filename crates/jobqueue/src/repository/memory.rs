use super::JobRepository;
use crate::error::{JobError, Result};
use crate::job::{Job, JobStatusSummary};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Store {
    jobs: HashMap<String, Job>,
    // token -> job id
    token_index: HashMap<String, String>,
}

/// In-memory job repository (not persistent, discarded on exit).
///
/// One lock covers both the job map and the token index, so readers never
/// observe one updated without the other.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobRepository for InMemoryRepository {
    async fn save(&self, job: &Job) -> Result<()> {
        let mut store = self.store.write().await;
        if let Some(token) = &job.token {
            store.token_index.insert(token.clone(), job.id.clone());
        }
        store.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let mut store = self.store.write().await;
        match store.jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job.clone();
                Ok(())
            }
            None => Err(JobError::NotFound(job.id.clone())),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Job> {
        let store = self.store.read().await;
        store
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    async fn find_by_token(&self, token: &str) -> Result<Job> {
        let store = self.store.read().await;
        store
            .token_index
            .get(token)
            .and_then(|id| store.jobs.get(id))
            .cloned()
            .ok_or_else(|| JobError::NotFound(format!("token {}", token)))
    }

    async fn find_all(&self) -> Result<Vec<Job>> {
        let store = self.store.read().await;
        Ok(store.jobs.values().cloned().collect())
    }

    async fn status_summary(&self) -> Result<JobStatusSummary> {
        let store = self.store.read().await;
        Ok(store.jobs.values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use proptest::prelude::*;

    fn job(id: &str) -> Job {
        Job::new(id, "normal-job", 3)
    }

    #[tokio::test]
    async fn test_save_and_find_by_id() {
        let repo = InMemoryRepository::new();
        repo.save(&job("job-1")).await.unwrap();

        let found = repo.find_by_id("job-1").await.unwrap();
        assert_eq!(found.id, "job-1");
        assert_eq!(found.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_find_missing_id() {
        let repo = InMemoryRepository::new();
        let err = repo.find_by_id("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let repo = InMemoryRepository::new();
        let mut stored = job("job-1");
        repo.save(&stored).await.unwrap();

        stored.attempts = 1;
        stored.transition(JobStatus::Running);
        repo.save(&stored).await.unwrap();

        let found = repo.find_by_id("job-1").await.unwrap();
        assert_eq!(found.status, JobStatus::Running);
        assert_eq!(found.attempts, 1);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_requires_existing_job() {
        let repo = InMemoryRepository::new();
        let mut stored = job("job-1");

        let err = repo.update(&stored).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(repo.is_empty().await);

        repo.save(&stored).await.unwrap();
        stored.transition(JobStatus::Completed);
        repo.update(&stored).await.unwrap();
        assert_eq!(
            repo.find_by_id("job-1").await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_find_by_token_matches_find_by_id() {
        let repo = InMemoryRepository::new();
        repo.save(&job("job-1").with_token("tok-1")).await.unwrap();
        repo.save(&job("job-2")).await.unwrap();

        let by_token = repo.find_by_token("tok-1").await.unwrap();
        let by_id = repo.find_by_id("job-1").await.unwrap();
        assert_eq!(by_token, by_id);

        let err = repo.find_by_token("unused").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_token_reuse_points_at_latest_job() {
        let repo = InMemoryRepository::new();
        repo.save(&job("job-1").with_token("tok")).await.unwrap();
        repo.save(&job("job-2").with_token("tok")).await.unwrap();

        assert_eq!(repo.find_by_token("tok").await.unwrap().id, "job-2");
        // The earlier job stays reachable by id
        assert!(repo.find_by_id("job-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_find_all_and_summary() {
        let repo = InMemoryRepository::new();
        assert!(repo.find_all().await.unwrap().is_empty());
        assert_eq!(repo.status_summary().await.unwrap(), JobStatusSummary::default());

        let mut failed = job("a");
        failed.transition(JobStatus::Failed);
        let mut completed = job("b");
        completed.transition(JobStatus::Completed);
        repo.save(&failed).await.unwrap();
        repo.save(&completed).await.unwrap();
        repo.save(&job("c")).await.unwrap();

        assert_eq!(repo.find_all().await.unwrap().len(), 3);
        let summary = repo.status_summary().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.running, 0);
    }

    #[tokio::test]
    async fn test_concurrent_saves() {
        let repo = InMemoryRepository::new();
        let mut handles = Vec::new();
        for i in 0..50 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let stored = job(&format!("job-{}", i)).with_token(format!("tok-{}", i));
                repo.save(&stored).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(repo.len().await, 50);
        for i in 0..50 {
            let found = repo.find_by_token(&format!("tok-{}", i)).await.unwrap();
            assert_eq!(found.id, format!("job-{}", i));
        }
    }

    fn status_strategy() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Pending),
            Just(JobStatus::Running),
            Just(JobStatus::Failed),
            Just(JobStatus::Completed),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Summary counts always add up to the number of stored jobs
        #[test]
        fn prop_summary_counts_every_job_once(
            statuses in prop::collection::vec(status_strategy(), 0..40)
        ) {
            tokio::runtime::Runtime::new().unwrap().block_on(async {
                let repo = InMemoryRepository::new();
                for (i, status) in statuses.iter().enumerate() {
                    let mut stored = job(&format!("job-{}", i));
                    stored.transition(*status);
                    repo.save(&stored).await.unwrap();
                }

                let summary = repo.status_summary().await.unwrap();
                prop_assert_eq!(summary.total() as usize, statuses.len());
                prop_assert_eq!(summary.total() as usize, repo.find_all().await.unwrap().len());

                let completed = statuses.iter().filter(|s| **s == JobStatus::Completed).count();
                prop_assert_eq!(summary.completed as usize, completed);

                Ok(())
            })?;
        }
    }
}

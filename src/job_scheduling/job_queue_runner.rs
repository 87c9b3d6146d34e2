//! Job queue runner service for executing scheduled jobs

use super::job_queue::JobQueue;
use super::types::{JobSchedulingError, JobType, JobTypeCategory, ScheduledJob};
use crate::config::JobSchedulingConfig;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{Duration, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Performs the work behind a job.
///
/// Delivery is at-least-once: a job may run again after a crash or when
/// re-requested once it finished, so handlers must be idempotent.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job_type: &JobType) -> anyhow::Result<()>;
}

/// Drains the job queue within global and per-category concurrency limits
pub struct JobQueueRunner {
    job_queue: Arc<JobQueue>,
    handler: Arc<dyn JobHandler>,
    max_concurrent: usize,
    concurrent_limits: HashMap<JobTypeCategory, usize>,
    poll_interval: Duration,
}

impl JobQueueRunner {
    pub fn new(
        job_queue: Arc<JobQueue>,
        handler: Arc<dyn JobHandler>,
        config: &JobSchedulingConfig,
    ) -> Self {
        let concurrent_limits = HashMap::from([
            (JobTypeCategory::AccountRefresh, config.account_refresh_limit),
            (JobTypeCategory::GuideRefresh, config.guide_refresh_limit),
            (JobTypeCategory::Maintenance, config.maintenance_limit),
        ]);

        Self {
            job_queue,
            handler,
            max_concurrent: config.global_max_jobs,
            concurrent_limits,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run until cancelled, then wait for in-flight jobs
    pub async fn run(&self, cancellation_token: CancellationToken) {
        info!(
            "Starting job queue runner (max concurrent: {})",
            self.max_concurrent
        );
        let mut execution_check = interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = execution_check.tick() => {
                    self.process_pending_jobs().await;
                }
                _ = cancellation_token.cancelled() => {
                    info!("Job queue runner received cancellation signal");
                    self.wait_for_running_jobs_to_complete(Duration::from_secs(30)).await;
                    break;
                }
            }
        }

        info!("Job queue runner stopped");
    }

    /// Start every job that is ready and fits the limits; returns how many started
    pub async fn process_pending_jobs(&self) -> usize {
        let current_running = self.job_queue.running_count().await;
        if current_running >= self.max_concurrent {
            debug!("At maximum concurrent jobs ({}), waiting", self.max_concurrent);
            return 0;
        }

        let jobs = self
            .job_queue
            .take_executable_jobs(
                Utc::now(),
                self.max_concurrent - current_running,
                &self.concurrent_limits,
            )
            .await;

        let started = jobs.len();
        for job in jobs {
            self.spawn_job(job);
        }
        started
    }

    fn spawn_job(&self, job: ScheduledJob) {
        let job_queue = self.job_queue.clone();
        let handler = self.handler.clone();

        tokio::spawn(async move {
            let job_key = job.job_key();
            info!("Starting job {} (priority: {:?})", job_key, job.priority);

            let start_time = Instant::now();
            let result = handler
                .handle(&job.job_type)
                .await
                .map_err(|source| JobSchedulingError::HandlerFailed {
                    key: job_key.clone(),
                    source,
                });
            let duration = start_time.elapsed();

            job_queue.mark_completed(job.id).await;

            match result {
                Ok(()) => info!("Job {} completed in {:?}", job_key, duration),
                Err(e) => error!("{} (after {:?})", e, duration),
            }
        });
    }

    /// Wait until no job is running or `max_wait` elapses; returns whether idle
    pub async fn wait_for_running_jobs_to_complete(&self, max_wait: Duration) -> bool {
        let mut check_interval = interval(Duration::from_millis(50));
        let start_time = Instant::now();

        loop {
            check_interval.tick().await;
            let running = self.job_queue.running_count().await;
            if running == 0 {
                return true;
            }
            if start_time.elapsed() > max_wait {
                warn!(
                    "Timeout waiting for {} jobs to complete: {:?}",
                    running,
                    self.job_queue.running_job_keys().await
                );
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_scheduling::types::JobPriority;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingHandler {
        handled: Mutex<Vec<JobType>>,
        fail_rehash: bool,
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        async fn handle(&self, job_type: &JobType) -> anyhow::Result<()> {
            self.handled.lock().unwrap().push(job_type.clone());
            if self.fail_rehash && *job_type == JobType::Rehash {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    fn config() -> JobSchedulingConfig {
        JobSchedulingConfig {
            global_max_jobs: 4,
            account_refresh_limit: 2,
            guide_refresh_limit: 1,
            maintenance_limit: 1,
        }
    }

    #[tokio::test]
    async fn test_runner_executes_jobs_and_releases_keys() {
        let queue = Arc::new(JobQueue::new());
        let handler = Arc::new(RecordingHandler::default());
        let runner = JobQueueRunner::new(queue.clone(), handler.clone(), &config());

        let account_id = Uuid::new_v4();
        queue
            .enqueue(ScheduledJob::new(
                JobType::AccountRefresh(account_id),
                JobPriority::Normal,
            ))
            .await
            .unwrap();
        queue
            .enqueue(ScheduledJob::new(JobType::Rehash, JobPriority::Maintenance))
            .await
            .unwrap();

        assert_eq!(runner.process_pending_jobs().await, 2);
        assert!(
            runner
                .wait_for_running_jobs_to_complete(Duration::from_secs(5))
                .await
        );

        let handled = handler.handled.lock().unwrap().clone();
        assert_eq!(handled.len(), 2);
        assert!(handled.contains(&JobType::AccountRefresh(account_id)));
        assert_eq!(queue.stats().await.total_tracked_keys, 0);
    }

    #[tokio::test]
    async fn test_failed_job_still_releases_its_key() {
        let queue = Arc::new(JobQueue::new());
        let handler = Arc::new(RecordingHandler {
            fail_rehash: true,
            ..Default::default()
        });
        let runner = JobQueueRunner::new(queue.clone(), handler, &config());

        queue
            .enqueue(ScheduledJob::new(JobType::Rehash, JobPriority::Maintenance))
            .await
            .unwrap();
        runner.process_pending_jobs().await;
        runner
            .wait_for_running_jobs_to_complete(Duration::from_secs(5))
            .await;

        assert!(!queue.contains_job_key("rehash").await);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let queue = Arc::new(JobQueue::new());
        let runner = JobQueueRunner::new(
            queue,
            Arc::new(RecordingHandler::default()),
            &config(),
        )
        .with_poll_interval(Duration::from_millis(10));

        let token = CancellationToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), runner.run(token))
            .await
            .unwrap();
    }
}

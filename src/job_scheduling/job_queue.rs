//! Job queue with deduplication and priority ordering

use super::types::{JobSchedulingError, JobTypeCategory, ScheduledJob};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default bound on pending jobs
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct RunningJob {
    key: String,
    category: JobTypeCategory,
}

/// Thread-safe job queue.
///
/// A job key stays tracked from enqueue until completion, so a refresh
/// requested while the same refresh is pending or running is dropped.
#[derive(Debug)]
pub struct JobQueue {
    pending: RwLock<BinaryHeap<Reverse<ScheduledJob>>>,
    running: RwLock<HashMap<Uuid, RunningJob>>,
    job_keys: RwLock<HashSet<String>>,
    capacity: usize,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: RwLock::new(BinaryHeap::new()),
            running: RwLock::new(HashMap::new()),
            job_keys: RwLock::new(HashSet::new()),
            capacity,
        }
    }

    /// Enqueue a job unless its key is already tracked.
    /// Returns Ok(true) if enqueued, Ok(false) if a duplicate was skipped.
    pub async fn enqueue(&self, job: ScheduledJob) -> Result<bool, JobSchedulingError> {
        let job_key = job.job_key();
        let mut job_keys = self.job_keys.write().await;

        if job_keys.contains(&job_key) {
            debug!("Skipping duplicate job for key: {}", job_key);
            return Ok(false);
        }

        let mut pending = self.pending.write().await;
        if pending.len() >= self.capacity {
            return Err(JobSchedulingError::QueueFull {
                key: job_key,
                capacity: self.capacity,
            });
        }

        job_keys.insert(job_key.clone());
        info!(
            "Enqueued job {} (priority: {:?}, scheduled: {})",
            job_key,
            job.priority,
            job.scheduled_time.format("%Y-%m-%d %H:%M:%S UTC")
        );
        pending.push(Reverse(job));

        Ok(true)
    }

    /// Pop ready jobs within the free global slots and per-category limits.
    /// Returned jobs are already marked running.
    pub async fn take_executable_jobs(
        &self,
        now: DateTime<Utc>,
        available_slots: usize,
        type_limits: &HashMap<JobTypeCategory, usize>,
    ) -> Vec<ScheduledJob> {
        let mut pending = self.pending.write().await;
        let mut running = self.running.write().await;

        let mut type_counts: HashMap<JobTypeCategory, usize> = HashMap::new();
        for job in running.values() {
            *type_counts.entry(job.category).or_insert(0) += 1;
        }

        let mut executable = Vec::new();
        let mut remaining = BinaryHeap::new();

        while let Some(Reverse(job)) = pending.pop() {
            let category = job.job_type.category();
            let count = type_counts.get(&category).copied().unwrap_or(0);
            let limit = type_limits.get(&category).copied().unwrap_or(1);

            if job.is_ready(now) && executable.len() < available_slots && count < limit {
                *type_counts.entry(category).or_insert(0) += 1;
                running.insert(
                    job.id,
                    RunningJob {
                        key: job.job_key(),
                        category,
                    },
                );
                executable.push(job);
            } else {
                remaining.push(Reverse(job));
            }
        }

        *pending = remaining;

        if !executable.is_empty() {
            debug!("Took {} executable jobs from queue", executable.len());
        }
        executable
    }

    /// Release a finished job's key, success or failure
    pub async fn mark_completed(&self, job_id: Uuid) {
        let removed = self.running.write().await.remove(&job_id);

        match removed {
            Some(job) => {
                self.job_keys.write().await.remove(&job.key);
                debug!("Job {} completed and removed from tracking", job.key);
            }
            None => warn!("Attempted to mark unknown job {} as completed", job_id),
        }
    }

    pub async fn running_count(&self) -> usize {
        self.running.read().await.len()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    pub async fn contains_job_key(&self, job_key: &str) -> bool {
        self.job_keys.read().await.contains(job_key)
    }

    pub async fn running_job_keys(&self) -> Vec<String> {
        self.running
            .read()
            .await
            .values()
            .map(|job| job.key.clone())
            .collect()
    }

    pub async fn stats(&self) -> JobQueueStats {
        JobQueueStats {
            pending_jobs: self.pending.read().await.len(),
            running_jobs: self.running.read().await.len(),
            total_tracked_keys: self.job_keys.read().await.len(),
        }
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the job queue state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQueueStats {
    pub pending_jobs: usize,
    pub running_jobs: usize,
    /// Should equal pending + running
    pub total_tracked_keys: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_scheduling::types::{JobPriority, JobType};
    use chrono::Duration;

    fn limits(account: usize, guide: usize, maintenance: usize) -> HashMap<JobTypeCategory, usize> {
        HashMap::from([
            (JobTypeCategory::AccountRefresh, account),
            (JobTypeCategory::GuideRefresh, guide),
            (JobTypeCategory::Maintenance, maintenance),
        ])
    }

    #[tokio::test]
    async fn test_enqueue_deduplicates_by_key() {
        let queue = JobQueue::new();
        let account_id = Uuid::new_v4();

        let first = ScheduledJob::new(JobType::AccountRefresh(account_id), JobPriority::Normal);
        let second = ScheduledJob::new(JobType::AccountRefresh(account_id), JobPriority::High);

        assert!(queue.enqueue(first).await.unwrap());
        assert!(!queue.enqueue(second).await.unwrap());

        let stats = queue.stats().await;
        assert_eq!(stats.pending_jobs, 1);
        assert_eq!(stats.total_tracked_keys, 1);
    }

    #[tokio::test]
    async fn test_running_job_still_blocks_duplicates() {
        let queue = JobQueue::new();
        let job = ScheduledJob::new(JobType::Rehash, JobPriority::Maintenance);
        let job_id = job.id;
        queue.enqueue(job).await.unwrap();

        let taken = queue
            .take_executable_jobs(Utc::now(), 4, &limits(1, 1, 1))
            .await;
        assert_eq!(taken.len(), 1);
        assert_eq!(queue.running_count().await, 1);

        let again = ScheduledJob::new(JobType::Rehash, JobPriority::Maintenance);
        assert!(!queue.enqueue(again).await.unwrap());

        queue.mark_completed(job_id).await;
        assert!(!queue.contains_job_key("rehash").await);
        let again = ScheduledJob::new(JobType::Rehash, JobPriority::Maintenance);
        assert!(queue.enqueue(again).await.unwrap());
    }

    #[tokio::test]
    async fn test_priority_and_readiness() {
        let queue = JobQueue::new();
        let now = Utc::now();

        let maintenance = ScheduledJob::new_scheduled(
            JobType::Maintenance("purge".to_string()),
            JobPriority::Maintenance,
            now,
        );
        let high = ScheduledJob::new_scheduled(
            JobType::AccountRefresh(Uuid::new_v4()),
            JobPriority::High,
            now,
        );
        let future = ScheduledJob::new_scheduled(
            JobType::GuideRefresh(Uuid::new_v4()),
            JobPriority::High,
            now + Duration::minutes(10),
        );

        queue.enqueue(maintenance).await.unwrap();
        queue.enqueue(high.clone()).await.unwrap();
        queue.enqueue(future).await.unwrap();

        let taken = queue
            .take_executable_jobs(now, 10, &limits(5, 5, 5))
            .await;
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].id, high.id);
        assert_eq!(queue.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_category_limits_hold_jobs_back() {
        let queue = JobQueue::new();
        for _ in 0..3 {
            queue
                .enqueue(ScheduledJob::new(
                    JobType::AccountRefresh(Uuid::new_v4()),
                    JobPriority::Normal,
                ))
                .await
                .unwrap();
        }

        let taken = queue
            .take_executable_jobs(Utc::now(), 10, &limits(2, 1, 1))
            .await;
        assert_eq!(taken.len(), 2);

        // Both slots of the category are now occupied
        let none = queue
            .take_executable_jobs(Utc::now(), 10, &limits(2, 1, 1))
            .await;
        assert!(none.is_empty());

        queue.mark_completed(taken[0].id).await;
        let last = queue
            .take_executable_jobs(Utc::now(), 10, &limits(2, 1, 1))
            .await;
        assert_eq!(last.len(), 1);
    }

    #[tokio::test]
    async fn test_capacity_is_enforced() {
        let queue = JobQueue::with_capacity(1);
        queue
            .enqueue(ScheduledJob::new(JobType::Rehash, JobPriority::Maintenance))
            .await
            .unwrap();

        let err = queue
            .enqueue(ScheduledJob::new(
                JobType::GuideRefresh(Uuid::new_v4()),
                JobPriority::Normal,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, JobSchedulingError::QueueFull { capacity: 1, .. }));
    }
}

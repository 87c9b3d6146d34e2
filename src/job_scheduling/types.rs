//! Job scheduling type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Priority levels for job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobPriority {
    /// Manual triggers from the CLI
    High = 0,
    /// Refreshes triggered by the ingestion watcher
    Normal = 1,
    /// Rehash and housekeeping
    Maintenance = 2,
}

impl PartialOrd for JobPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JobPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

/// Type of job to be executed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    /// Parse the playlist behind an account
    AccountRefresh(Uuid),
    /// Parse the program guide behind a guide source
    GuideRefresh(Uuid),
    /// Recompute feed identity hashes and drop orphaned duplicates
    Rehash,
    /// Housekeeping operation by name
    Maintenance(String),
}

impl JobType {
    /// Deduplication key; at most one job per key is pending or running
    pub fn job_key(&self) -> String {
        match self {
            JobType::AccountRefresh(account_id) => format!("account:{account_id}"),
            JobType::GuideRefresh(source_id) => format!("guide:{source_id}"),
            JobType::Rehash => "rehash".to_string(),
            JobType::Maintenance(operation) => format!("maintenance:{operation}"),
        }
    }

    pub fn resource_id(&self) -> Option<Uuid> {
        match self {
            JobType::AccountRefresh(id) | JobType::GuideRefresh(id) => Some(*id),
            JobType::Rehash | JobType::Maintenance(_) => None,
        }
    }

    pub fn category(&self) -> JobTypeCategory {
        JobTypeCategory::from(self)
    }
}

/// Category of job types for concurrency limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobTypeCategory {
    AccountRefresh,
    GuideRefresh,
    Maintenance,
}

impl From<&JobType> for JobTypeCategory {
    fn from(job_type: &JobType) -> Self {
        match job_type {
            JobType::AccountRefresh(_) => JobTypeCategory::AccountRefresh,
            JobType::GuideRefresh(_) => JobTypeCategory::GuideRefresh,
            JobType::Rehash | JobType::Maintenance(_) => JobTypeCategory::Maintenance,
        }
    }
}

/// A scheduled job ready for execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub job_type: JobType,
    pub scheduled_time: DateTime<Utc>,
    pub priority: JobPriority,
}

impl ScheduledJob {
    pub fn new(job_type: JobType, priority: JobPriority) -> Self {
        Self::new_scheduled(job_type, priority, Utc::now())
    }

    pub fn new_scheduled(
        job_type: JobType,
        priority: JobPriority,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type,
            scheduled_time,
            priority,
        }
    }

    pub fn job_key(&self) -> String {
        self.job_type.job_key()
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_time <= now
    }
}

impl PartialEq for ScheduledJob {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ScheduledJob {}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    /// Priority first, then earlier scheduled time
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.scheduled_time.cmp(&other.scheduled_time))
    }
}

/// Errors that can occur in the job scheduling system
#[derive(Debug, thiserror::Error)]
pub enum JobSchedulingError {
    /// Job queue is full
    #[error("Job queue is full ({capacity} pending), cannot enqueue {key}")]
    QueueFull { key: String, capacity: usize },

    /// The handler reported a failure
    #[error("Job {key} failed: {source}")]
    HandlerFailed {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_job_priority_ordering() {
        assert!(JobPriority::High < JobPriority::Normal);
        assert!(JobPriority::Normal < JobPriority::Maintenance);
    }

    #[test]
    fn test_job_type_key_generation() {
        let account_id = Uuid::new_v4();
        let source_id = Uuid::new_v4();

        assert_eq!(
            JobType::AccountRefresh(account_id).job_key(),
            format!("account:{account_id}")
        );
        assert_eq!(
            JobType::GuideRefresh(source_id).job_key(),
            format!("guide:{source_id}")
        );
        assert_eq!(JobType::Rehash.job_key(), "rehash");
        assert_eq!(
            JobType::Maintenance("purge_expired_kv".to_string()).job_key(),
            "maintenance:purge_expired_kv"
        );
    }

    #[test]
    fn test_rehash_shares_the_maintenance_category() {
        assert_eq!(JobType::Rehash.category(), JobTypeCategory::Maintenance);
        assert_eq!(
            JobType::AccountRefresh(Uuid::new_v4()).category(),
            JobTypeCategory::AccountRefresh
        );
    }

    #[test]
    fn test_scheduled_job_ordering() {
        let now = Utc::now();

        let high_later = ScheduledJob::new_scheduled(
            JobType::Rehash,
            JobPriority::High,
            now + Duration::hours(1),
        );
        let normal_now = ScheduledJob::new_scheduled(
            JobType::GuideRefresh(Uuid::new_v4()),
            JobPriority::Normal,
            now,
        );
        assert!(high_later < normal_now);

        let earlier = ScheduledJob::new_scheduled(
            JobType::AccountRefresh(Uuid::new_v4()),
            JobPriority::Normal,
            now,
        );
        let later = ScheduledJob::new_scheduled(
            JobType::AccountRefresh(Uuid::new_v4()),
            JobPriority::Normal,
            now + Duration::minutes(10),
        );
        assert!(earlier < later);
    }

    #[test]
    fn test_job_is_ready() {
        let now = Utc::now();
        let ready = ScheduledJob::new_scheduled(
            JobType::Rehash,
            JobPriority::Maintenance,
            now - Duration::minutes(1),
        );
        let future = ScheduledJob::new_scheduled(
            JobType::Rehash,
            JobPriority::Maintenance,
            now + Duration::minutes(1),
        );
        assert!(ready.is_ready(now));
        assert!(!future.is_ready(now));
    }
}

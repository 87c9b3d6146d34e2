//! Common traits for repository implementations

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::RepositoryResult;

/// Process-wide key/value store with per-key expiry.
///
/// Holds the state shared between workers (the ingestion ledger). Every
/// operation is atomic on a single key; expired keys read as absent.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value for `key`, unless missing or expired
    async fn get(&self, key: &str) -> RepositoryResult<Option<String>>;

    /// Store `value`, replacing any previous value and expiry
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RepositoryResult<()>;

    /// Remove `key`; returns whether a live entry was removed
    async fn delete(&self, key: &str) -> RepositoryResult<bool>;

    /// All live entries whose key starts with `prefix`, sorted by key
    async fn scan_prefix(&self, prefix: &str) -> RepositoryResult<Vec<(String, String)>>;
}

/// Current wall-clock time in unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Absolute expiry for a relative TTL
pub fn expiry_from_ttl(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| now_millis().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)))
}

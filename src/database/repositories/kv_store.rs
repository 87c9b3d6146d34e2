//! Key/value store implementations
//!
//! [`MemoryKeyValueStore`] serves single-process deployments and tests;
//! [`KvStoreSeaOrmRepository`] shares state between workers through the
//! `kv_entries` table.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::{KeyValueStore, expiry_from_ttl, now_millis};
use crate::entities::{kv_entries, prelude::KvEntries};
use crate::errors::RepositoryResult;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<i64>,
}

impl MemoryEntry {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// In-process key/value store
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<RwLock<BTreeMap<String, MemoryEntry>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> RepositoryResult<Option<String>> {
        let now = now_millis();
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RepositoryResult<()> {
        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at: expiry_from_ttl(ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> RepositoryResult<bool> {
        let now = now_millis();
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|entry| entry.is_live(now)))
    }

    async fn scan_prefix(&self, prefix: &str) -> RepositoryResult<Vec<(String, String)>> {
        let now = now_millis();
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect())
    }
}

/// SeaORM-backed key/value store over `kv_entries`
#[derive(Clone)]
pub struct KvStoreSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl KvStoreSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    fn live_condition(now: i64) -> Condition {
        Condition::any()
            .add(kv_entries::Column::ExpiresAt.is_null())
            .add(kv_entries::Column::ExpiresAt.gt(now))
    }

    /// Drop every expired row; returns how many were removed
    pub async fn purge_expired(&self) -> RepositoryResult<u64> {
        let result = KvEntries::delete_many()
            .filter(kv_entries::Column::ExpiresAt.lte(now_millis()))
            .exec(&*self.connection)
            .await?;
        if result.rows_affected > 0 {
            debug!("Purged {} expired key/value entries", result.rows_affected);
        }
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl KeyValueStore for KvStoreSeaOrmRepository {
    async fn get(&self, key: &str) -> RepositoryResult<Option<String>> {
        let model = KvEntries::find_by_id(key.to_string())
            .filter(Self::live_condition(now_millis()))
            .one(&*self.connection)
            .await?;
        Ok(model.map(|m| m.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RepositoryResult<()> {
        let active_model = kv_entries::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            expires_at: Set(expiry_from_ttl(ttl)),
        };

        KvEntries::insert(active_model)
            .on_conflict(
                OnConflict::column(kv_entries::Column::Key)
                    .update_columns([kv_entries::Column::Value, kv_entries::Column::ExpiresAt])
                    .to_owned(),
            )
            .exec(&*self.connection)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> RepositoryResult<bool> {
        let live = self.get(key).await?.is_some();
        KvEntries::delete_by_id(key.to_string())
            .exec(&*self.connection)
            .await?;
        Ok(live)
    }

    async fn scan_prefix(&self, prefix: &str) -> RepositoryResult<Vec<(String, String)>> {
        let models = KvEntries::find()
            .filter(kv_entries::Column::Key.starts_with(prefix))
            .filter(Self::live_condition(now_millis()))
            .order_by_asc(kv_entries::Column::Key)
            .all(&*self.connection)
            .await?;
        Ok(models.into_iter().map(|m| (m.key, m.value)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use anyhow::Result;

    async fn exercise_store(store: &dyn KeyValueStore) -> Result<()> {
        assert_eq!(store.get("ledger:a").await?, None);

        store.set("ledger:a", "1", None).await?;
        store.set("ledger:b", "2", Some(Duration::from_secs(60))).await?;
        store.set("other:c", "3", None).await?;
        assert_eq!(store.get("ledger:a").await?, Some("1".to_string()));

        store.set("ledger:a", "10", None).await?;
        assert_eq!(store.get("ledger:a").await?, Some("10".to_string()));

        let scanned = store.scan_prefix("ledger:").await?;
        assert_eq!(
            scanned,
            vec![
                ("ledger:a".to_string(), "10".to_string()),
                ("ledger:b".to_string(), "2".to_string()),
            ]
        );

        assert!(store.delete("ledger:a").await?);
        assert!(!store.delete("ledger:a").await?);
        assert_eq!(store.get("ledger:a").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_store_operations() -> Result<()> {
        exercise_store(&MemoryKeyValueStore::new()).await
    }

    #[tokio::test]
    async fn test_database_store_operations() -> Result<()> {
        let db = Database::in_memory().await?;
        exercise_store(&KvStoreSeaOrmRepository::new(db.connection())).await
    }

    #[tokio::test]
    async fn test_expired_entries_read_as_absent() -> Result<()> {
        let memory = MemoryKeyValueStore::new();
        memory.set("k", "v", Some(Duration::ZERO)).await?;
        assert_eq!(memory.get("k").await?, None);
        assert!(memory.scan_prefix("k").await?.is_empty());

        let db = Database::in_memory().await?;
        let repo = KvStoreSeaOrmRepository::new(db.connection());
        repo.set("k", "v", Some(Duration::ZERO)).await?;
        assert_eq!(repo.get("k").await?, None);
        assert_eq!(repo.purge_expired().await?, 1);
        Ok(())
    }
}

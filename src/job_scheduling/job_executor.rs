//! Job executor service for performing the actual work

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::job_queue_runner::JobHandler;
use super::types::JobType;
use crate::database::repositories::KvStoreSeaOrmRepository;
use crate::runtime_settings::RuntimeSettingsStore;
use crate::services::rehash::RehashEngine;

/// Maintenance operation that drops expired key/value entries
pub const PURGE_EXPIRED_KV: &str = "purge_expired_kv";

/// Runs the jobs this crate owns and hands refresh jobs to an injected handler.
///
/// Playlist and guide parsing live outside the dispatcher, so without a
/// refresh handler those jobs are acknowledged and logged only.
pub struct JobExecutor {
    rehash_engine: Arc<RehashEngine>,
    kv_store: KvStoreSeaOrmRepository,
    settings: RuntimeSettingsStore,
    refresh_handler: Option<Arc<dyn JobHandler>>,
}

impl JobExecutor {
    pub fn new(
        rehash_engine: Arc<RehashEngine>,
        kv_store: KvStoreSeaOrmRepository,
        settings: RuntimeSettingsStore,
    ) -> Self {
        Self {
            rehash_engine,
            kv_store,
            settings,
            refresh_handler: None,
        }
    }

    pub fn with_refresh_handler(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.refresh_handler = Some(handler);
        self
    }

    /// Rehash with whatever identity fields are current when the job runs
    pub async fn execute_rehash_job(&self) -> Result<()> {
        let fields = self.settings.identity_fields().await;
        let report = self.rehash_engine.rehash(&fields).await;
        if !report.is_clean() {
            warn!(
                "Rehash finished with {} failed batch(es)",
                report.errors.len()
            );
        }
        Ok(())
    }

    pub async fn execute_maintenance_job(&self, operation: &str) -> Result<()> {
        match operation {
            PURGE_EXPIRED_KV => {
                let purged = self.kv_store.purge_expired().await?;
                info!("Purged {} expired key/value entries", purged);
                Ok(())
            }
            other => {
                warn!("Unknown maintenance operation '{}', ignoring", other);
                Ok(())
            }
        }
    }

    async fn delegate_refresh(&self, job_type: &JobType) -> Result<()> {
        match &self.refresh_handler {
            Some(handler) => handler.handle(job_type).await,
            None => {
                debug!(
                    "No refresh handler configured, skipping {}",
                    job_type.job_key()
                );
                Ok(())
            }
        }
    }
}

#[async_trait]
impl JobHandler for JobExecutor {
    async fn handle(&self, job_type: &JobType) -> Result<()> {
        match job_type {
            JobType::AccountRefresh(_) | JobType::GuideRefresh(_) => {
                self.delegate_refresh(job_type).await
            }
            JobType::Rehash => self.execute_rehash_job().await,
            JobType::Maintenance(operation) => self.execute_maintenance_job(operation).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::database::Database;
    use crate::database::repositories::KeyValueStore;
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        async fn handle(&self, job_type: &JobType) -> Result<()> {
            self.seen.lock().unwrap().push(job_type.job_key());
            Ok(())
        }
    }

    async fn executor(db: &Database) -> JobExecutor {
        JobExecutor::new(
            Arc::new(RehashEngine::new(db.connection(), 100)),
            KvStoreSeaOrmRepository::new(db.connection()),
            RuntimeSettingsStore::from_config(&Config::default()),
        )
    }

    #[tokio::test]
    async fn test_refresh_jobs_are_delegated() -> Result<()> {
        let db = Database::in_memory().await?;
        let recorder = Arc::new(RecordingHandler::default());
        let executor = executor(&db).await.with_refresh_handler(recorder.clone());

        let account_id = Uuid::new_v4();
        executor.handle(&JobType::AccountRefresh(account_id)).await?;
        executor.handle(&JobType::Rehash).await?;

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![format!("account:{account_id}")]);
        Ok(())
    }

    #[tokio::test]
    async fn test_refresh_without_handler_is_acknowledged() -> Result<()> {
        let db = Database::in_memory().await?;
        executor(&db)
            .await
            .handle(&JobType::GuideRefresh(Uuid::new_v4()))
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_purge_maintenance_job() -> Result<()> {
        let db = Database::in_memory().await?;
        let kv = KvStoreSeaOrmRepository::new(db.connection());
        kv.set("stale", "1", Some(Duration::from_millis(1))).await?;
        kv.set("fresh", "1", None).await?;
        tokio::time::sleep(Duration::from_millis(5)).await;

        executor(&db)
            .await
            .handle(&JobType::Maintenance(PURGE_EXPIRED_KV.to_string()))
            .await?;

        assert_eq!(kv.purge_expired().await?, 0);
        assert_eq!(kv.get("fresh").await?, Some("1".to_string()));
        Ok(())
    }
}

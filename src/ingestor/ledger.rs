//! Debounce ledger for hot-folder files
//!
//! Remembers the newest modification time already handled for each path, in
//! the shared key/value store so every worker sees the same view. Entries
//! expire after the configured TTL; the watcher falls back to the catalog
//! when one is missing.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::database::repositories::KeyValueStore;
use crate::errors::RepositoryResult;
use crate::models::CatalogKind;

const LEDGER_PREFIX: &str = "ingest:ledger";

#[derive(Clone)]
pub struct IngestionLedger {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl IngestionLedger {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(kind: CatalogKind, path: &str) -> String {
        format!("{LEDGER_PREFIX}:{kind}:{path}")
    }

    /// Last recorded mtime (unix millis) for `path`
    pub async fn last_seen(&self, kind: CatalogKind, path: &str) -> RepositoryResult<Option<i64>> {
        let Some(raw) = self.store.get(&Self::key(kind, path)).await? else {
            return Ok(None);
        };
        match raw.parse::<i64>() {
            Ok(mtime) => Ok(Some(mtime)),
            Err(_) => {
                warn!("Discarding unreadable ledger entry for {}: '{}'", path, raw);
                Ok(None)
            }
        }
    }

    /// Record `mtime` for `path` unless a newer one is already held.
    /// Returns whether the entry changed.
    pub async fn record(&self, kind: CatalogKind, path: &str, mtime: i64) -> RepositoryResult<bool> {
        let existing = self.last_seen(kind, path).await?;
        if existing.is_some_and(|existing| existing >= mtime) {
            return Ok(false);
        }
        self.store
            .set(&Self::key(kind, path), &mtime.to_string(), Some(self.ttl))
            .await?;
        Ok(true)
    }

    /// Every live entry of one folder kind as `(path, mtime)`
    pub async fn entries(&self, kind: CatalogKind) -> RepositoryResult<Vec<(String, i64)>> {
        let prefix = format!("{LEDGER_PREFIX}:{kind}:");
        let entries = self.store.scan_prefix(&prefix).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| {
                let path = key.strip_prefix(&prefix)?.to_string();
                value.parse::<i64>().ok().map(|mtime| (path, mtime))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::MemoryKeyValueStore;
    use anyhow::Result;

    fn ledger() -> IngestionLedger {
        IngestionLedger::new(
            Arc::new(MemoryKeyValueStore::new()),
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_record_is_monotonic() -> Result<()> {
        let ledger = ledger();
        let path = "/watch/m3u/sports.m3u";

        assert_eq!(ledger.last_seen(CatalogKind::Playlist, path).await?, None);
        assert!(tokio_test::assert_ok!(
            ledger.record(CatalogKind::Playlist, path, 2_000).await
        ));
        assert!(!ledger.record(CatalogKind::Playlist, path, 1_000).await?);
        assert!(!ledger.record(CatalogKind::Playlist, path, 2_000).await?);
        assert_eq!(
            ledger.last_seen(CatalogKind::Playlist, path).await?,
            Some(2_000)
        );
        assert!(ledger.record(CatalogKind::Playlist, path, 3_000).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_kinds_are_separate() -> Result<()> {
        let ledger = ledger();
        ledger.record(CatalogKind::Guide, "/watch/epg/uk.xml", 5).await?;

        assert_eq!(
            ledger.last_seen(CatalogKind::Playlist, "/watch/epg/uk.xml").await?,
            None
        );
        assert_eq!(
            ledger.entries(CatalogKind::Guide).await?,
            vec![("/watch/epg/uk.xml".to_string(), 5)]
        );
        assert!(ledger.entries(CatalogKind::Playlist).await?.is_empty());
        Ok(())
    }
}

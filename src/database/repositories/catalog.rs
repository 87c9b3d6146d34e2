//! Hot-folder catalog over accounts and guide sources
//!
//! Playlists are registered as accounts, guides as guide sources; the
//! watcher only sees [`CatalogEntry`] values.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use super::{AccountSeaOrmRepository, GuideSourceSeaOrmRepository};
use crate::errors::RepositoryResult;
use crate::models::{Account, CatalogEntry, CatalogKind, GuideSource};

#[derive(Clone)]
pub struct CatalogSeaOrmRepository {
    accounts: AccountSeaOrmRepository,
    guide_sources: GuideSourceSeaOrmRepository,
}

impl CatalogSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self {
            accounts: AccountSeaOrmRepository::new(connection.clone()),
            guide_sources: GuideSourceSeaOrmRepository::new(connection),
        }
    }

    pub async fn find_by_path(
        &self,
        kind: CatalogKind,
        path: &str,
    ) -> RepositoryResult<Option<CatalogEntry>> {
        match kind {
            CatalogKind::Playlist => Ok(self
                .accounts
                .find_by_file_path(path)
                .await?
                .map(CatalogEntry::from)),
            CatalogKind::Guide => Ok(self
                .guide_sources
                .find_by_file_path(path)
                .await?
                .map(CatalogEntry::from)),
        }
    }

    /// Get-or-create by path; `is_active` applies only to a new entry
    pub async fn get_or_create(
        &self,
        kind: CatalogKind,
        path: &str,
        name: &str,
        is_active: bool,
    ) -> RepositoryResult<(CatalogEntry, bool)> {
        match kind {
            CatalogKind::Playlist => {
                let (account, created) = self
                    .accounts
                    .get_or_create_by_file_path(path, name, is_active)
                    .await?;
                Ok((account.into(), created))
            }
            CatalogKind::Guide => {
                let (source, created) = self
                    .guide_sources
                    .get_or_create_by_file_path(path, name, is_active)
                    .await?;
                Ok((source.into(), created))
            }
        }
    }

    pub async fn record_mtime(
        &self,
        kind: CatalogKind,
        id: &Uuid,
        mtime: i64,
    ) -> RepositoryResult<()> {
        match kind {
            CatalogKind::Playlist => self.accounts.update_last_seen_mtime(id, mtime).await,
            CatalogKind::Guide => self.guide_sources.update_last_seen_mtime(id, mtime).await,
        }
    }
}

impl From<Account> for CatalogEntry {
    fn from(account: Account) -> Self {
        CatalogEntry {
            id: account.id,
            kind: CatalogKind::Playlist,
            path: account.file_path.unwrap_or_default(),
            name: account.name,
            is_active: account.is_active,
            last_seen_mtime: account.last_seen_mtime,
        }
    }
}

impl From<GuideSource> for CatalogEntry {
    fn from(source: GuideSource) -> Self {
        CatalogEntry {
            id: source.id,
            kind: CatalogKind::Guide,
            path: source.file_path.unwrap_or_default(),
            name: source.name,
            is_active: source.is_active,
            last_seen_mtime: source.last_seen_mtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use anyhow::Result;

    #[tokio::test]
    async fn test_kinds_are_kept_apart() -> Result<()> {
        let db = Database::in_memory().await?;
        let catalog = CatalogSeaOrmRepository::new(db.connection());

        let (playlist, _) = catalog
            .get_or_create(CatalogKind::Playlist, "/drop/a.m3u", "a", true)
            .await?;
        assert_eq!(playlist.kind, CatalogKind::Playlist);

        assert!(
            catalog
                .find_by_path(CatalogKind::Guide, "/drop/a.m3u")
                .await?
                .is_none()
        );
        assert!(
            catalog
                .find_by_path(CatalogKind::Playlist, "/drop/a.m3u")
                .await?
                .is_some()
        );
        Ok(())
    }
}

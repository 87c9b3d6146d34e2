//! SeaORM-based GuideSource repository implementation

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::info;
use uuid::Uuid;

use crate::entities::{guide_sources, prelude::GuideSources};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::GuideSource;

/// Source type recorded for guides imported from a hot folder
pub const LOCAL_FILE_SOURCE_TYPE: &str = "xmltv_file";

/// SeaORM-based repository for GuideSource operations
#[derive(Clone)]
pub struct GuideSourceSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl GuideSourceSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn find_by_id(&self, id: &Uuid) -> RepositoryResult<Option<GuideSource>> {
        let model = GuideSources::find_by_id(*id).one(&*self.connection).await?;
        Ok(model.map(Self::model_to_domain))
    }

    pub async fn find_by_file_path(&self, file_path: &str) -> RepositoryResult<Option<GuideSource>> {
        let model = GuideSources::find()
            .filter(guide_sources::Column::FilePath.eq(file_path))
            .one(&*self.connection)
            .await?;
        Ok(model.map(Self::model_to_domain))
    }

    pub async fn find_all(&self) -> RepositoryResult<Vec<GuideSource>> {
        let models = GuideSources::find()
            .order_by_asc(guide_sources::Column::Name)
            .all(&*self.connection)
            .await?;
        Ok(models.into_iter().map(Self::model_to_domain).collect())
    }

    /// Idempotent creation keyed by hot-folder path. Returns the source and
    /// whether this call created it.
    pub async fn get_or_create_by_file_path(
        &self,
        file_path: &str,
        name: &str,
        is_active: bool,
    ) -> RepositoryResult<(GuideSource, bool)> {
        if let Some(existing) = self.find_by_file_path(file_path).await? {
            return Ok((existing, false));
        }

        let now = chrono::Utc::now();
        let insert = guide_sources::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            file_path: Set(Some(file_path.to_string())),
            source_type: Set(LOCAL_FILE_SOURCE_TYPE.to_string()),
            is_active: Set(is_active),
            last_seen_mtime: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.connection)
        .await;

        match insert {
            Ok(model) => {
                info!("Created guide source '{}' for {}", model.name, file_path);
                Ok((Self::model_to_domain(model), true))
            }
            // Another worker won the unique file_path race
            Err(err) => match self.find_by_file_path(file_path).await? {
                Some(existing) => Ok((existing, false)),
                None => Err(err.into()),
            },
        }
    }

    pub async fn update_last_seen_mtime(&self, id: &Uuid, mtime: i64) -> RepositoryResult<()> {
        let model = GuideSources::find_by_id(*id)
            .one(&*self.connection)
            .await?
            .ok_or_else(|| RepositoryError::not_found("guide_sources", "id", id))?;

        let mut active_model: guide_sources::ActiveModel = model.into();
        active_model.last_seen_mtime = Set(Some(mtime));
        active_model.updated_at = Set(chrono::Utc::now());
        active_model.update(&*self.connection).await?;
        Ok(())
    }

    fn model_to_domain(model: guide_sources::Model) -> GuideSource {
        GuideSource {
            id: model.id,
            name: model.name,
            file_path: model.file_path,
            source_type: model.source_type,
            is_active: model.is_active,
            last_seen_mtime: model.last_seen_mtime,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

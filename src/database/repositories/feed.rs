//! SeaORM-based Feed repository implementation
//!
//! The batch helpers take any [`ConnectionTrait`] so the rehash engine can
//! run them inside its per-batch transaction.

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{feeds, prelude::Feeds};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Feed, FeedCreateRequest, IdentityField};

/// SeaORM-based repository for Feed operations
#[derive(Clone)]
pub struct FeedSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl FeedSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Create a feed, hashing it with the given identity field set
    pub async fn create(
        &self,
        request: FeedCreateRequest,
        identity_fields: &[IdentityField],
    ) -> RepositoryResult<Feed> {
        let now = chrono::Utc::now();
        let identity_hash = crate::models::feed::compute_identity_hash(
            identity_fields,
            &request.name,
            &request.url,
            request.guide_id.as_deref(),
        );

        let model = feeds::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(request.account_id),
            name: Set(request.name),
            url: Set(request.url),
            guide_id: Set(request.guide_id),
            identity_hash: Set(identity_hash),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.connection)
        .await?;

        Ok(Self::model_to_domain(model))
    }

    pub async fn find_by_id(&self, id: &Uuid) -> RepositoryResult<Option<Feed>> {
        let model = Feeds::find_by_id(*id).one(&*self.connection).await?;
        Ok(model.map(Self::model_to_domain))
    }

    /// The feed currently holding `identity_hash`. Should several share it
    /// (both still referenced by channels) the lowest id wins.
    pub async fn find_by_identity_hash(&self, identity_hash: &str) -> RepositoryResult<Option<Feed>> {
        let model = Feeds::find()
            .filter(feeds::Column::IdentityHash.eq(identity_hash))
            .order_by_asc(feeds::Column::Id)
            .one(&*self.connection)
            .await?;
        Ok(model.map(Self::model_to_domain))
    }

    pub async fn count(&self) -> RepositoryResult<u64> {
        Ok(Feeds::find().count(&*self.connection).await?)
    }

    /// Up to `limit` feeds with an id greater than `after`, in id order
    pub async fn find_batch_after<C: ConnectionTrait>(
        conn: &C,
        after: Option<Uuid>,
        limit: u64,
    ) -> RepositoryResult<Vec<Feed>> {
        let mut query = Feeds::find().order_by_asc(feeds::Column::Id);
        if let Some(after) = after {
            query = query.filter(feeds::Column::Id.gt(after));
        }
        let models = query.limit(limit).all(conn).await?;
        Ok(models.into_iter().map(Self::model_to_domain).collect())
    }

    pub async fn update_identity_hash<C: ConnectionTrait>(
        conn: &C,
        id: &Uuid,
        identity_hash: &str,
    ) -> RepositoryResult<()> {
        let model = Feeds::find_by_id(*id)
            .one(conn)
            .await?
            .ok_or_else(|| RepositoryError::not_found("feeds", "id", id))?;

        if model.identity_hash == identity_hash {
            return Ok(());
        }

        let mut active_model: feeds::ActiveModel = model.into();
        active_model.identity_hash = Set(identity_hash.to_string());
        active_model.updated_at = Set(chrono::Utc::now());
        active_model.update(conn).await?;
        Ok(())
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, id: &Uuid) -> RepositoryResult<bool> {
        let result = Feeds::delete_by_id(*id).exec(conn).await?;
        if result.rows_affected > 0 {
            debug!("Deleted feed {}", id);
        }
        Ok(result.rows_affected > 0)
    }

    fn model_to_domain(model: feeds::Model) -> Feed {
        Feed {
            id: model.id,
            account_id: model.account_id,
            name: model.name,
            url: model.url,
            guide_id: model.guide_id,
            identity_hash: model.identity_hash,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

//! SeaORM-based LogicalChannel repository implementation

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{
    channel_feeds, channels,
    prelude::{ChannelFeeds, Channels},
};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::LogicalChannel;

/// SeaORM-based repository for LogicalChannel operations
#[derive(Clone)]
pub struct ChannelSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl ChannelSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Create a channel with its feeds in the given priority order
    pub async fn create(&self, name: &str, feed_ids: &[Uuid]) -> RepositoryResult<LogicalChannel> {
        let now = chrono::Utc::now();
        let id = Uuid::new_v4();

        let txn = self.connection.begin().await?;
        channels::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            active_feed_id: Set(None),
            active_profile_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        Self::insert_assignments(&txn, id, feed_ids).await?;
        txn.commit().await?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("channels", "id", id))
    }

    /// Load a channel with its feed ids in priority order
    pub async fn find_by_id(&self, id: &Uuid) -> RepositoryResult<Option<LogicalChannel>> {
        let Some(model) = Channels::find_by_id(*id).one(&*self.connection).await? else {
            return Ok(None);
        };

        let feed_ids = self.ordered_feed_ids(id).await?;
        Ok(Some(LogicalChannel {
            id: model.id,
            name: model.name,
            active_feed_id: model.active_feed_id,
            active_profile_id: model.active_profile_id,
            feed_ids,
        }))
    }

    async fn ordered_feed_ids(&self, channel_id: &Uuid) -> RepositoryResult<Vec<Uuid>> {
        let rows = ChannelFeeds::find()
            .filter(channel_feeds::Column::ChannelId.eq(*channel_id))
            .order_by_asc(channel_feeds::Column::Position)
            .all(&*self.connection)
            .await?;
        Ok(rows.into_iter().map(|row| row.feed_id).collect())
    }

    /// Replace the channel's feed list. The given order becomes the priority order.
    pub async fn assign_feeds(&self, channel_id: &Uuid, feed_ids: &[Uuid]) -> RepositoryResult<()> {
        let txn = self.connection.begin().await?;
        ChannelFeeds::delete_many()
            .filter(channel_feeds::Column::ChannelId.eq(*channel_id))
            .exec(&txn)
            .await?;
        Self::insert_assignments(&txn, *channel_id, feed_ids).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn insert_assignments<C: ConnectionTrait>(
        conn: &C,
        channel_id: Uuid,
        feed_ids: &[Uuid],
    ) -> RepositoryResult<()> {
        for (position, feed_id) in feed_ids.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| {
                RepositoryError::invalid_value("channel_feeds", "position", position)
            })?;
            channel_feeds::ActiveModel {
                channel_id: Set(channel_id),
                feed_id: Set(*feed_id),
                position: Set(position),
            }
            .insert(conn)
            .await?;
        }
        Ok(())
    }

    /// Record the active `(feed, profile)` assignment after a switch
    pub async fn pin(
        &self,
        channel_id: &Uuid,
        feed_id: &Uuid,
        profile_id: &Uuid,
    ) -> RepositoryResult<()> {
        self.set_assignment(channel_id, Some(*feed_id), Some(*profile_id))
            .await
    }

    pub async fn clear_pin(&self, channel_id: &Uuid) -> RepositoryResult<()> {
        self.set_assignment(channel_id, None, None).await
    }

    async fn set_assignment(
        &self,
        channel_id: &Uuid,
        feed_id: Option<Uuid>,
        profile_id: Option<Uuid>,
    ) -> RepositoryResult<()> {
        let model = Channels::find_by_id(*channel_id)
            .one(&*self.connection)
            .await?
            .ok_or_else(|| RepositoryError::not_found("channels", "id", channel_id))?;

        let mut active_model: channels::ActiveModel = model.into();
        active_model.active_feed_id = Set(feed_id);
        active_model.active_profile_id = Set(profile_id);
        active_model.updated_at = Set(chrono::Utc::now());
        active_model.update(&*self.connection).await?;

        debug!(
            "Channel {} assignment set to feed {:?} / profile {:?}",
            channel_id, feed_id, profile_id
        );
        Ok(())
    }

    /// Number of channels referencing a feed
    pub async fn count_feed_associations<C: ConnectionTrait>(
        conn: &C,
        feed_id: &Uuid,
    ) -> RepositoryResult<u64> {
        Ok(ChannelFeeds::find()
            .filter(channel_feeds::Column::FeedId.eq(*feed_id))
            .count(conn)
            .await?)
    }
}

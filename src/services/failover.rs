//! Failover sequencing: ordered alternates for a channel whose current feed
//! stopped delivering.

use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::repositories::{
    AccountSeaOrmRepository, ChannelSeaOrmRepository, FeedSeaOrmRepository,
};
use crate::errors::{ResolutionError, ResolutionResult};
use crate::models::{AlternateFeed, DeliveryProfile, StreamDescriptor};
use crate::services::feed_resolver::FeedResolver;
use crate::services::stream_prober::ProbePool;
use crate::utils::url::UrlUtils;

#[derive(Clone)]
pub struct FailoverSequencer {
    channels: ChannelSeaOrmRepository,
    feeds: FeedSeaOrmRepository,
    accounts: AccountSeaOrmRepository,
    resolver: FeedResolver,
    probe_pool: ProbePool,
}

impl FailoverSequencer {
    pub fn new(
        connection: Arc<DatabaseConnection>,
        resolver: FeedResolver,
        probe_pool: ProbePool,
    ) -> Self {
        Self {
            channels: ChannelSeaOrmRepository::new(connection.clone()),
            feeds: FeedSeaOrmRepository::new(connection.clone()),
            accounts: AccountSeaOrmRepository::new(connection),
            resolver,
            probe_pool,
        }
    }

    /// Every assigned feed except `exclude_feed_id`, in priority order, paired
    /// with the profile it would play through. Feeds whose account yields no
    /// profile are skipped.
    pub async fn alternates(
        &self,
        channel_id: Uuid,
        exclude_feed_id: Option<Uuid>,
    ) -> ResolutionResult<Vec<AlternateFeed>> {
        let channel = self
            .channels
            .find_by_id(&channel_id)
            .await?
            .ok_or(ResolutionError::ChannelNotFound { channel_id })?;

        let mut profiles_by_account: HashMap<Uuid, Option<Uuid>> = HashMap::new();
        let mut alternates = Vec::with_capacity(channel.feed_ids.len());

        for feed_id in channel
            .feed_ids
            .iter()
            .filter(|id| Some(**id) != exclude_feed_id)
        {
            let Some(feed) = self.feeds.find_by_id(feed_id).await? else {
                warn!("Channel {} references missing feed {}", channel_id, feed_id);
                continue;
            };

            let profile_id = match profiles_by_account.get(&feed.account_id) {
                Some(cached) => *cached,
                None => {
                    let profiles = self.accounts.profiles_for_account(&feed.account_id).await?;
                    let selected = DeliveryProfile::select(&profiles).map(|p| p.id);
                    profiles_by_account.insert(feed.account_id, selected);
                    selected
                }
            };

            match profile_id {
                Some(profile_id) => alternates.push(AlternateFeed {
                    feed_id: feed.id,
                    profile_id,
                    name: feed.name,
                }),
                None => warn!(
                    "Skipping feed {} on channel {}: account {} has no usable profile",
                    feed.id, channel_id, feed.account_id
                ),
            }
        }

        debug!(
            "Channel {} has {} alternate(s) excluding {:?}",
            channel_id,
            alternates.len(),
            exclude_feed_id
        );
        Ok(alternates)
    }

    /// First alternate that resolves and answers a probe
    pub async fn next_playable(
        &self,
        channel_id: Uuid,
        exclude_feed_id: Option<Uuid>,
    ) -> ResolutionResult<Option<StreamDescriptor>> {
        for alternate in self.alternates(channel_id, exclude_feed_id).await? {
            let descriptor = match self
                .resolver
                .switch_resolve(channel_id, alternate.feed_id)
                .await
            {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!("Alternate {} not resolvable: {}", alternate.feed_id, e);
                    continue;
                }
            };

            let result = self
                .probe_pool
                .probe(&descriptor.url, &descriptor.user_agent)
                .await;
            if result.valid {
                info!(
                    "Channel {} fails over to feed {} at {}",
                    channel_id,
                    alternate.feed_id,
                    UrlUtils::obfuscate_credentials(&descriptor.url)
                );
                return Ok(Some(descriptor));
            }
            debug!(
                "Alternate {} unreachable: {}",
                alternate.feed_id, result.message
            );
        }

        info!("No playable alternate for channel {}", channel_id);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ProbeConfig};
    use crate::database::Database;
    use crate::models::{AccountCreateRequest, FeedCreateRequest, IdentityField};
    use crate::runtime_settings::RuntimeSettingsStore;
    use anyhow::Result;

    async fn sequencer(db: &Database) -> FailoverSequencer {
        let settings = RuntimeSettingsStore::from_config(&Config::default());
        let resolver = FeedResolver::new(db.connection(), settings);
        FailoverSequencer::new(
            db.connection(),
            resolver,
            ProbePool::from_config(&ProbeConfig::default()),
        )
    }

    async fn account_with_feeds(db: &Database, count: usize) -> Result<(Uuid, Vec<Uuid>)> {
        let account = AccountSeaOrmRepository::new(db.connection())
            .create(AccountCreateRequest {
                name: "Provider".to_string(),
                user_agent: None,
                file_path: None,
                is_active: true,
            })
            .await?;
        let repo = FeedSeaOrmRepository::new(db.connection());
        let mut ids = Vec::new();
        for i in 0..count {
            let feed = repo
                .create(
                    FeedCreateRequest {
                        account_id: account.id,
                        name: format!("Feed {i}"),
                        url: format!("http://host/{i}.ts"),
                        guide_id: None,
                    },
                    &[IdentityField::Url],
                )
                .await?;
            ids.push(feed.id);
        }
        Ok((account.id, ids))
    }

    #[tokio::test]
    async fn test_alternates_skip_excluded_and_keep_order() -> Result<()> {
        let db = Database::in_memory().await?;
        let (_, feeds) = account_with_feeds(&db, 3).await?;
        let channel = ChannelSeaOrmRepository::new(db.connection())
            .create("News", &[feeds[2], feeds[0], feeds[1]])
            .await?;
        let sequencer = sequencer(&db).await;

        let alternates = sequencer.alternates(channel.id, Some(feeds[0])).await?;
        let ids: Vec<Uuid> = alternates.iter().map(|a| a.feed_id).collect();
        assert_eq!(ids, vec![feeds[2], feeds[1]]);
        assert_eq!(alternates[0].name, "Feed 2");

        let again = sequencer.alternates(channel.id, Some(feeds[0])).await?;
        assert_eq!(alternates, again);
        Ok(())
    }

    #[tokio::test]
    async fn test_alternates_skip_accounts_without_profiles() -> Result<()> {
        let db = Database::in_memory().await?;
        let (account_id, feeds) = account_with_feeds(&db, 2).await?;
        let accounts = AccountSeaOrmRepository::new(db.connection());
        for profile in accounts.profiles_for_account(&account_id).await? {
            accounts.delete_profile(&profile.id).await?;
        }
        let channel = ChannelSeaOrmRepository::new(db.connection())
            .create("News", &feeds)
            .await?;

        let alternates = sequencer(&db).await.alternates(channel.id, None).await?;
        assert!(alternates.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_channel_has_no_alternates() -> Result<()> {
        let db = Database::in_memory().await?;
        let channel = ChannelSeaOrmRepository::new(db.connection())
            .create("Empty", &[])
            .await?;
        let sequencer = sequencer(&db).await;

        assert!(sequencer.alternates(channel.id, None).await?.is_empty());
        assert!(sequencer.next_playable(channel.id, None).await?.is_none());
        assert!(matches!(
            sequencer.alternates(Uuid::new_v4(), None).await,
            Err(ResolutionError::ChannelNotFound { .. })
        ));
        Ok(())
    }
}

//! Feed resolution
//!
//! Turns a logical channel (or a single feed) into the [`StreamDescriptor`]
//! the relay needs: which feed, through which delivery profile, at which
//! rewritten URL and with which user agent.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::repositories::{
    AccountSeaOrmRepository, ChannelSeaOrmRepository, FeedSeaOrmRepository,
};
use crate::errors::{ResolutionError, ResolutionResult};
use crate::models::{DeliveryProfile, Feed, LogicalChannel, StreamDescriptor, StreamTarget};
use crate::runtime_settings::RuntimeSettingsStore;
use crate::services::stream_prober::ProbePool;
use crate::utils::url::UrlUtils;

static DOLLAR_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)").expect("group reference regex should compile"));

static BRACED_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\d+)\}").expect("braced group regex should compile"));

/// Rewrite `url` with a delivery profile's search/replace pair.
///
/// `$N` tokens in the replacement become `${N}`, where `N` is every digit
/// that follows the `$` (`$10` names group 10, not group 1 then `0`). A
/// pattern that does not compile, or a replacement naming a group the
/// pattern lacks, leaves the URL untouched.
pub fn transform(url: &str, search_pattern: &str, replace_pattern: &str) -> String {
    let safe_replace = DOLLAR_GROUP.replace_all(replace_pattern, "$${${1}}");

    let pattern = match Regex::new(search_pattern) {
        Ok(pattern) => pattern,
        Err(e) => {
            warn!(
                "Invalid search pattern '{}', using original URL: {}",
                search_pattern, e
            );
            return url.to_string();
        }
    };

    let group_count = pattern.captures_len();
    let missing_group = BRACED_GROUP
        .captures_iter(&safe_replace)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<usize>().ok())
        .find(|group| *group >= group_count);
    if let Some(group) = missing_group {
        warn!(
            "Replacement '{}' references group {} but pattern '{}' has {}, using original URL",
            replace_pattern,
            group,
            search_pattern,
            group_count - 1
        );
        return url.to_string();
    }

    pattern.replace_all(url, safe_replace.as_ref()).into_owned()
}

/// Resolves channels and feeds to stream descriptors
#[derive(Clone)]
pub struct FeedResolver {
    channels: ChannelSeaOrmRepository,
    feeds: FeedSeaOrmRepository,
    accounts: AccountSeaOrmRepository,
    settings: RuntimeSettingsStore,
    /// Set when every resolution should also be probed
    probe_pool: Option<ProbePool>,
}

impl FeedResolver {
    pub fn new(connection: Arc<DatabaseConnection>, settings: RuntimeSettingsStore) -> Self {
        Self {
            channels: ChannelSeaOrmRepository::new(connection.clone()),
            feeds: FeedSeaOrmRepository::new(connection.clone()),
            accounts: AccountSeaOrmRepository::new(connection),
            settings,
            probe_pool: None,
        }
    }

    /// Probe each resolved URL. The probe is logged and never changes the result.
    pub fn with_probe_on_resolve(mut self, probe_pool: ProbePool) -> Self {
        self.probe_pool = Some(probe_pool);
        self
    }

    /// Resolve a channel through its current assignment
    pub async fn resolve(&self, channel_id: Uuid) -> ResolutionResult<StreamDescriptor> {
        let channel = self.load_channel(channel_id).await?;
        let (feed_id, profile_id) = self
            .current_assignment(&channel)
            .await?
            .ok_or(ResolutionError::NoFeedAssigned { channel_id })?;

        let missing = ResolutionError::FeedOrProfileMissing {
            feed_id,
            profile_id,
        };
        let Some(feed) = self.feeds.find_by_id(&feed_id).await? else {
            return Err(missing);
        };
        let Some(profile) = self.accounts.find_profile(&profile_id).await? else {
            return Err(missing);
        };

        let descriptor = self.build_descriptor(&feed, &profile, false).await?;
        debug!(
            "Resolved channel {} to feed {} via profile {}",
            channel_id, feed.id, profile.id
        );
        self.maybe_probe(&descriptor).await;
        Ok(descriptor)
    }

    /// Resolve a channel onto an explicit feed, ignoring its current assignment
    pub async fn switch_resolve(
        &self,
        channel_id: Uuid,
        target_feed_id: Uuid,
    ) -> ResolutionResult<StreamDescriptor> {
        self.load_channel(channel_id).await?;

        let feed = self
            .feeds
            .find_by_id(&target_feed_id)
            .await?
            .ok_or(ResolutionError::FeedNotFound {
                feed_id: target_feed_id,
            })?;
        let profile = self.profile_for_feed(&feed).await?;

        let descriptor = self.build_descriptor(&feed, &profile, true).await?;
        info!(
            "Switch for channel {} resolved to feed {} ({})",
            channel_id,
            feed.id,
            descriptor.profile_descriptor.as_deref().unwrap_or_default()
        );
        self.maybe_probe(&descriptor).await;
        Ok(descriptor)
    }

    /// Resolve whatever the caller holds: a channel id or a feed identity hash
    pub async fn resolve_target(&self, target: &StreamTarget) -> ResolutionResult<StreamDescriptor> {
        match target {
            StreamTarget::Channel(channel_id) => self.resolve(*channel_id).await,
            StreamTarget::FeedHash(hash) => {
                let feed = self
                    .feeds
                    .find_by_identity_hash(hash)
                    .await?
                    .ok_or_else(|| ResolutionError::UnknownFeedHash { hash: hash.clone() })?;
                let profile = self.profile_for_feed(&feed).await?;
                let descriptor = self.build_descriptor(&feed, &profile, false).await?;
                self.maybe_probe(&descriptor).await;
                Ok(descriptor)
            }
        }
    }

    /// Record the assignment a successful switch settled on
    pub async fn pin(
        &self,
        channel_id: Uuid,
        feed_id: Uuid,
        profile_id: Uuid,
    ) -> ResolutionResult<()> {
        self.load_channel(channel_id).await?;
        self.channels.pin(&channel_id, &feed_id, &profile_id).await?;
        info!(
            "Pinned channel {} to feed {} / profile {}",
            channel_id, feed_id, profile_id
        );
        Ok(())
    }

    async fn load_channel(&self, channel_id: Uuid) -> ResolutionResult<LogicalChannel> {
        self.channels
            .find_by_id(&channel_id)
            .await?
            .ok_or(ResolutionError::ChannelNotFound { channel_id })
    }

    /// The pinned pair when complete, otherwise the first feed in priority
    /// order whose account yields a profile
    async fn current_assignment(
        &self,
        channel: &LogicalChannel,
    ) -> ResolutionResult<Option<(Uuid, Uuid)>> {
        if let Some(pinned) = channel.pinned_assignment() {
            return Ok(Some(pinned));
        }

        let mut profiles_by_account: HashMap<Uuid, Option<Uuid>> = HashMap::new();
        for feed_id in &channel.feed_ids {
            let Some(feed) = self.feeds.find_by_id(feed_id).await? else {
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
            if let Some(profile_id) = profile_id {
                return Ok(Some((feed.id, profile_id)));
            }
        }
        Ok(None)
    }

    async fn profile_for_feed(&self, feed: &Feed) -> ResolutionResult<DeliveryProfile> {
        let profiles = self.accounts.profiles_for_account(&feed.account_id).await?;
        DeliveryProfile::select(&profiles)
            .cloned()
            .ok_or(ResolutionError::NoProfileForFeed { feed_id: feed.id })
    }

    async fn build_descriptor(
        &self,
        feed: &Feed,
        profile: &DeliveryProfile,
        with_profile_descriptor: bool,
    ) -> ResolutionResult<StreamDescriptor> {
        let account_agent = self
            .accounts
            .find_by_id(&profile.account_id)
            .await?
            .and_then(|account| account.user_agent)
            .filter(|agent| !agent.trim().is_empty());
        let user_agent = match account_agent {
            Some(agent) => agent,
            None => self.settings.default_user_agent().await,
        };

        Ok(StreamDescriptor {
            url: transform(&feed.url, &profile.search_pattern, &profile.replace_pattern),
            user_agent,
            transcode: profile.transcodes(),
            profile_id: profile.id,
            feed_id: feed.id,
            profile_descriptor: with_profile_descriptor.then(|| profile.descriptor()),
        })
    }

    async fn maybe_probe(&self, descriptor: &StreamDescriptor) {
        if let Some(pool) = &self.probe_pool {
            let result = pool.probe(&descriptor.url, &descriptor.user_agent).await;
            debug!(
                "Resolve-time probe of {}: {}",
                UrlUtils::obfuscate_credentials(&descriptor.url),
                result.message
            );
        }
    }
}

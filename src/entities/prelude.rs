pub use super::accounts::Entity as Accounts;
pub use super::channel_feeds::Entity as ChannelFeeds;
pub use super::channels::Entity as Channels;
pub use super::delivery_profiles::Entity as DeliveryProfiles;
pub use super::feeds::Entity as Feeds;
pub use super::guide_sources::Entity as GuideSources;
pub use super::kv_entries::Entity as KvEntries;

//! Stream target identifiers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::LogicalChannel;

/// What a playback request points at. The caller decides which kind of
/// identifier it holds; nothing is guessed from the string shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StreamTarget {
    /// A logical channel by id
    Channel(Uuid),
    /// A single feed by its identity hash (preview playback)
    FeedHash(String),
}

impl StreamTarget {
    pub fn channel(id: Uuid) -> Self {
        StreamTarget::Channel(id)
    }

    /// Parse a channel id, failing instead of falling back to a hash lookup
    pub fn parse_channel(raw: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(raw.trim()).map(StreamTarget::Channel)
    }

    pub fn feed_hash(hash: impl Into<String>) -> Self {
        StreamTarget::FeedHash(hash.into())
    }
}

impl std::fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamTarget::Channel(id) => write!(f, "channel:{id}"),
            StreamTarget::FeedHash(hash) => write!(f, "feed:{hash}"),
        }
    }
}

impl LogicalChannel {
    /// The pinned `(feed, profile)` pair, only when both halves are recorded
    pub fn pinned_assignment(&self) -> Option<(Uuid, Uuid)> {
        match (self.active_feed_id, self.active_profile_id) {
            (Some(feed_id), Some(profile_id)) => Some((feed_id, profile_id)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_rejects_hashes() {
        let id = Uuid::new_v4();
        assert_eq!(
            StreamTarget::parse_channel(&id.to_string()).unwrap(),
            StreamTarget::Channel(id)
        );
        assert!(StreamTarget::parse_channel("3f2a9c0d7b").is_err());
    }

    #[test]
    fn test_pinned_assignment_requires_both_halves() {
        let mut channel = LogicalChannel {
            id: Uuid::new_v4(),
            name: "News".to_string(),
            active_feed_id: Some(Uuid::new_v4()),
            active_profile_id: None,
            feed_ids: vec![],
        };
        assert!(channel.pinned_assignment().is_none());

        channel.active_profile_id = Some(Uuid::new_v4());
        assert!(channel.pinned_assignment().is_some());
    }
}

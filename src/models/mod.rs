use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod channel;
pub mod feed;
pub mod profile;

pub use channel::StreamTarget;
pub use feed::IdentityField;

/// An upstream provider account. Accounts own delivery profiles and feeds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    /// Account-level user agent; `None` inherits the system default
    pub user_agent: Option<String>,
    /// Hot-folder path for accounts imported from a dropped playlist
    pub file_path: Option<String>,
    pub is_active: bool,
    /// Modification time (unix millis) of the file version last imported
    pub last_seen_mtime: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountCreateRequest {
    pub name: String,
    pub user_agent: Option<String>,
    pub file_path: Option<String>,
    pub is_active: bool,
}

/// How the relay should deliver a feed routed through a profile
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryMode {
    /// Bytes are relayed untouched
    Proxy,
    /// Bytes are re-encoded by the relay
    Transcode,
}

/// Per-account URL rewrite and transport classification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryProfile {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub search_pattern: String,
    pub replace_pattern: String,
    pub mode: DeliveryMode,
    pub is_default: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryProfileCreateRequest {
    pub account_id: Uuid,
    pub name: String,
    pub search_pattern: String,
    pub replace_pattern: String,
    pub mode: DeliveryMode,
    pub is_default: bool,
    pub is_active: bool,
}

/// A single upstream media source URL tracked under an account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feed {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub url: String,
    /// Program-guide identifier (`tvg-id`)
    pub guide_id: Option<String>,
    pub identity_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedCreateRequest {
    pub account_id: Uuid,
    pub name: String,
    pub url: String,
    pub guide_id: Option<String>,
}

/// Viewer-facing channel aggregating feeds in priority order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogicalChannel {
    pub id: Uuid,
    pub name: String,
    /// Pinned assignment recorded after a switch
    pub active_feed_id: Option<Uuid>,
    pub active_profile_id: Option<Uuid>,
    /// Assigned feeds, highest priority first
    pub feed_ids: Vec<Uuid>,
}

/// A program-guide source, usually created from a dropped XMLTV file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuideSource {
    pub id: Uuid,
    pub name: String,
    pub file_path: Option<String>,
    pub source_type: String,
    pub is_active: bool,
    pub last_seen_mtime: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which hot folder a catalog entry came from
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CatalogKind {
    /// Feed playlists, backed by an [`Account`]
    Playlist,
    /// Program guides, backed by a [`GuideSource`]
    Guide,
}

impl CatalogKind {
    /// File extensions the watcher picks up for this kind
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            CatalogKind::Playlist => &["m3u", "m3u8"],
            CatalogKind::Guide => &["xml", "gz"],
        }
    }

    pub fn accepts(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        self.extensions()
            .iter()
            .any(|ext| lower.ends_with(&format!(".{ext}")))
    }
}

/// Persisted registry entry for an ingested hot-folder file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub kind: CatalogKind,
    pub path: String,
    pub name: String,
    pub is_active: bool,
    pub last_seen_mtime: Option<i64>,
}

/// Everything the relay needs to start pulling a feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamDescriptor {
    pub url: String,
    pub user_agent: String,
    pub transcode: bool,
    pub profile_id: Uuid,
    pub feed_id: Uuid,
    /// Human-readable profile description, filled in by switch resolution
    pub profile_descriptor: Option<String>,
}

/// One failover candidate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlternateFeed {
    pub feed_id: Uuid,
    pub profile_id: Uuid,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_kind_parses_display_form() {
        assert_eq!("playlist".parse::<CatalogKind>().ok(), Some(CatalogKind::Playlist));
        assert_eq!("Guide".parse::<CatalogKind>().ok(), Some(CatalogKind::Guide));
        assert!("epg".parse::<CatalogKind>().is_err());
        assert_eq!(CatalogKind::Guide.to_string(), "guide");
    }
}

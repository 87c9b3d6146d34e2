//! SeaORM entity definitions
//!
//! Identifiers are UUIDs; modification times are unix milliseconds.

pub mod prelude;

pub mod accounts;
pub mod channel_feeds;
pub mod channels;
pub mod delivery_profiles;
pub mod feeds;
pub mod guide_sources;
pub mod kv_entries;

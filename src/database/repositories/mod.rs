//! SeaORM repository implementations
//!
//! Repositories work across SQLite, PostgreSQL and MySQL and return
//! [`crate::errors::RepositoryResult`].

pub mod account;
pub mod catalog;
pub mod channel;
pub mod feed;
pub mod guide_source;
pub mod kv_store;
pub mod traits;

// Re-export for convenience
pub use account::AccountSeaOrmRepository;
pub use catalog::CatalogSeaOrmRepository;
pub use channel::ChannelSeaOrmRepository;
pub use feed::FeedSeaOrmRepository;
pub use guide_source::GuideSourceSeaOrmRepository;
pub use kv_store::{KvStoreSeaOrmRepository, MemoryKeyValueStore};
pub use traits::KeyValueStore;

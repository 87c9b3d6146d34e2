//! Centralized error handling for the channel dispatcher
//!
//! Each layer owns a `thiserror` enum; the binary edge converts everything
//! into [`AppError`] (or `anyhow`).
//!
//! # Error Categories
//!
//! - **Repository Errors**: data access failures (SeaORM, key/value store)
//! - **Resolution Errors**: why a channel could not be turned into a playable URL
//! - **Ingestion Errors**: soft hot-folder failures, logged and counted
//! - **Dedup Errors**: rehash batch failures, each aborting only its own batch

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for resolver and failover results
pub type ResolutionResult<T> = Result<T, ResolutionError>;

//! Error type definitions for the channel dispatcher
//!
//! The hierarchy mirrors the layers: repositories fail with
//! [`RepositoryError`], the serving-side operations return
//! [`ResolutionError`], and the scheduled jobs collect [`IngestionError`] and
//! [`DedupError`] values into their reports instead of aborting.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Resolution errors surfaced to the CLI
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Data serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// A stored value could not be decoded back into its domain type
    #[error("Invalid stored value: {table}.{field} = {value}")]
    InvalidValue {
        table: String,
        field: String,
        value: String,
    },

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },
}

impl RepositoryError {
    pub fn not_found(table: &str, field: &str, value: impl ToString) -> Self {
        Self::RecordNotFound {
            table: table.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn invalid_value(table: &str, field: &str, value: impl ToString) -> Self {
        Self::InvalidValue {
            table: table.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

/// Why a channel or feed could not be turned into a stream descriptor.
///
/// These are ordinary return values for the serving layer, which decides how
/// to degrade (try the next alternate, report the channel unavailable).
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Channel {channel_id} not found")]
    ChannelNotFound { channel_id: Uuid },

    #[error("No feed assigned to channel {channel_id}")]
    NoFeedAssigned { channel_id: Uuid },

    #[error("Feed {feed_id} or profile {profile_id} no longer exists")]
    FeedOrProfileMissing { feed_id: Uuid, profile_id: Uuid },

    #[error("Feed {feed_id} not found")]
    FeedNotFound { feed_id: Uuid },

    #[error("No delivery profile available for feed {feed_id}")]
    NoProfileForFeed { feed_id: Uuid },

    #[error("No feed with identity hash {hash}")]
    UnknownFeedHash { hash: String },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Soft hot-folder failures. Neither variant aborts a scan.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// The folder could not be listed this tick; retried on the next one
    #[error("Directory unavailable: {path}: {message}")]
    DirectoryUnavailable { path: PathBuf, message: String },

    /// A single file could not be processed; it is skipped and counted
    #[error("Failed to process {path}: {message}")]
    PerFile { path: PathBuf, message: String },
}

/// Rehash failures. A failed batch is rolled back; earlier batches stay committed.
#[derive(Error, Debug)]
pub enum DedupError {
    #[error("Rehash batch {batch} failed: {source}")]
    BatchTransactionFailure {
        batch: usize,
        #[source]
        source: sea_orm::DbErr,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_error_messages_name_the_ids() {
        let channel_id = Uuid::new_v4();
        let err = ResolutionError::NoFeedAssigned { channel_id };
        assert_eq!(
            err.to_string(),
            format!("No feed assigned to channel {channel_id}")
        );
    }

    #[test]
    fn repository_error_converts_into_resolution_error() {
        let repo_err = RepositoryError::not_found("feeds", "id", "abc");
        let err: ResolutionError = repo_err.into();
        assert!(matches!(err, ResolutionError::Repository(_)));
        assert!(err.to_string().contains("feeds with id = abc"));
    }

    #[test]
    fn dedup_error_reports_batch_number() {
        let err = DedupError::BatchTransactionFailure {
            batch: 3,
            source: sea_orm::DbErr::Custom("locked".to_string()),
        };
        assert!(err.to_string().starts_with("Rehash batch 3 failed"));
    }
}

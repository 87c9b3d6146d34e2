//! Feed identity rehash and duplicate reconciliation
//!
//! Feeds are walked in id order, a fixed number per transaction. Every feed
//! gets its identity hash recomputed for the current field set; when two
//! feeds land on the same hash the one no channel uses is removed.
//!
//! Collision policy, applied against the feed previously retained for the
//! hash in this run:
//! - the current feed has no channel associations: delete it
//! - otherwise, the retained feed has none: delete that one, the current feed
//!   becomes canonical
//! - otherwise both stay and the index moves to the current (later) feed
//!
//! The last rule is plain last-write-wins in id order. Ids are random v4
//! UUIDs, so "later" means later in id order, not registered later.

use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::database::repositories::{ChannelSeaOrmRepository, FeedSeaOrmRepository};
use crate::errors::{DedupError, RepositoryError};
use crate::models::{Feed, IdentityField};
use crate::services::update_broadcaster::{UpdateBroadcaster, UpdateEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RehashStats {
    pub batches_committed: usize,
    pub batches_failed: usize,
    pub feeds_rehashed: usize,
    pub feeds_deleted: usize,
}

/// Outcome of a full run. Failed batches are listed, not raised.
#[derive(Debug, Default)]
pub struct RehashReport {
    pub stats: RehashStats,
    pub errors: Vec<DedupError>,
}

impl RehashReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Default)]
struct BatchOutcome {
    staged_index: HashMap<String, Uuid>,
    rehashed: usize,
    deleted: usize,
}

pub struct RehashEngine {
    connection: Arc<DatabaseConnection>,
    batch_size: u64,
    broadcaster: Option<UpdateBroadcaster>,
}

impl RehashEngine {
    pub fn new(connection: Arc<DatabaseConnection>, batch_size: u64) -> Self {
        Self {
            connection,
            batch_size: batch_size.max(1),
            broadcaster: None,
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: UpdateBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Recompute every feed's identity hash for `fields` and reconcile collisions
    pub async fn rehash(&self, fields: &[IdentityField]) -> RehashReport {
        info!(
            "Starting rehash with identity fields [{}], batch size {}",
            IdentityField::join(fields),
            self.batch_size
        );

        let mut report = RehashReport::default();
        let mut index: HashMap<String, Uuid> = HashMap::new();
        let mut cursor: Option<Uuid> = None;
        let mut batch_number = 0usize;

        loop {
            let batch = match FeedSeaOrmRepository::find_batch_after(
                &*self.connection,
                cursor,
                self.batch_size,
            )
            .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    error!("Failed to load rehash batch {}: {}", batch_number, e);
                    report.stats.batches_failed += 1;
                    report.errors.push(DedupError::BatchTransactionFailure {
                        batch: batch_number,
                        source: into_db_err(e),
                    });
                    break;
                }
            };

            let Some(last) = batch.last() else {
                break;
            };
            cursor = Some(last.id);

            match self.process_batch(&batch, &index, fields).await {
                Ok(outcome) => {
                    index.extend(outcome.staged_index);
                    report.stats.batches_committed += 1;
                    report.stats.feeds_rehashed += outcome.rehashed;
                    report.stats.feeds_deleted += outcome.deleted;
                    debug!(
                        "Rehash batch {} committed: {} feeds, {} deleted",
                        batch_number, outcome.rehashed, outcome.deleted
                    );
                }
                Err(e) => {
                    warn!("Rehash batch {} rolled back: {}", batch_number, e);
                    report.stats.batches_failed += 1;
                    report.errors.push(DedupError::BatchTransactionFailure {
                        batch: batch_number,
                        source: e,
                    });
                }
            }

            batch_number += 1;
            if (batch.len() as u64) < self.batch_size {
                break;
            }
        }

        info!(
            "Rehash finished: {} feeds rehashed, {} deleted, {} batch(es) committed, {} failed",
            report.stats.feeds_rehashed,
            report.stats.feeds_deleted,
            report.stats.batches_committed,
            report.stats.batches_failed
        );

        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.publish(UpdateEvent::RehashComplete {
                stats: report.stats.clone(),
            });
        }
        report
    }

    async fn process_batch(
        &self,
        batch: &[Feed],
        index: &HashMap<String, Uuid>,
        fields: &[IdentityField],
    ) -> Result<BatchOutcome, DbErr> {
        let txn = self.connection.begin().await?;
        match Self::reconcile(&txn, batch, index, fields).await {
            Ok(outcome) => {
                txn.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    error!("Rollback of rehash batch failed: {}", rollback_err);
                }
                Err(into_db_err(e))
            }
        }
    }

    async fn reconcile(
        txn: &DatabaseTransaction,
        batch: &[Feed],
        index: &HashMap<String, Uuid>,
        fields: &[IdentityField],
    ) -> Result<BatchOutcome, RepositoryError> {
        let mut outcome = BatchOutcome::default();

        for feed in batch {
            let hash = feed.compute_identity_hash(fields);
            FeedSeaOrmRepository::update_identity_hash(txn, &feed.id, &hash).await?;
            outcome.rehashed += 1;

            let retained = outcome
                .staged_index
                .get(&hash)
                .or_else(|| index.get(&hash))
                .copied();

            let Some(retained_id) = retained.filter(|id| *id != feed.id) else {
                outcome.staged_index.insert(hash, feed.id);
                continue;
            };

            if ChannelSeaOrmRepository::count_feed_associations(txn, &feed.id).await? == 0 {
                debug!(
                    "Feed {} duplicates {} and is unused, deleting",
                    feed.id, retained_id
                );
                FeedSeaOrmRepository::delete(txn, &feed.id).await?;
                outcome.deleted += 1;
                continue;
            }

            if ChannelSeaOrmRepository::count_feed_associations(txn, &retained_id).await? == 0 {
                debug!(
                    "Feed {} duplicates {} which is unused, deleting the older one",
                    feed.id, retained_id
                );
                if FeedSeaOrmRepository::delete(txn, &retained_id).await? {
                    outcome.deleted += 1;
                }
            } else {
                debug!(
                    "Feeds {} and {} share a hash and are both in use, keeping both",
                    retained_id, feed.id
                );
            }
            outcome.staged_index.insert(hash, feed.id);
        }

        Ok(outcome)
    }
}

fn into_db_err(error: RepositoryError) -> DbErr {
    match error {
        RepositoryError::Database(e) => e,
        other => DbErr::Custom(other.to_string()),
    }
}

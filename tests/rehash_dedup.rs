//! Changing the identity fields at runtime schedules a rehash that folds
//! duplicate feeds together

mod common;

use std::sync::Arc;
use std::time::Duration;

use channel_dispatcher::config::Config;
use channel_dispatcher::database::Database;
use channel_dispatcher::database::repositories::{
    ChannelSeaOrmRepository, FeedSeaOrmRepository, KvStoreSeaOrmRepository,
};
use channel_dispatcher::job_scheduling::{JobExecutor, JobQueue, JobQueueRunner};
use channel_dispatcher::models::IdentityField;
use channel_dispatcher::runtime_settings::RuntimeSettingsStore;
use channel_dispatcher::services::{RehashEngine, UpdateBroadcaster, UpdateEvent};

#[tokio::test]
async fn identity_change_dedups_across_batches() -> anyhow::Result<()> {
    let db = Database::in_memory().await?;
    let provider = common::seed_account(&db, "Provider").await?;

    // Same URL under three names; under the default identity they are distinct
    let used = common::seed_feed(&db, &provider, "BBC One HD", "http://host/bbc1").await?;
    common::seed_feed(&db, &provider, "BBC One", "http://host/bbc1").await?;
    common::seed_feed(&db, &provider, "BBC 1", "http://host/bbc1").await?;
    let other = common::seed_feed(&db, &provider, "ITV", "http://host/itv").await?;
    let also_used = common::seed_feed(&db, &provider, "ITV HD", "http://host/itv").await?;

    let channels = ChannelSeaOrmRepository::new(db.connection());
    channels.create("BBC One", &[used.id]).await?;
    channels.create("ITV", &[other.id]).await?;
    channels.create("ITV HD", &[also_used.id]).await?;

    let config = Config::default();
    let queue = Arc::new(JobQueue::new());
    let settings = RuntimeSettingsStore::from_config(&config).with_job_queue(queue.clone());
    let broadcaster = UpdateBroadcaster::new();
    let mut updates = broadcaster.subscribe();

    let engine = Arc::new(RehashEngine::new(db.connection(), 2).with_broadcaster(broadcaster));
    let executor = JobExecutor::new(
        engine,
        KvStoreSeaOrmRepository::new(db.connection()),
        settings.clone(),
    );
    let runner = JobQueueRunner::new(queue.clone(), Arc::new(executor), &config.job_scheduling);

    assert!(settings.update_identity_fields("url").await);
    assert!(queue.contains_job_key("rehash").await);

    assert_eq!(runner.process_pending_jobs().await, 1);
    assert!(
        runner
            .wait_for_running_jobs_to_complete(Duration::from_secs(10))
            .await
    );

    let message = updates.recv().await?;
    let UpdateEvent::RehashComplete { stats } = message.data else {
        panic!("expected a rehash notification, got {:?}", message.data);
    };
    assert_eq!(stats.feeds_deleted, 2);
    assert_eq!(stats.batches_failed, 0);
    assert_eq!(stats.batches_committed, 3);

    let feeds = FeedSeaOrmRepository::new(db.connection());
    assert_eq!(feeds.count().await?, 3);
    assert!(feeds.find_by_id(&used.id).await?.is_some());
    assert!(feeds.find_by_id(&other.id).await?.is_some());
    assert!(feeds.find_by_id(&also_used.id).await?.is_some());

    let survivor = feeds.find_by_id(&used.id).await?.unwrap();
    assert_eq!(
        survivor.identity_hash,
        survivor.compute_identity_hash(&[IdentityField::Url])
    );
    Ok(())
}

#[tokio::test]
async fn rerunning_changes_nothing() -> anyhow::Result<()> {
    let db = Database::in_memory().await?;
    let provider = common::seed_account(&db, "Provider").await?;
    for name in ["A", "B", "C", "D", "E"] {
        common::seed_feed(&db, &provider, name, "http://host/same").await?;
    }

    let engine = RehashEngine::new(db.connection(), 2);
    let first = engine.rehash(&[IdentityField::Url]).await;
    assert_eq!(first.stats.feeds_deleted, 4);
    assert!(first.is_clean());

    let second = engine.rehash(&[IdentityField::Url]).await;
    assert_eq!(second.stats.feeds_deleted, 0);
    assert_eq!(second.stats.feeds_rehashed, 1);
    assert_eq!(FeedSeaOrmRepository::new(db.connection()).count().await?, 1);
    Ok(())
}

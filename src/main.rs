use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use channel_dispatcher::{
    config::Config,
    database::{
        Database,
        repositories::{CatalogSeaOrmRepository, KvStoreSeaOrmRepository},
    },
    ingestor::{IngestionLedger, IngestionWatcher, WatcherService},
    job_scheduling::{
        JobExecutor, JobPriority, JobQueue, JobQueueRunner, JobType, ScheduledJob,
        job_executor::PURGE_EXPIRED_KV,
    },
    models::{CatalogKind, IdentityField, StreamTarget},
    observability::init_tracing,
    runtime_settings::{RuntimeSettings, RuntimeSettingsStore},
    services::{
        FailoverSequencer, FeedResolver, ProbePool, ProbeTimeouts, RehashEngine, StreamProber,
        UpdateBroadcaster,
    },
};

#[derive(Parser)]
#[command(name = "channel-dispatcher")]
#[command(version)]
#[command(about = "Stream resolution, failover and hot-folder ingestion for IPTV channels")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the hot folders and run background jobs until Ctrl-C
    Watch,
    /// Resolve a channel (or, with --hash, a feed identity hash) to a stream
    Resolve {
        target: String,
        #[arg(long)]
        hash: bool,
    },
    /// List failover candidates for a channel
    Alternates {
        channel: Uuid,
        #[arg(long)]
        exclude: Option<Uuid>,
        /// Probe candidates and print the first reachable one
        #[arg(long)]
        playable: bool,
    },
    /// Check whether a stream URL delivers bytes
    Probe {
        url: String,
        #[arg(long)]
        user_agent: Option<String>,
        #[arg(long, value_parser = humantime::parse_duration)]
        connect_timeout: Option<Duration>,
        #[arg(long, value_parser = humantime::parse_duration)]
        read_timeout: Option<Duration>,
    },
    /// Recompute feed identity hashes and drop unused duplicates
    Rehash {
        /// Comma separated identity fields; defaults to the configured set
        #[arg(long)]
        fields: Option<String>,
    },
    /// Show the debounce ledger for one hot folder
    Ledger {
        /// `playlist` or `guide`
        #[arg(long, default_value = "playlist", value_parser = parse_catalog_kind)]
        kind: CatalogKind,
    },
    /// Apply database migrations and exit
    Migrate,
    /// Write a default configuration file and exit
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let reload_handle = init_tracing(&cli.log_level, cli.json_logs)?;

    if let Command::Init = cli.command {
        return Config::write_default(&cli.config);
    }

    let mut config = Config::load_from_file(&cli.config)?;
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    if let Command::Probe {
        url,
        user_agent,
        connect_timeout,
        read_timeout,
    } = &cli.command
    {
        let prober = StreamProber::new(&config.probe);
        let defaults = prober.timeouts();
        let timeouts = ProbeTimeouts {
            connect: connect_timeout.unwrap_or(defaults.connect),
            read: read_timeout.unwrap_or(defaults.read),
        };
        let user_agent = user_agent
            .clone()
            .unwrap_or_else(|| RuntimeSettings::from_config(&config).default_user_agent);
        let result = prober.probe_with_timeouts(url, &user_agent, timeouts).await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    info!("Using database: {}", config.database.url);
    let database = Database::new(&config.database).await?;
    database.migrate().await?;

    let job_queue = Arc::new(JobQueue::new());
    let settings = RuntimeSettingsStore::from_config(&config)
        .with_tracing_reload(reload_handle)
        .with_job_queue(job_queue.clone());
    let mut resolver = FeedResolver::new(database.connection(), settings.clone());
    if config.resolver.probe_on_resolve {
        resolver = resolver.with_probe_on_resolve(ProbePool::from_config(&config.probe));
    }

    match cli.command {
        Command::Watch => run_watch(config, database, job_queue, settings).await?,
        Command::Resolve { target, hash } => {
            let target = if hash {
                StreamTarget::feed_hash(target)
            } else {
                StreamTarget::parse_channel(&target)?
            };
            let descriptor = resolver.resolve_target(&target).await?;
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
        }
        Command::Alternates {
            channel,
            exclude,
            playable,
        } => {
            let sequencer = FailoverSequencer::new(
                database.connection(),
                resolver,
                ProbePool::from_config(&config.probe),
            );
            if playable {
                match sequencer.next_playable(channel, exclude).await? {
                    Some(descriptor) => {
                        println!("{}", serde_json::to_string_pretty(&descriptor)?)
                    }
                    None => println!("No playable alternate for channel {channel}"),
                }
            } else {
                let alternates = sequencer.alternates(channel, exclude).await?;
                println!("{}", serde_json::to_string_pretty(&alternates)?);
            }
        }
        Command::Rehash { fields } => {
            let fields = match fields {
                Some(raw) => IdentityField::parse_list(&raw),
                None => settings.identity_fields().await,
            };
            if fields.is_empty() {
                anyhow::bail!("No valid identity fields given");
            }
            let report = RehashEngine::new(database.connection(), config.dedup.batch_size)
                .rehash(&fields)
                .await;
            for err in &report.errors {
                error!("{}", err);
            }
            println!("{}", serde_json::to_string_pretty(&report.stats)?);
        }
        Command::Ledger { kind } => {
            let ledger = IngestionLedger::new(
                Arc::new(KvStoreSeaOrmRepository::new(database.connection())),
                config.ingestion.ledger_ttl,
            );
            let entries: BTreeMap<String, i64> = ledger.entries(kind).await?.into_iter().collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Command::Migrate => info!("Migrations applied"),
        Command::Probe { .. } | Command::Init => {}
    }

    Ok(())
}

fn parse_catalog_kind(raw: &str) -> Result<CatalogKind, strum::ParseError> {
    raw.parse()
}

async fn run_watch(
    config: Config,
    database: Database,
    job_queue: Arc<JobQueue>,
    settings: RuntimeSettingsStore,
) -> Result<()> {
    info!(
        "Starting channel dispatcher v{}",
        env!("CARGO_PKG_VERSION")
    );

    let broadcaster = UpdateBroadcaster::new();
    let mut updates = broadcaster.subscribe();
    tokio::spawn(async move {
        while let Ok(message) = updates.recv().await {
            if let Ok(json) = message.to_json() {
                debug!("Update: {}", json);
            }
        }
    });

    let rehash_engine = Arc::new(
        RehashEngine::new(database.connection(), config.dedup.batch_size)
            .with_broadcaster(broadcaster.clone()),
    );
    let executor = JobExecutor::new(
        rehash_engine,
        KvStoreSeaOrmRepository::new(database.connection()),
        settings.clone(),
    );
    let runner = JobQueueRunner::new(
        job_queue.clone(),
        Arc::new(executor),
        &config.job_scheduling,
    );

    job_queue
        .enqueue(ScheduledJob::new(
            JobType::Maintenance(PURGE_EXPIRED_KV.to_string()),
            JobPriority::Maintenance,
        ))
        .await?;

    let ledger = IngestionLedger::new(
        Arc::new(KvStoreSeaOrmRepository::new(database.connection())),
        config.ingestion.ledger_ttl,
    );
    let watcher = IngestionWatcher::new(
        &config.ingestion,
        CatalogSeaOrmRepository::new(database.connection()),
        ledger,
        job_queue,
        broadcaster,
        settings,
    );
    let watcher_service = WatcherService::new(watcher, config.ingestion.scan_interval);

    let cancellation_token = CancellationToken::new();
    let runner_handle = {
        let token = cancellation_token.clone();
        tokio::spawn(async move { runner.run(token).await })
    };
    let watcher_handle = {
        let token = cancellation_token.clone();
        tokio::spawn(async move { watcher_service.run(token).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    cancellation_token.cancel();

    if let Err(e) = watcher_handle.await {
        error!("Watcher task failed: {}", e);
    }
    if let Err(e) = runner_handle.await {
        error!("Job runner task failed: {}", e);
    }
    Ok(())
}

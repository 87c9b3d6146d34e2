//! Hot-folder watcher
//!
//! Each tick lists the playlist and guide folders and decides, per file,
//! whether it is new work: too-young files wait, files already in the ledger
//! are skipped, and anything else is registered in the catalog and, when
//! active, handed to a refresh job.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::ledger::IngestionLedger;
use crate::config::IngestionConfig;
use crate::database::repositories::CatalogSeaOrmRepository;
use crate::errors::IngestionError;
use crate::job_scheduling::{JobPriority, JobQueue, JobType, ScheduledJob};
use crate::models::CatalogKind;
use crate::runtime_settings::RuntimeSettingsStore;
use crate::services::update_broadcaster::{UpdateBroadcaster, UpdateEvent};

/// Minimum gap between two "directory unavailable" warnings for one folder
pub const DIRECTORY_WARNING_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Per-folder result of one tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub kind: CatalogKind,
    pub directory: PathBuf,
    /// Files registered in the catalog this tick
    pub processed: usize,
    /// Files left alone: still being written, already seen, or already imported
    pub skipped: usize,
    pub jobs_enqueued: usize,
    pub errors: usize,
    /// The folder could not be listed
    pub unavailable: bool,
}

impl ScanReport {
    fn new(kind: CatalogKind, directory: &Path) -> Self {
        Self {
            kind,
            directory: directory.to_path_buf(),
            processed: 0,
            skipped: 0,
            jobs_enqueued: 0,
            errors: 0,
            unavailable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileDecision {
    TooYoung,
    AlreadySeen,
    Backfilled,
    Inactive,
    Enqueued,
}

/// Rate limit for missing-directory warnings, per folder
#[derive(Debug, Default)]
pub struct DirectoryWarningThrottle {
    last_warned: HashMap<PathBuf, SystemTime>,
}

impl DirectoryWarningThrottle {
    /// Whether a warning for `directory` may be logged at `now`
    pub fn should_warn(&mut self, directory: &Path, now: SystemTime) -> bool {
        let due = match self.last_warned.get(directory) {
            Some(last) => now
                .duration_since(*last)
                .map(|elapsed| elapsed >= DIRECTORY_WARNING_INTERVAL)
                .unwrap_or(false),
            None => true,
        };
        if due {
            self.last_warned.insert(directory.to_path_buf(), now);
        }
        due
    }

    /// Forget a folder once it lists again, so the next outage warns at once
    pub fn clear(&mut self, directory: &Path) {
        self.last_warned.remove(directory);
    }
}

pub struct IngestionWatcher {
    folders: Vec<(CatalogKind, PathBuf)>,
    min_age: Duration,
    startup_grace: Duration,
    catalog: CatalogSeaOrmRepository,
    ledger: IngestionLedger,
    job_queue: Arc<JobQueue>,
    broadcaster: UpdateBroadcaster,
    settings: RuntimeSettingsStore,
    throttle: DirectoryWarningThrottle,
}

impl IngestionWatcher {
    pub fn new(
        config: &IngestionConfig,
        catalog: CatalogSeaOrmRepository,
        ledger: IngestionLedger,
        job_queue: Arc<JobQueue>,
        broadcaster: UpdateBroadcaster,
        settings: RuntimeSettingsStore,
    ) -> Self {
        Self {
            folders: vec![
                (CatalogKind::Playlist, config.playlist_dir.clone()),
                (CatalogKind::Guide, config.guide_dir.clone()),
            ],
            min_age: config.min_age,
            startup_grace: config.startup_grace,
            catalog,
            ledger,
            job_queue,
            broadcaster,
            settings,
            throttle: DirectoryWarningThrottle::default(),
        }
    }

    /// Scan both folders once
    pub async fn tick(&mut self) -> Vec<ScanReport> {
        self.tick_at(SystemTime::now()).await
    }

    /// Scan both folders as if the current time were `now`
    pub async fn tick_at(&mut self, now: SystemTime) -> Vec<ScanReport> {
        let folders = self.folders.clone();
        let mut reports = Vec::with_capacity(folders.len());
        for (kind, directory) in folders {
            reports.push(self.scan_folder(kind, &directory, now).await);
        }
        reports
    }

    async fn scan_folder(&mut self, kind: CatalogKind, directory: &Path, now: SystemTime) -> ScanReport {
        let mut report = ScanReport::new(kind, directory);

        let files = match list_candidates(kind, directory).await {
            Ok(files) => {
                self.throttle.clear(directory);
                files
            }
            Err(e) => {
                if self.throttle.should_warn(directory, now) {
                    warn!("{}", e);
                } else {
                    debug!("{}", e);
                }
                report.unavailable = true;
                return report;
            }
        };

        for (path, modified) in files {
            match self.process_file(kind, &path, modified, now).await {
                Ok(FileDecision::TooYoung | FileDecision::AlreadySeen | FileDecision::Backfilled) => {
                    report.skipped += 1;
                }
                Ok(FileDecision::Inactive) => report.processed += 1,
                Ok(FileDecision::Enqueued) => {
                    report.processed += 1;
                    report.jobs_enqueued += 1;
                }
                Err(e) => {
                    warn!("{}", e);
                    report.errors += 1;
                }
            }
        }

        if report.processed > 0 || report.errors > 0 {
            info!(
                "Scanned {} folder {}: {} processed, {} skipped, {} error(s)",
                kind,
                directory.display(),
                report.processed,
                report.skipped,
                report.errors
            );
        }
        report
    }

    async fn process_file(
        &self,
        kind: CatalogKind,
        path: &Path,
        modified: SystemTime,
        now: SystemTime,
    ) -> Result<FileDecision, IngestionError> {
        let per_file = |message: String| IngestionError::PerFile {
            path: path.to_path_buf(),
            message,
        };

        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age < self.min_age {
            debug!("{} is {:?} old, waiting for writes to settle", path.display(), age);
            return Ok(FileDecision::TooYoung);
        }

        let path_key = path.to_string_lossy().to_string();
        let mtime = unix_millis(modified);

        let last_seen = self
            .ledger
            .last_seen(kind, &path_key)
            .await
            .map_err(|e| per_file(e.to_string()))?;
        if last_seen.is_some_and(|seen| seen >= mtime) {
            return Ok(FileDecision::AlreadySeen);
        }

        if last_seen.is_none() && age > self.startup_grace {
            let existing = self
                .catalog
                .find_by_path(kind, &path_key)
                .await
                .map_err(|e| per_file(e.to_string()))?;
            if existing.is_some() {
                debug!("{} already imported, backfilling ledger", path.display());
                self.ledger
                    .record(kind, &path_key, mtime)
                    .await
                    .map_err(|e| per_file(e.to_string()))?;
                return Ok(FileDecision::Backfilled);
            }
        }

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| path_key.clone());
        let auto_import = self.settings.auto_import().await;

        let (entry, created) = self
            .catalog
            .get_or_create(kind, &path_key, &name, auto_import)
            .await
            .map_err(|e| per_file(e.to_string()))?;
        if created {
            info!(
                "Registered {} '{}' from {} (active: {})",
                kind,
                entry.name,
                path.display(),
                entry.is_active
            );
        }
        self.catalog
            .record_mtime(kind, &entry.id, mtime)
            .await
            .map_err(|e| per_file(e.to_string()))?;
        self.ledger
            .record(kind, &path_key, mtime)
            .await
            .map_err(|e| per_file(e.to_string()))?;

        if !entry.is_active {
            debug!("{} is inactive, no refresh queued", path.display());
            return Ok(FileDecision::Inactive);
        }

        let job_type = match kind {
            CatalogKind::Playlist => JobType::AccountRefresh(entry.id),
            CatalogKind::Guide => JobType::GuideRefresh(entry.id),
        };
        self.job_queue
            .enqueue(ScheduledJob::new(job_type, JobPriority::Normal))
            .await
            .map_err(|e| per_file(e.to_string()))?;

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        self.broadcaster.publish(match kind {
            CatalogKind::Playlist => UpdateEvent::M3uFile {
                filename,
                success: true,
            },
            CatalogKind::Guide => UpdateEvent::EpgFile {
                filename,
                success: true,
            },
        });

        Ok(FileDecision::Enqueued)
    }
}

/// Regular files in `directory` with an extension `kind` accepts, and their mtimes
async fn list_candidates(
    kind: CatalogKind,
    directory: &Path,
) -> Result<Vec<(PathBuf, SystemTime)>, IngestionError> {
    let unavailable = |e: std::io::Error| IngestionError::DirectoryUnavailable {
        path: directory.to_path_buf(),
        message: e.to_string(),
    };

    let mut entries = tokio::fs::read_dir(directory).await.map_err(unavailable)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
        let file_name = entry.file_name();
        if !kind.accepts(&file_name.to_string_lossy()) {
            continue;
        }
        match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => match metadata.modified() {
                Ok(modified) => files.push((entry.path(), modified)),
                Err(e) => warn!("No modification time for {}: {}", entry.path().display(), e),
            },
            Ok(_) => {}
            Err(e) => warn!("Cannot stat {}: {}", entry.path().display(), e),
        }
    }
    files.sort();
    Ok(files)
}

fn unix_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

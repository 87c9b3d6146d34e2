use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::watcher::IngestionWatcher;

/// Runs watcher ticks on a fixed interval until cancelled. A tick always
/// finishes before the next one starts; ticks that fall behind are delayed,
/// not bunched.
pub struct WatcherService {
    watcher: IngestionWatcher,
    scan_interval: Duration,
}

impl WatcherService {
    pub fn new(watcher: IngestionWatcher, scan_interval: Duration) -> Self {
        Self {
            watcher,
            scan_interval,
        }
    }

    pub async fn run(mut self, cancellation_token: CancellationToken) {
        info!(
            "Starting hot-folder watcher (interval {})",
            humantime::format_duration(self.scan_interval)
        );

        let mut ticker = interval(self.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("Hot-folder watcher stopping");
                    break;
                }
                _ = ticker.tick() => {
                    trace!("Watcher tick");
                    let reports = self.watcher.tick().await;
                    let enqueued: usize = reports.iter().map(|r| r.jobs_enqueued).sum();
                    if enqueued > 0 {
                        debug!("Watcher tick queued {} refresh job(s)", enqueued);
                    }
                }
            }
        }
    }
}

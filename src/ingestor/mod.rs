//! Hot-folder ingestion
//!
//! Dropped playlist and guide files become catalog entries and refresh jobs.
//! Parsing the files is the refresh handler's business, not this module's.

pub mod ledger;
pub mod scheduler;
pub mod watcher;

pub use ledger::IngestionLedger;
pub use scheduler::WatcherService;
pub use watcher::{DirectoryWarningThrottle, IngestionWatcher, ScanReport};

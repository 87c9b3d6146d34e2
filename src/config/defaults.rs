/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./channel-dispatcher.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// Resolver defaults
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
pub const DEFAULT_PROBE_ON_RESOLVE: bool = false;

// Probe defaults
pub const DEFAULT_PROBE_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PROBE_READ_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PROBE_MAX_REDIRECTS: usize = 10;
pub const DEFAULT_PROBE_MAX_CONCURRENT: usize = 8;

// Ingestion defaults
pub const DEFAULT_PLAYLIST_WATCH_DIR: &str = "./data/m3us";
pub const DEFAULT_GUIDE_WATCH_DIR: &str = "./data/epgs";
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MIN_AGE_SECS: u64 = 6;
pub const DEFAULT_STARTUP_GRACE_SECS: u64 = 30;
pub const DEFAULT_LEDGER_TTL_SECS: u64 = 60 * 60 * 24 * 3;
pub const DEFAULT_AUTO_IMPORT: bool = true;

// Dedup defaults
pub const DEFAULT_IDENTITY_FIELDS: &str = "name,url,tvg_id";
pub const DEFAULT_REHASH_BATCH_SIZE: u64 = 1000;

// Job scheduling defaults
pub const DEFAULT_GLOBAL_MAX_JOBS: usize = 4;
pub const DEFAULT_ACCOUNT_REFRESH_LIMIT: usize = 2;
pub const DEFAULT_GUIDE_REFRESH_LIMIT: usize = 1;
pub const DEFAULT_MAINTENANCE_LIMIT: usize = 1;

use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::{duration, truthy};

use crate::models::IdentityField;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub job_scheduling: JobSchedulingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

/// Settings consumed by the feed resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// User agent used when an account does not carry its own
    #[serde(default = "default_user_agent")]
    pub default_user_agent: String,
    /// Probe the resolved URL before returning it. Off the hot path by default.
    #[serde(default = "default_probe_on_resolve")]
    pub probe_on_resolve: bool,
}

/// Reachability probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(with = "duration", default = "default_probe_connect_timeout")]
    pub connect_timeout: Duration,
    #[serde(with = "duration", default = "default_probe_read_timeout")]
    pub read_timeout: Duration,
    #[serde(default = "default_probe_max_redirects")]
    pub max_redirects: usize,
    /// Size of the probe worker pool
    #[serde(default = "default_probe_max_concurrent")]
    pub max_concurrent: usize,
}

/// Hot-folder ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_playlist_dir")]
    pub playlist_dir: PathBuf,
    #[serde(default = "default_guide_dir")]
    pub guide_dir: PathBuf,
    #[serde(with = "duration", default = "default_scan_interval")]
    pub scan_interval: Duration,
    /// Files younger than this may still be written and are left for a later tick
    #[serde(with = "duration", default = "default_min_age")]
    pub min_age: Duration,
    /// Files older than this with no ledger entry are checked against the catalog first
    #[serde(with = "duration", default = "default_startup_grace")]
    pub startup_grace: Duration,
    #[serde(with = "duration", default = "default_ledger_ttl")]
    pub ledger_ttl: Duration,
    /// Whether newly discovered files become active catalog entries
    #[serde(with = "truthy", default = "default_auto_import")]
    pub auto_import: bool,
}

/// Feed identity and rehash settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Comma separated identity fields, e.g. `name,url,tvg_id`
    #[serde(default = "default_identity_fields")]
    pub identity_fields: String,
    #[serde(default = "default_rehash_batch_size")]
    pub batch_size: u64,
}

impl DedupConfig {
    /// Parsed identity field set. Unknown names are ignored with a warning.
    pub fn identity_fields(&self) -> Vec<IdentityField> {
        IdentityField::parse_list(&self.identity_fields)
    }
}

/// Background job concurrency limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSchedulingConfig {
    #[serde(default = "default_global_max_jobs")]
    pub global_max_jobs: usize,
    #[serde(default = "default_account_refresh_limit")]
    pub account_refresh_limit: usize,
    #[serde(default = "default_guide_refresh_limit")]
    pub guide_refresh_limit: usize,
    #[serde(default = "default_maintenance_limit")]
    pub maintenance_limit: usize,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_probe_on_resolve() -> bool {
    DEFAULT_PROBE_ON_RESOLVE
}

fn default_probe_connect_timeout() -> Duration {
    Duration::from_secs(DEFAULT_PROBE_CONNECT_TIMEOUT_SECS)
}

fn default_probe_read_timeout() -> Duration {
    Duration::from_secs(DEFAULT_PROBE_READ_TIMEOUT_SECS)
}

fn default_probe_max_redirects() -> usize {
    DEFAULT_PROBE_MAX_REDIRECTS
}

fn default_probe_max_concurrent() -> usize {
    DEFAULT_PROBE_MAX_CONCURRENT
}

fn default_playlist_dir() -> PathBuf {
    PathBuf::from(DEFAULT_PLAYLIST_WATCH_DIR)
}

fn default_guide_dir() -> PathBuf {
    PathBuf::from(DEFAULT_GUIDE_WATCH_DIR)
}

fn default_scan_interval() -> Duration {
    Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS)
}

fn default_min_age() -> Duration {
    Duration::from_secs(DEFAULT_MIN_AGE_SECS)
}

fn default_startup_grace() -> Duration {
    Duration::from_secs(DEFAULT_STARTUP_GRACE_SECS)
}

fn default_ledger_ttl() -> Duration {
    Duration::from_secs(DEFAULT_LEDGER_TTL_SECS)
}

fn default_auto_import() -> bool {
    DEFAULT_AUTO_IMPORT
}

fn default_identity_fields() -> String {
    DEFAULT_IDENTITY_FIELDS.to_string()
}

fn default_rehash_batch_size() -> u64 {
    DEFAULT_REHASH_BATCH_SIZE
}

fn default_global_max_jobs() -> usize {
    DEFAULT_GLOBAL_MAX_JOBS
}

fn default_account_refresh_limit() -> usize {
    DEFAULT_ACCOUNT_REFRESH_LIMIT
}

fn default_guide_refresh_limit() -> usize {
    DEFAULT_GUIDE_REFRESH_LIMIT
}

fn default_maintenance_limit() -> usize {
    DEFAULT_MAINTENANCE_LIMIT
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: Some(DEFAULT_MAX_CONNECTIONS),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_user_agent: default_user_agent(),
            probe_on_resolve: default_probe_on_resolve(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_probe_connect_timeout(),
            read_timeout: default_probe_read_timeout(),
            max_redirects: default_probe_max_redirects(),
            max_concurrent: default_probe_max_concurrent(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            playlist_dir: default_playlist_dir(),
            guide_dir: default_guide_dir(),
            scan_interval: default_scan_interval(),
            min_age: default_min_age(),
            startup_grace: default_startup_grace(),
            ledger_ttl: default_ledger_ttl(),
            auto_import: default_auto_import(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            identity_fields: default_identity_fields(),
            batch_size: default_rehash_batch_size(),
        }
    }
}

impl Default for JobSchedulingConfig {
    fn default() -> Self {
        Self {
            global_max_jobs: default_global_max_jobs(),
            account_refresh_limit: default_account_refresh_limit(),
            guide_refresh_limit: default_guide_refresh_limit(),
            maintenance_limit: default_maintenance_limit(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            resolver: ResolverConfig::default(),
            probe: ProbeConfig::default(),
            ingestion: IngestionConfig::default(),
            dedup: DedupConfig::default(),
            job_scheduling: JobSchedulingConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Layer defaults, the TOML file (if present) and `DISPATCH_` environment
    /// overrides, e.g. `DISPATCH_INGESTION__MIN_AGE=10s`.
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if std::path::Path::new(config_file).exists() {
            info!("Loading configuration from {}", config_file);
            figment = figment.merge(Toml::file(config_file));
        } else {
            warn!(
                "Config file {} not found, using defaults and environment",
                config_file
            );
        }

        let config: Config = figment
            .merge(Env::prefixed("DISPATCH_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Write the default configuration as TOML, for `--init`
    pub fn write_default(config_file: &str) -> Result<()> {
        let contents = toml::to_string_pretty(&Self::default())?;
        std::fs::write(config_file, contents)?;
        info!("Created default config file: {}", config_file);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let rendered = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.ingestion.min_age, Duration::from_secs(6));
        assert_eq!(parsed.ingestion.ledger_ttl, Duration::from_secs(259_200));
        assert_eq!(parsed.dedup.batch_size, 1000);
    }

    #[test]
    fn test_load_from_file_merges_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[database]\nurl = \"sqlite::memory:\"\n\n[ingestion]\nmin_age = \"10s\"\nauto_import = \"False\"\n\n[dedup]\nidentity_fields = \"url\""
        )
        .unwrap();

        let config = Config::load_from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.ingestion.min_age, Duration::from_secs(10));
        assert!(!config.ingestion.auto_import);
        assert_eq!(config.ingestion.startup_grace, Duration::from_secs(30));
        assert_eq!(config.dedup.identity_fields(), vec![IdentityField::Url]);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load_from_file("/nonexistent/channel-dispatcher.toml").unwrap();
        assert_eq!(config.resolver.default_user_agent, DEFAULT_USER_AGENT);
        assert!(!config.resolver.probe_on_resolve);
    }
}

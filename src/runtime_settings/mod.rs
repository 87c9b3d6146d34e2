//! Runtime Settings Management
//!
//! Settings that can change without a restart. Reads are cheap snapshots;
//! updates apply immediately to every holder of the store.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::reload::Handle;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::Config;
use crate::config::defaults::DEFAULT_USER_AGENT;
use crate::config::duration_serde::is_truthy;
use crate::job_scheduling::{JobPriority, JobQueue, JobType, ScheduledJob};
use crate::models::IdentityField;

/// Runtime settings that can be changed without service restart
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    /// Current log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub log_level: String,
    /// Whether newly discovered hot-folder files start active
    pub auto_import: bool,
    /// Feed attributes that make up the identity hash
    pub identity_fields: Vec<IdentityField>,
    /// User agent for accounts without their own
    pub default_user_agent: String,
}

impl RuntimeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            log_level: "INFO".to_string(),
            auto_import: config.ingestion.auto_import,
            identity_fields: config.dedup.identity_fields(),
            default_user_agent: usable_user_agent(&config.resolver.default_user_agent),
        }
    }
}

/// Trimmed agent, or the built-in default when nothing usable is configured
fn usable_user_agent(configured: &str) -> String {
    let trimmed = configured.trim();
    if trimmed.is_empty() {
        warn!("Configured default user agent is empty, using built-in default");
        DEFAULT_USER_AGENT.to_string()
    } else {
        trimmed.to_string()
    }
}

type ReloadHandle = Handle<EnvFilter, Registry>;

/// Runtime settings store with atomic updates
#[derive(Clone)]
pub struct RuntimeSettingsStore {
    settings: Arc<RwLock<RuntimeSettings>>,
    tracing_reload_handle: Option<Arc<ReloadHandle>>,
    /// Receives a rehash job when the identity field set changes
    job_queue: Option<Arc<JobQueue>>,
}

impl RuntimeSettingsStore {
    pub fn new(settings: RuntimeSettings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            tracing_reload_handle: None,
            job_queue: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(RuntimeSettings::from_config(config))
    }

    pub fn with_tracing_reload(mut self, handle: ReloadHandle) -> Self {
        self.tracing_reload_handle = Some(Arc::new(handle));
        self
    }

    pub fn with_job_queue(mut self, job_queue: Arc<JobQueue>) -> Self {
        self.job_queue = Some(job_queue);
        self
    }

    /// Get current settings (read-only copy)
    pub async fn get(&self) -> RuntimeSettings {
        self.settings.read().await.clone()
    }

    pub async fn auto_import(&self) -> bool {
        self.settings.read().await.auto_import
    }

    pub async fn identity_fields(&self) -> Vec<IdentityField> {
        self.settings.read().await.identity_fields.clone()
    }

    pub async fn default_user_agent(&self) -> String {
        self.settings.read().await.default_user_agent.clone()
    }

    /// Update log level and apply change to tracing subscriber
    pub async fn update_log_level(&self, new_level: &str) -> bool {
        let new_level_upper = new_level.to_uppercase();
        if !["TRACE", "DEBUG", "INFO", "WARN", "ERROR"].contains(&new_level_upper.as_str()) {
            error!("Invalid log level: {}", new_level);
            return false;
        }

        if let Some(handle) = &self.tracing_reload_handle {
            let directive = format!("channel_dispatcher={}", new_level_upper.to_lowercase());
            let applied = EnvFilter::try_new(&directive)
                .map_err(|e| e.to_string())
                .and_then(|filter| handle.reload(filter).map_err(|e| e.to_string()));
            if let Err(e) = applied {
                error!("Failed to reload tracing filter: {}", e);
                return false;
            }
        }

        self.settings.write().await.log_level = new_level_upper.clone();
        info!("Log level set to {}", new_level_upper);
        true
    }

    /// Accepts the truthy forms `true`, `1`, `yes` and `on` (any case);
    /// everything else disables auto-import.
    pub async fn update_auto_import(&self, raw: &str) -> bool {
        let enabled = is_truthy(raw);
        self.settings.write().await.auto_import = enabled;
        info!("Auto-import {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    pub async fn update_default_user_agent(&self, user_agent: &str) -> bool {
        let trimmed = user_agent.trim();
        if trimmed.is_empty() {
            warn!("Ignoring empty default user agent");
            return false;
        }
        self.settings.write().await.default_user_agent = trimmed.to_string();
        info!("Default user agent updated");
        true
    }

    /// Replace the identity field set from a comma separated list. A change
    /// schedules a rehash; returns whether the set changed.
    pub async fn update_identity_fields(&self, raw: &str) -> bool {
        let fields = IdentityField::parse_list(raw);
        if fields.is_empty() {
            warn!("Ignoring identity field list '{}' with no known fields", raw);
            return false;
        }

        {
            let mut settings = self.settings.write().await;
            if settings.identity_fields == fields {
                return false;
            }
            settings.identity_fields = fields.clone();
        }
        info!("Identity fields set to {}", IdentityField::join(&fields));

        if let Some(queue) = &self.job_queue {
            let job = ScheduledJob::new(JobType::Rehash, JobPriority::High);
            if let Err(e) = queue.enqueue(job).await {
                error!("Failed to schedule rehash after identity change: {}", e);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RuntimeSettingsStore {
        RuntimeSettingsStore::from_config(&Config::default())
    }

    #[tokio::test]
    async fn test_defaults_come_from_config() {
        let settings = store().get().await;
        assert!(settings.auto_import);
        assert_eq!(
            settings.identity_fields,
            vec![IdentityField::Name, IdentityField::Url, IdentityField::GuideId]
        );
    }

    #[tokio::test]
    async fn test_blank_configured_agent_falls_back_to_builtin() {
        let mut config = Config::default();
        config.resolver.default_user_agent = "   ".to_string();
        let store = RuntimeSettingsStore::from_config(&config);
        assert_eq!(store.default_user_agent().await, DEFAULT_USER_AGENT);

        assert!(!store.update_default_user_agent("").await);
        assert_eq!(store.default_user_agent().await, DEFAULT_USER_AGENT);
    }

    #[tokio::test]
    async fn test_auto_import_accepts_truthy_strings() {
        let store = store();
        assert!(!store.update_auto_import("False").await);
        assert!(!store.auto_import().await);
        assert!(store.update_auto_import("True").await);
        assert!(store.update_auto_import("1").await);
        assert!(!store.update_auto_import("nope").await);
    }

    #[tokio::test]
    async fn test_identity_change_schedules_rehash() {
        let queue = Arc::new(JobQueue::new());
        let store = store().with_job_queue(queue.clone());

        assert!(!store.update_identity_fields("tvg_id,url,name").await);
        assert!(!queue.contains_job_key("rehash").await);

        assert!(store.update_identity_fields("url").await);
        assert!(queue.contains_job_key("rehash").await);
        assert_eq!(store.identity_fields().await, vec![IdentityField::Url]);

        assert!(!store.update_identity_fields("bogus").await);
    }

    #[tokio::test]
    async fn test_log_level_validation() {
        let store = store();
        assert!(store.update_log_level("debug").await);
        assert_eq!(store.get().await.log_level, "DEBUG");
        assert!(!store.update_log_level("chatty").await);
    }
}

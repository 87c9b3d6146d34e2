//! Tracing subscriber setup
//!
//! The filter sits in a reload layer so [`crate::runtime_settings::RuntimeSettingsStore`]
//! can change the log level while the process runs.

use anyhow::Result;
use tracing_subscriber::reload::{self, Handle};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directive for this crate at `level`
pub fn default_directive(level: &str) -> String {
    format!("channel_dispatcher={}", level.to_lowercase())
}

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str, json: bool) -> Result<Handle<EnvFilter, Registry>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(level)))?;
    let (filter_layer, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .try_init()?;

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive("DEBUG"), "channel_dispatcher=debug");
    }
}

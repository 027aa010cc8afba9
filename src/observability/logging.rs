//! Structured logging.
//!
//! # Responsibilities
//! - Install the global tracing subscriber once at startup
//! - Honour `RUST_LOG` first, falling back to the configured level
//!
//! The fallback sink's tracing writer logs under the `fallback_metrics`
//! target, so it can be filtered independently of the rest of the crate.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Build the filter used when `RUST_LOG` is unset.
pub fn default_filter(config: &ObservabilityConfig) -> String {
    format!(
        "sentinel_monitor={level},tower_http={level},fallback_metrics=info",
        level = config.log_level
    )
}

/// Install the subscriber. Returns false if one was already installed.
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_uses_configured_level() {
        let config = ObservabilityConfig {
            log_level: "debug".to_string(),
        };
        let filter = default_filter(&config);
        assert!(filter.starts_with("sentinel_monitor=debug"));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the monitor.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    /// Status server settings (`/health`).
    pub server: ServerConfig,

    /// Retry policy for transient operations.
    pub retry: RetryConfig,

    /// Prometheus exposition listener.
    pub exporter: ExporterConfig,

    /// Local fallback buffer and durable log.
    pub fallback: FallbackConfig,

    /// Background probe of the primary metrics backend.
    pub probe: ProbeConfig,

    /// Dependency health checks.
    pub health: HealthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Status server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// First backoff interval in milliseconds.
    pub initial_interval_ms: u64,

    /// Backoff ceiling in milliseconds.
    pub max_interval_ms: u64,

    /// Growth factor between consecutive intervals (> 1).
    pub multiplier: f64,

    /// Symmetric jitter as a fraction of the interval, in [0, 1].
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval_ms: 100,
            max_interval_ms: 1000,
            multiplier: 2.0,
            jitter_factor: 0.5,
        }
    }
}

/// Prometheus exposition configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Start the scrape listener.
    pub enabled: bool,

    /// Listener bind address.
    pub bind_address: String,

    /// Scrape path for registered metrics.
    pub path: String,

    /// Scrape path for process/runtime collectors.
    pub process_path: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:9090".to_string(),
            path: "/metrics".to_string(),
            process_path: "/metrics/process".to_string(),
        }
    }
}

/// Fallback sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Buffer points locally while the primary backend is degraded.
    pub enabled: bool,

    /// Append-only JSON-lines file; empty routes records to the log stream.
    pub log_path: String,

    /// Maximum buffered points before a forced flush.
    pub buffer_capacity: usize,

    /// Periodic flush interval in seconds (0 disables the ticker).
    pub flush_interval_secs: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: "logs/metrics.log".to_string(),
            buffer_capacity: 1000,
            flush_interval_secs: 30,
        }
    }
}

/// Primary backend probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Probe interval in seconds (0 disables automatic recovery).
    pub interval_secs: u64,

    /// Probe timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            timeout_secs: 5,
        }
    }
}

/// Dependency health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Per-check timeout in seconds.
    pub timeout_secs: u64,

    /// HTTP reachability checks.
    pub checks: Vec<HttpCheckConfig>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            checks: Vec::new(),
        }
    }
}

/// A single HTTP check target.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpCheckConfig {
    /// Name reported in the aggregate result.
    pub name: String,

    /// URL probed with GET; healthy iff the status is 2xx.
    pub url: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.exporter.path, "/metrics");
        assert_eq!(config.fallback.buffer_capacity, 1000);
        assert_eq!(config.probe.timeout_secs, 5);
        assert!(config.health.checks.is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: MonitorConfig = toml::from_str(
            r#"
            [retry]
            max_attempts = 5

            [[health.checks]]
            name = "payments"
            url = "http://payments:8080/health"
            "#,
        )
        .unwrap();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_interval_ms, 100);
        assert_eq!(config.health.checks.len(), 1);
        assert_eq!(config.health.timeout_secs, 5);
        assert!(config.fallback.enabled);
    }
}

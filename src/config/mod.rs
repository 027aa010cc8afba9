//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MonitorConfig (validated, immutable)
//!     → handed to each subsystem constructor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no process-wide config singleton
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, load_with_source, ConfigError, ConfigSource};
pub use schema::{
    ExporterConfig, FallbackConfig, HealthConfig, HttpCheckConfig, MonitorConfig,
    ObservabilityConfig, ProbeConfig, RetryConfig, ServerConfig,
};

//! Monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! Caller (middleware, business logic)
//!     → facade.rs
//!         Healthy  → prometheus.rs (primary) ──fail──┐
//!         Degraded ──────────────────────────────────┴→ fallback::FallbackSink
//!
//! Background:
//!     facade probe → prometheus.rs is_healthy → Healthy/Degraded
//!
//! Scrape:
//!     exporter.rs → {path} (registered series), {process_path} (process.rs)
//! ```

pub mod exporter;
pub mod facade;
pub mod metric;
pub mod process;
pub mod prometheus;

pub use facade::{HealthState, MonitoringFacade, ProbeOptions};
pub use metric::{labels, Labels, MetricKind, MetricPoint, Monitor, MonitorError};
pub use self::prometheus::PrometheusMonitor;

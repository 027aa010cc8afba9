//! Sentinel Monitor
//!
//! A resilience layer that keeps application metrics flowing when the
//! primary metrics backend misbehaves.
//!
//! # Architecture Overview
//!
//! ```text
//!     Application / HTTP middleware
//!                │
//!                ▼
//!     ┌──────────────────────┐   probe (interval)   ┌─────────────────────┐
//!     │   MonitoringFacade   │ ───────────────────▶ │  PrometheusMonitor  │──▶ /metrics
//!     │  Healthy | Degraded  │ ──── Healthy ──────▶ │  (primary backend)  │──▶ /metrics/process
//!     └──────────┬───────────┘                      └─────────────────────┘
//!                │ Degraded / primary error
//!                ▼
//!     ┌──────────────────────┐  full / tick / stop  ┌─────────────────────┐
//!     │     FallbackSink     │ ───────────────────▶ │  JSON-lines writer  │
//!     │   (bounded buffer)   │                      └─────────────────────┘
//!     └──────────────────────┘
//!
//!     HealthAggregator ── HttpCheck / FnCheck ──▶ GET /health (HealthReport)
//!     RetryExecutor    ── backoff + jitter + cancellation for startup I/O
//! ```

// Core subsystems
pub mod fallback;
pub mod health;
pub mod monitoring;
pub mod resilience;

// Surfaces
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::MonitorConfig;
pub use fallback::FallbackSink;
pub use health::HealthAggregator;
pub use lifecycle::Shutdown;
pub use monitoring::{MonitoringFacade, PrometheusMonitor};
pub use resilience::{RetryExecutor, RetryPolicy};

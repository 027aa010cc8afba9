//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! /health request:
//!     → report.rs
//!         → MonitoringFacade::is_healthy (monitoring degraded?)
//!         → aggregator.rs run_checks
//!             → check.rs (HttpCheck / FnCheck), each under timeout + token
//! ```
//!
//! # Design Decisions
//! - A failing check only flips its own status; it never escalates
//! - Checks are independent; registration order is execution order
//! - Monitoring degradation is reported separately from service health

pub mod aggregator;
pub mod check;
pub mod report;

pub use aggregator::{AggregateResult, CheckResult, HealthAggregator};
pub use check::{CheckError, CheckStatus, FnCheck, HealthCheck, HttpCheck};
pub use report::HealthReport;

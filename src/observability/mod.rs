//! Observability subsystem.
//!
//! Metrics emitted by this process flow through `monitoring`; this module
//! only owns the log pipeline.

pub mod logging;

pub use logging::init_logging;

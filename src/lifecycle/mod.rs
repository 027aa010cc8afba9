//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Background loops (task.rs):
//!     spawn with token → tick → ... → stop() cancels + joins exactly once
//!
//! Shutdown (shutdown.rs):
//!     Signal received → trigger → every child token fires
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Every periodic loop is a `BackgroundTask`; no detached timers
//! - Ordered shutdown: stop serving, stop probes, final flush

pub mod shutdown;
pub mod signals;
pub mod task;

pub use shutdown::Shutdown;
pub use task::BackgroundTask;

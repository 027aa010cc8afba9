//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Operation that may fail transiently:
//!     → retries.rs (run attempt, on failure wait)
//!     → backoff.rs (next jittered exponential interval)
//!     → timeouts.rs (bound a single wait or probe by deadline + cancellation)
//! ```
//!
//! # Design Decisions
//! - Retry policies are validated once and shared read-only
//! - Every wait races a cancellation token; no timer outlives its caller
//! - Timeouts and cancellations are distinct outcomes

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::{PolicyError, RetryPolicy};
pub use retries::{RetryError, RetryExecutor};
pub use timeouts::{run_with_deadline, Interrupted};

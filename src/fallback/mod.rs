//! Fallback subsystem.
//!
//! # Data Flow
//! ```text
//! Façade degraded:
//!     → sink.rs (append under lock; flush first when full)
//!     → writer.rs (one JSON record per generation, append-only)
//!
//! Background:
//!     flusher.rs (ticker) → sink.flush()
//!     shutdown → sink.stop() → cancel ticker → final flush
//! ```

pub mod flusher;
pub mod sink;
pub mod writer;

pub use sink::{FallbackError, FallbackSink, FallbackStrategy};
pub use writer::{FlushRecord, JsonLinesWriter, RecordWriter, TracingWriter};

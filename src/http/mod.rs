//! HTTP status surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, trace + timeout layers)
//!     → middleware.rs (request metrics → MonitoringFacade, spawned)
//!     → /health handler → health::HealthReport
//! ```

pub mod middleware;
pub mod server;

pub use middleware::RequestMetrics;
pub use server::{router, AppState, HttpServer};

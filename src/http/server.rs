//! Status HTTP server.
//!
//! # Responsibilities
//! - Serve `GET /health` with the combined monitoring and dependency report
//! - Wrap every route in request metrics, tracing and a request timeout
//! - Bind, serve until stopped, shut down gracefully

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::health::{HealthAggregator, HealthReport};
use crate::http::middleware::{track_requests, RequestMetrics};
use crate::lifecycle::BackgroundTask;
use crate::monitoring::MonitoringFacade;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<MonitoringFacade>,
    pub aggregator: Arc<HealthAggregator>,
    /// Cancels in-flight checks once the process is shutting down.
    pub shutdown: CancellationToken,
}

/// Build the status router with all middleware layers.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let metrics = RequestMetrics::new(state.facade.clone());

    Router::new()
        .route("/health", get(health_handler))
        .route_layer(middleware::from_fn_with_state(metrics, track_requests))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                )),
        )
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    let report = HealthReport::collect(&state.facade, &state.aggregator, &state.shutdown).await;
    if !report.details.checks.is_up() {
        tracing::debug!(checks = ?report.details.checks.details, "Dependency checks reporting down");
    }
    Json(report)
}

/// A running status listener.
#[derive(Debug)]
pub struct HttpServer {
    addr: SocketAddr,
    task: BackgroundTask,
}

impl HttpServer {
    /// Bind `addr` and serve `router` until stopped.
    pub async fn bind(addr: SocketAddr, router: Router) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let task = BackgroundTask::spawn("status-server", move |token| async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
            {
                tracing::error!(error = %e, "Status server error");
            }
        });

        tracing::info!(address = %local_addr, "Status server listening");
        Ok(Self {
            addr: local_addr,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and drain in-flight requests.
    pub async fn stop(&self) {
        if self.task.stop().await {
            tracing::info!(address = %self.addr, "Status server stopped");
        }
    }
}

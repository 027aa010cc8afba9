//! Prometheus exposition listener.
//!
//! # Routes
//! - `{path}` (default `/metrics`): every registered counter, gauge, histogram
//! - `{process_path}` (default `/metrics/process`): process/runtime collectors

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{http::header, response::IntoResponse, routing::get, Router};
use prometheus::{Registry, TextEncoder};
use tokio::net::TcpListener;

use crate::lifecycle::BackgroundTask;
use crate::monitoring::metric::MonitorError;
use crate::monitoring::process::ProcessCollector;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Build the scrape router.
pub fn router(
    registry: Registry,
    process: Arc<ProcessCollector>,
    path: &str,
    process_path: &str,
) -> Router {
    Router::new()
        .route(
            path,
            get(move || {
                let registry = registry.clone();
                async move { exposition(encode(&registry)) }
            }),
        )
        .route(
            process_path,
            get(move || {
                let process = process.clone();
                async move { exposition(process.render()) }
            }),
        )
}

/// Render every collector on `registry` in the text exposition format.
pub fn encode(registry: &Registry) -> String {
    let mut out = String::new();
    if let Err(e) = TextEncoder::new().encode_utf8(&registry.gather(), &mut out) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    out
}

fn exposition(body: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, TEXT_FORMAT)], body)
}

/// A running exposition listener.
#[derive(Debug)]
pub struct ExporterServer {
    addr: SocketAddr,
    task: BackgroundTask,
}

impl ExporterServer {
    /// Bind `addr` and serve `router` until stopped.
    pub async fn bind(addr: SocketAddr, router: Router) -> Result<Self, MonitorError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MonitorError::Server(format!("bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| MonitorError::Server(e.to_string()))?;

        let task = BackgroundTask::spawn("metrics-exporter", move |token| async move {
            let shutdown = async move { token.cancelled().await };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(error = %e, "Metrics server error");
            }
        });

        tracing::info!(address = %local_addr, "Metrics endpoint listening");
        Ok(Self {
            addr: local_addr,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting scrapes and wait for the listener to close.
    pub async fn stop(&self) {
        if self.task.stop().await {
            tracing::info!(address = %self.addr, "Metrics endpoint stopped");
        }
    }
}

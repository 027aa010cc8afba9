//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use sentinel_monitor::config::ExporterConfig;
use sentinel_monitor::fallback::{FallbackError, FlushRecord, RecordWriter};
use sentinel_monitor::monitoring::{Labels, Monitor, MonitorError};

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Backend that always answers with `status`.
pub async fn start_fixed_backend(status: u16) -> SocketAddr {
    start_programmable_backend(move || async move { (status, "ok".to_string()) }).await
}

/// Exporter config bound to an ephemeral loopback port.
pub fn exporter_config() -> ExporterConfig {
    ExporterConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ..ExporterConfig::default()
    }
}

/// A unique scratch path under the system temp directory.
pub fn scratch_path(name: &str) -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir()
        .join(format!("sentinel-monitor-{}-{}", std::process::id(), n))
        .join(name)
}

/// Poll `condition` every 10ms until it holds or `deadline` elapses.
pub async fn eventually<F>(deadline: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Primary backend that rejects every write and probe.
#[derive(Debug, Default)]
pub struct DeadMonitor;

#[async_trait]
impl Monitor for DeadMonitor {
    async fn counter(&self, _: &str, _: f64, _: &Labels) -> Result<(), MonitorError> {
        Err(MonitorError::Unreachable("connection refused".into()))
    }

    async fn gauge(&self, _: &str, _: f64, _: &Labels) -> Result<(), MonitorError> {
        Err(MonitorError::Unreachable("connection refused".into()))
    }

    async fn histogram(&self, _: &str, _: f64, _: &Labels) -> Result<(), MonitorError> {
        Err(MonitorError::Unreachable("connection refused".into()))
    }

    async fn is_healthy(&self) -> Result<bool, MonitorError> {
        Ok(false)
    }
}

/// Records flushed generations as metric names.
#[derive(Debug, Default)]
pub struct CollectingWriter {
    flushed: Mutex<Vec<Vec<String>>>,
}

impl CollectingWriter {
    pub fn generations(&self) -> Vec<Vec<String>> {
        self.flushed.lock().unwrap().clone()
    }

    pub fn total(&self) -> usize {
        self.flushed.lock().unwrap().iter().map(Vec::len).sum()
    }
}

impl RecordWriter for CollectingWriter {
    fn write_record(&self, record: &FlushRecord<'_>) -> Result<(), FallbackError> {
        let names = record.metrics.iter().map(|m| m.name.clone()).collect();
        self.flushed.lock().unwrap().push(names);
        Ok(())
    }
}

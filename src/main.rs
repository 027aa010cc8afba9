//! Sentinel Monitor binary.
//!
//! Startup order: config, logging, exporter, fallback sink, façade,
//! aggregator, status server. Shutdown runs the same chain in reverse and
//! ends with the final fallback flush.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use sentinel_monitor::config::{load_with_source, ConfigSource};
use sentinel_monitor::fallback::{FallbackSink, FallbackStrategy};
use sentinel_monitor::health::HealthAggregator;
use sentinel_monitor::http::{self, AppState, HttpServer};
use sentinel_monitor::lifecycle::{signals, Shutdown};
use sentinel_monitor::monitoring::{Monitor, MonitoringFacade, ProbeOptions, PrometheusMonitor};
use sentinel_monitor::observability::init_logging;
use sentinel_monitor::resilience::{RetryExecutor, RetryPolicy};

#[derive(Parser, Debug)]
#[command(name = "sentinel-monitor")]
#[command(about = "Metrics resilience layer with fallback buffering and health reporting")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (config, source) = load_with_source(&cli.config)?;

    init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "sentinel-monitor starting"
    );
    if source == ConfigSource::Defaults {
        tracing::info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    let shutdown = Shutdown::new();
    let retry = RetryExecutor::new(RetryPolicy::try_from(&config.retry)?);

    // Primary backend
    let prometheus = Arc::new(PrometheusMonitor::new(&config.exporter)?);
    if config.exporter.enabled {
        let addr: SocketAddr = config.exporter.bind_address.parse()?;
        let monitor = prometheus.clone();
        match retry
            .execute(&shutdown.token(), |_| {
                let monitor = monitor.clone();
                async move { monitor.start_server(addr).await }
            })
            .await
        {
            Ok(bound) => tracing::info!(address = %bound, "Metrics exporter started"),
            Err(e) => tracing::warn!(error = %e, "Metrics exporter unavailable, relying on fallback"),
        }
    }

    // Fallback
    let sink = Arc::new(FallbackSink::from_config(&config.fallback)?);
    if config.fallback.flush_interval_secs > 0 {
        sink.start_flusher(Duration::from_secs(config.fallback.flush_interval_secs));
    }

    let primary: Arc<dyn Monitor> = prometheus.clone();
    let fallback: Arc<dyn FallbackStrategy> = sink.clone();
    let facade = Arc::new(MonitoringFacade::new(
        primary,
        Some(fallback),
        ProbeOptions::from(&config.probe),
    ));

    let aggregator = Arc::new(HealthAggregator::from_config(&config.health)?);
    tracing::info!(checks = aggregator.len(), "Health aggregator ready");

    // Status surface
    let state = AppState {
        facade: facade.clone(),
        aggregator,
        shutdown: shutdown.token(),
    };
    let app = http::router(state, Duration::from_secs(config.server.request_timeout_secs));
    let server = HttpServer::bind(config.server.bind_address.parse()?, app).await?;

    signals::wait_for_signal().await;
    shutdown.trigger();
    tracing::info!("Shutdown signal received");

    server.stop().await;
    prometheus.stop_server().await;
    facade.stop().await;

    let started = Instant::now();
    sink.stop().await;
    tracing::info!("Metrics flushed in {:?}", started.elapsed());

    tracing::info!("Shutdown complete");
    Ok(())
}

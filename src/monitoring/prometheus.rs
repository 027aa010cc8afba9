//! Prometheus-backed primary monitor.
//!
//! # Responsibilities
//! - Get-or-create counter/gauge/histogram series keyed by name + labels
//! - Pin each metric name to one kind and one label-key set
//! - Own the exposition listener and probe it for health
//!
//! # Design Decisions
//! - One label-vector collector per metric name, registered on a private `Registry`
//! - Counters accumulate `f64` increments without rounding
//! - A concurrent creator that wins the insert race is reused, never an error

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use prometheus::core::{Collector, MetricVec, MetricVecBuilder};
use prometheus::{
    Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
};
use tokio::sync::Mutex;

use crate::config::ExporterConfig;
use crate::monitoring::exporter::{self, ExporterServer};
use crate::monitoring::metric::{Labels, MetricKind, Monitor, MonitorError};
use crate::monitoring::process::ProcessCollector;

/// Default Prometheus histogram buckets.
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Timeout for the self-scrape health probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
enum Collectors {
    Counter(CounterVec),
    Gauge(GaugeVec),
    Histogram(HistogramVec),
}

impl Collectors {
    fn create(kind: MetricKind, name: &str, label_keys: &[String]) -> Result<Self, MonitorError> {
        let keys: Vec<&str> = label_keys.iter().map(String::as_str).collect();
        let built = match kind {
            MetricKind::Counter => CounterVec::new(Opts::new(name, name), &keys).map(Self::Counter),
            MetricKind::Gauge => GaugeVec::new(Opts::new(name, name), &keys).map(Self::Gauge),
            MetricKind::Histogram => HistogramVec::new(
                HistogramOpts::new(name, name).buckets(DEFAULT_BUCKETS.to_vec()),
                &keys,
            )
            .map(Self::Histogram),
        };
        built.map_err(|e| MonitorError::Registration(e.to_string()))
    }

    fn kind(&self) -> MetricKind {
        match self {
            Collectors::Counter(_) => MetricKind::Counter,
            Collectors::Gauge(_) => MetricKind::Gauge,
            Collectors::Histogram(_) => MetricKind::Histogram,
        }
    }

    fn boxed(&self) -> Box<dyn Collector> {
        match self {
            Collectors::Counter(vec) => Box::new(vec.clone()),
            Collectors::Gauge(vec) => Box::new(vec.clone()),
            Collectors::Histogram(vec) => Box::new(vec.clone()),
        }
    }
}

struct Family {
    label_keys: Vec<String>,
    collectors: Collectors,
}

/// (metric name, label values in key order)
type SeriesKey = (String, Vec<String>);

/// name+labels → child handle map for one metric kind.
struct SeriesRegistry<H> {
    series: DashMap<SeriesKey, H>,
}

impl<H: Clone> SeriesRegistry<H> {
    fn new() -> Self {
        Self {
            series: DashMap::new(),
        }
    }

    fn get_or_register(
        &self,
        key: SeriesKey,
        register: impl FnOnce(&SeriesKey) -> Result<H, MonitorError>,
    ) -> Result<H, MonitorError> {
        if let Some(handle) = self.series.get(&key) {
            return Ok(handle.value().clone());
        }
        match self.series.entry(key) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let handle = register(entry.key())?;
                entry.insert(handle.clone());
                Ok(handle)
            }
        }
    }

    fn len(&self) -> usize {
        self.series.len()
    }
}

fn child<T: MetricVecBuilder>(vec: &MetricVec<T>, values: &[String]) -> Result<T::M, MonitorError> {
    let values: Vec<&str> = values.iter().map(String::as_str).collect();
    vec.get_metric_with_label_values(&values)
        .map_err(|e| MonitorError::Registration(e.to_string()))
}

/// Primary metrics backend exposing series in the Prometheus text format.
pub struct PrometheusMonitor {
    registry: Registry,
    process: Arc<ProcessCollector>,
    families: DashMap<String, Family>,
    counters: SeriesRegistry<Counter>,
    gauges: SeriesRegistry<Gauge>,
    histograms: SeriesRegistry<Histogram>,
    path: String,
    process_path: String,
    server: Mutex<Option<ExporterServer>>,
    client: reqwest::Client,
}

impl PrometheusMonitor {
    /// Create a monitor serving on the given paths once started.
    pub fn new(config: &ExporterConfig) -> Result<Self, MonitorError> {
        for path in [&config.path, &config.process_path] {
            if !path.starts_with('/') {
                return Err(MonitorError::InvalidConfig(format!(
                    "scrape path '{}' must start with '/'",
                    path
                )));
            }
        }
        if config.path == config.process_path {
            return Err(MonitorError::InvalidConfig(
                "scrape path and process path must differ".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| MonitorError::Server(e.to_string()))?;

        Ok(Self {
            registry: Registry::new(),
            process: Arc::new(ProcessCollector::new()),
            families: DashMap::new(),
            counters: SeriesRegistry::new(),
            gauges: SeriesRegistry::new(),
            histograms: SeriesRegistry::new(),
            path: config.path.clone(),
            process_path: config.process_path.clone(),
            server: Mutex::new(None),
            client,
        })
    }

    /// Current exposition text for all registered series.
    pub fn render(&self) -> String {
        exporter::encode(&self.registry)
    }

    /// Number of distinct series across all kinds.
    pub fn series_count(&self) -> usize {
        self.counters.len() + self.gauges.len() + self.histograms.len()
    }

    /// Start the exposition listener. Fails if it is already running.
    pub async fn start_server(&self, addr: SocketAddr) -> Result<SocketAddr, MonitorError> {
        let mut slot = self.server.lock().await;
        if let Some(server) = slot.as_ref() {
            return Err(MonitorError::AlreadyStarted(server.local_addr()));
        }

        let router = exporter::router(
            self.registry.clone(),
            self.process.clone(),
            &self.path,
            &self.process_path,
        );
        let server = ExporterServer::bind(addr, router).await?;
        let local_addr = server.local_addr();
        *slot = Some(server);
        Ok(local_addr)
    }

    /// Stop the exposition listener; a no-op when not started.
    pub async fn stop_server(&self) {
        let server = self.server.lock().await.take();
        if let Some(server) = server {
            server.stop().await;
        }
    }

    /// Address the listener is bound to, if started.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().await.as_ref().map(|s| s.local_addr())
    }

    /// Resolve the collector for `name`, creating and registering it on first use.
    fn family(
        &self,
        kind: MetricKind,
        name: &str,
        labels: &Labels,
    ) -> Result<(Collectors, SeriesKey), MonitorError> {
        if !is_valid_metric_name(name) {
            return Err(MonitorError::InvalidName(name.to_string()));
        }
        if let Some(bad) = labels.keys().find(|k| !is_valid_label_name(k)) {
            return Err(MonitorError::InvalidLabel {
                metric: name.to_string(),
                label: bad.clone(),
            });
        }

        let label_keys: Vec<String> = labels.keys().cloned().collect();
        let collectors = match self.families.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let family = entry.get();
                if family.collectors.kind() != kind {
                    return Err(MonitorError::KindConflict {
                        name: name.to_string(),
                        existing: family.collectors.kind(),
                        requested: kind,
                    });
                }
                if family.label_keys != label_keys {
                    return Err(MonitorError::LabelMismatch {
                        name: name.to_string(),
                        expected: family.label_keys.clone(),
                        actual: label_keys,
                    });
                }
                family.collectors.clone()
            }
            Entry::Vacant(entry) => {
                let collectors = Collectors::create(kind, name, &label_keys)?;
                self.registry
                    .register(collectors.boxed())
                    .map_err(|e| MonitorError::Registration(e.to_string()))?;
                entry.insert(Family {
                    label_keys,
                    collectors: collectors.clone(),
                });
                collectors
            }
        };

        // BTreeMap iteration yields values in label-key order
        let values = labels.values().cloned().collect();
        Ok((collectors, (name.to_string(), values)))
    }
}

fn kind_conflict(name: &str, existing: &Collectors, requested: MetricKind) -> MonitorError {
    MonitorError::KindConflict {
        name: name.to_string(),
        existing: existing.kind(),
        requested,
    }
}

#[async_trait]
impl Monitor for PrometheusMonitor {
    async fn counter(&self, name: &str, value: f64, labels: &Labels) -> Result<(), MonitorError> {
        if !value.is_finite() || value < 0.0 {
            return Err(MonitorError::InvalidValue {
                name: name.to_string(),
                kind: MetricKind::Counter,
                value,
            });
        }
        let (collectors, key) = self.family(MetricKind::Counter, name, labels)?;
        let counter = self.counters.get_or_register(key, |(_, values)| match &collectors {
            Collectors::Counter(vec) => child(vec, values),
            other => Err(kind_conflict(name, other, MetricKind::Counter)),
        })?;
        counter.inc_by(value);
        Ok(())
    }

    async fn gauge(&self, name: &str, value: f64, labels: &Labels) -> Result<(), MonitorError> {
        let (collectors, key) = self.family(MetricKind::Gauge, name, labels)?;
        let gauge = self.gauges.get_or_register(key, |(_, values)| match &collectors {
            Collectors::Gauge(vec) => child(vec, values),
            other => Err(kind_conflict(name, other, MetricKind::Gauge)),
        })?;
        gauge.set(value);
        Ok(())
    }

    async fn histogram(
        &self,
        name: &str,
        value: f64,
        labels: &Labels,
    ) -> Result<(), MonitorError> {
        let (collectors, key) = self.family(MetricKind::Histogram, name, labels)?;
        let histogram = self.histograms.get_or_register(key, |(_, values)| match &collectors {
            Collectors::Histogram(vec) => child(vec, values),
            other => Err(kind_conflict(name, other, MetricKind::Histogram)),
        })?;
        histogram.observe(value);
        Ok(())
    }

    async fn is_healthy(&self) -> Result<bool, MonitorError> {
        let addr = self.local_addr().await.ok_or(MonitorError::NotStarted)?;
        let target = if addr.ip().is_unspecified() {
            SocketAddr::from(([127, 0, 0, 1], addr.port()))
        } else {
            addr
        };

        let url = format!("http://{}{}", target, self.path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MonitorError::Unreachable(e.to_string()))?;

        Ok(response.status() == reqwest::StatusCode::OK)
    }
}

impl std::fmt::Debug for PrometheusMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMonitor")
            .field("path", &self.path)
            .field("process_path", &self.process_path)
            .field("families", &self.families.len())
            .finish()
    }
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, excluding the reserved `__` prefix.
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

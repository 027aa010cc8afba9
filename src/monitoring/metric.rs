//! Metric value objects and the primary backend capability.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label set attached to a metric write. Keys are unique; order is irrelevant.
pub type Labels = BTreeMap<String, String>;

/// Kind of a metric series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Histogram => write!(f, "histogram"),
        }
    }
}

/// A single metric observation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub value: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
    pub timestamp: DateTime<Utc>,
}

impl MetricPoint {
    /// Create a point stamped with the current time.
    pub fn new(name: impl Into<String>, kind: MetricKind, value: f64, labels: Labels) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            labels,
            timestamp: Utc::now(),
        }
    }
}

/// Errors from a metrics backend or the façade in front of it.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid metric name '{0}'")]
    InvalidName(String),

    #[error("invalid label name '{label}' on metric '{metric}'")]
    InvalidLabel { metric: String, label: String },

    #[error("metric '{name}' already registered as {existing}, cannot use as {requested}")]
    KindConflict {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    #[error("metric '{name}' registered with labels {expected:?}, got {actual:?}")]
    LabelMismatch {
        name: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("invalid value {value} for {kind} '{name}'")]
    InvalidValue {
        name: String,
        kind: MetricKind,
        value: f64,
    },

    #[error("metric registration failed: {0}")]
    Registration(String),

    #[error("invalid metrics configuration: {0}")]
    InvalidConfig(String),

    #[error("metrics server not started")]
    NotStarted,

    #[error("metrics server already started on {0}")]
    AlreadyStarted(std::net::SocketAddr),

    #[error("metrics server error: {0}")]
    Server(String),

    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("monitoring system is unavailable")]
    Unavailable,
}

/// Capability set of a metrics backend.
#[async_trait]
pub trait Monitor: Send + Sync {
    /// Add `value` to a counter.
    async fn counter(&self, name: &str, value: f64, labels: &Labels) -> Result<(), MonitorError>;

    /// Set a gauge.
    async fn gauge(&self, name: &str, value: f64, labels: &Labels) -> Result<(), MonitorError>;

    /// Record a histogram observation.
    async fn histogram(&self, name: &str, value: f64, labels: &Labels)
        -> Result<(), MonitorError>;

    /// Probe the backend itself.
    async fn is_healthy(&self) -> Result<bool, MonitorError>;

    /// Dispatch a write by kind.
    async fn record(
        &self,
        kind: MetricKind,
        name: &str,
        value: f64,
        labels: &Labels,
    ) -> Result<(), MonitorError> {
        match kind {
            MetricKind::Counter => self.counter(name, value, labels).await,
            MetricKind::Gauge => self.gauge(name, value, labels).await,
            MetricKind::Histogram => self.histogram(name, value, labels).await,
        }
    }
}

/// Build a label set from string pairs.
pub fn labels<I, K, V>(pairs: I) -> Labels
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

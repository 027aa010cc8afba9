//! Monitoring façade with graceful degradation.
//!
//! # State Machine
//! ```text
//! Healthy → Degraded: a primary write fails (first failure of a streak)
//! Degraded → Healthy: background probe reports the primary healthy
//! Healthy → Degraded: background probe reports the primary unhealthy
//! ```
//!
//! While Degraded every write goes straight to the fallback strategy; the
//! primary is not touched again until a probe succeeds. Without a probe
//! interval the state only ever degrades.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::ProbeConfig;
use crate::fallback::FallbackStrategy;
use crate::lifecycle::BackgroundTask;
use crate::monitoring::metric::{Labels, MetricKind, MetricPoint, Monitor, MonitorError};
use crate::resilience::timeouts::run_with_deadline;

/// Health of the primary backend as seen by the façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
}

/// Probe scheduling options.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOptions {
    /// `None` disables the probe (no automatic recovery).
    pub interval: Option<Duration>,
    pub timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            interval: None,
            timeout: Duration::from_secs(5),
        }
    }
}

impl From<&ProbeConfig> for ProbeOptions {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            interval: (config.interval_secs > 0).then(|| Duration::from_secs(config.interval_secs)),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// State shared between callers and the probe loop.
struct Shared {
    state: RwLock<HealthState>,
    degradations: AtomicU64,
}

impl Shared {
    fn get(&self) -> HealthState {
        match self.state.read() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Returns `true` if this call changed the state.
    fn set(&self, next: HealthState) -> bool {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *state == next {
            return false;
        }
        *state = next;
        if next == HealthState::Degraded {
            self.degradations.fetch_add(1, Ordering::Relaxed);
        }
        true
    }
}

/// Routes metric writes to the primary backend or the fallback strategy.
pub struct MonitoringFacade {
    primary: Arc<dyn Monitor>,
    fallback: Option<Arc<dyn FallbackStrategy>>,
    shared: Arc<Shared>,
    probe: Option<BackgroundTask>,
}

impl MonitoringFacade {
    /// Create the façade; spawns the probe loop when an interval is set.
    pub fn new(
        primary: Arc<dyn Monitor>,
        fallback: Option<Arc<dyn FallbackStrategy>>,
        options: ProbeOptions,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: RwLock::new(HealthState::Healthy),
            degradations: AtomicU64::new(0),
        });

        let probe = options.interval.map(|interval| {
            spawn_probe(primary.clone(), shared.clone(), interval, options.timeout)
        });

        Self {
            primary,
            fallback,
            shared,
            probe,
        }
    }

    pub async fn counter(&self, name: &str, value: f64, labels: &Labels) -> Result<(), MonitorError> {
        self.record(MetricKind::Counter, name, value, labels).await
    }

    pub async fn gauge(&self, name: &str, value: f64, labels: &Labels) -> Result<(), MonitorError> {
        self.record(MetricKind::Gauge, name, value, labels).await
    }

    pub async fn histogram(
        &self,
        name: &str,
        value: f64,
        labels: &Labels,
    ) -> Result<(), MonitorError> {
        self.record(MetricKind::Histogram, name, value, labels).await
    }

    /// Current view of the primary backend.
    pub fn is_healthy(&self) -> bool {
        self.state() == HealthState::Healthy
    }

    pub fn state(&self) -> HealthState {
        self.shared.get()
    }

    /// Number of Healthy → Degraded transitions so far.
    pub fn degradations(&self) -> u64 {
        self.shared.degradations.load(Ordering::Relaxed)
    }

    /// Stop the probe loop. Safe to call more than once.
    pub async fn stop(&self) {
        if let Some(probe) = &self.probe {
            probe.stop().await;
        }
    }

    async fn record(
        &self,
        kind: MetricKind,
        name: &str,
        value: f64,
        labels: &Labels,
    ) -> Result<(), MonitorError> {
        if self.shared.get() == HealthState::Healthy {
            match self.primary.record(kind, name, value, labels).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if self.shared.set(HealthState::Degraded) {
                        tracing::warn!(
                            metric = name,
                            kind = %kind,
                            error = %e,
                            "Primary metrics backend failed, switching to fallback"
                        );
                    }
                }
            }
        }

        self.fall_back(MetricPoint::new(name, kind, value, labels.clone()))
    }

    fn fall_back(&self, point: MetricPoint) -> Result<(), MonitorError> {
        let Some(fallback) = self.fallback.as_ref().filter(|f| f.is_enabled()) else {
            return Err(MonitorError::Unavailable);
        };

        fallback.handle_failure(point).map_err(|e| {
            tracing::error!(error = %e, "Fallback strategy rejected metric");
            MonitorError::Unavailable
        })
    }
}

impl std::fmt::Debug for MonitoringFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringFacade")
            .field("state", &self.state())
            .field("has_fallback", &self.fallback.is_some())
            .field("probing", &self.probe.is_some())
            .finish()
    }
}

fn spawn_probe(
    primary: Arc<dyn Monitor>,
    shared: Arc<Shared>,
    interval: Duration,
    timeout: Duration,
) -> BackgroundTask {
    BackgroundTask::spawn("monitor-probe", move |token| async move {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let healthy = match run_with_deadline(&token, timeout, primary.is_healthy()).await {
                        Ok(Ok(healthy)) => healthy,
                        Ok(Err(e)) => {
                            tracing::debug!(error = %e, "Primary metrics probe failed");
                            false
                        }
                        Err(e) => {
                            if token.is_cancelled() {
                                break;
                            }
                            tracing::debug!(error = %e, "Primary metrics probe interrupted");
                            false
                        }
                    };

                    let next = if healthy { HealthState::Healthy } else { HealthState::Degraded };
                    if shared.set(next) {
                        tracing::info!(state = ?next, "Primary metrics backend state changed by probe");
                    }
                }
            }
        }
    })
}

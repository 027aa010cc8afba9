//! Composable health check aggregation.
//!
//! Runs every registered check in registration order under a per-check
//! timeout and reduces the results: Down if any check is Down, Up otherwise
//! (including the empty set).

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_util::FutureExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::HealthConfig;
use crate::health::check::{CheckError, CheckStatus, HealthCheck, HttpCheck};
use crate::resilience::timeouts::run_with_deadline;

/// Result of one check in one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reduced result of an aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub status: CheckStatus,
    pub details: BTreeMap<String, CheckResult>,
}

impl AggregateResult {
    pub fn is_up(&self) -> bool {
        self.status == CheckStatus::Up
    }
}

/// Registry of health checks.
pub struct HealthAggregator {
    checks: RwLock<Vec<Arc<dyn HealthCheck>>>,
    check_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(check_timeout: Duration) -> Self {
        Self {
            checks: RwLock::new(Vec::new()),
            check_timeout,
        }
    }

    /// Build with an `HttpCheck` per configured target.
    pub fn from_config(config: &HealthConfig) -> Result<Self, CheckError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let aggregator = Self::new(timeout);
        for target in &config.checks {
            aggregator.add_check(Arc::new(HttpCheck::new(&target.name, &target.url, timeout)?));
        }
        Ok(aggregator)
    }

    pub fn add_check(&self, check: Arc<dyn HealthCheck>) {
        let mut checks = match self.checks.write() {
            Ok(checks) => checks,
            Err(poisoned) => poisoned.into_inner(),
        };
        tracing::debug!(check = check.name(), "Health check registered");
        checks.push(check);
    }

    /// Remove every check with `name`. Returns whether any was removed.
    pub fn remove_check(&self, name: &str) -> bool {
        let mut checks = match self.checks.write() {
            Ok(checks) => checks,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = checks.len();
        checks.retain(|c| c.name() != name);
        checks.len() != before
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn HealthCheck>> {
        match self.checks.read() {
            Ok(checks) => checks.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Execute every check and reduce to one status.
    pub async fn run_checks(&self, token: &CancellationToken) -> AggregateResult {
        let mut aggregate = AggregateResult {
            status: CheckStatus::Up,
            details: BTreeMap::new(),
        };

        for check in self.snapshot() {
            let result = self.run_one(check.as_ref(), token).await;
            if result.status == CheckStatus::Down {
                tracing::warn!(
                    check = %result.name,
                    error = result.error.as_deref().unwrap_or(""),
                    "Health check down"
                );
                aggregate.status = CheckStatus::Down;
            }
            aggregate.details.insert(result.name.clone(), result);
        }

        aggregate
    }

    async fn run_one(&self, check: &dyn HealthCheck, token: &CancellationToken) -> CheckResult {
        let guarded = AssertUnwindSafe(check.execute(token)).catch_unwind();
        let outcome = match run_with_deadline(token, self.check_timeout, guarded).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_panic)) => Err(CheckError::Panicked),
            Err(interrupted) => Err(interrupted.into()),
        };

        let (status, error) = match outcome {
            Ok(status) => (status, None),
            Err(e) => (CheckStatus::Down, Some(e.to_string())),
        };

        CheckResult {
            name: check.name().to_string(),
            status,
            error,
        }
    }
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl std::fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthAggregator")
            .field("checks", &self.len())
            .field("check_timeout", &self.check_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::check::FnCheck;

    fn up(name: &str) -> Arc<dyn HealthCheck> {
        Arc::new(FnCheck::new(name, |_| async { Ok(CheckStatus::Up) }))
    }

    fn down(name: &str) -> Arc<dyn HealthCheck> {
        Arc::new(FnCheck::new(name, |_| async {
            Err(CheckError::Failed("connection refused".to_string()))
        }))
    }

    #[tokio::test]
    async fn test_empty_set_is_up() {
        let aggregator = HealthAggregator::default();
        let result = aggregator.run_checks(&CancellationToken::new()).await;
        assert!(result.is_up());
        assert!(result.details.is_empty());
    }

    #[tokio::test]
    async fn test_any_down_is_down_and_removal_restores() {
        let aggregator = HealthAggregator::default();
        aggregator.add_check(up("db"));
        aggregator.add_check(down("payments"));
        aggregator.add_check(up("cache"));

        let result = aggregator.run_checks(&CancellationToken::new()).await;
        assert_eq!(result.status, CheckStatus::Down);
        assert_eq!(result.details.len(), 3);
        assert_eq!(result.details["db"].status, CheckStatus::Up);
        assert_eq!(
            result.details["payments"].error.as_deref(),
            Some("connection refused")
        );

        assert!(aggregator.remove_check("payments"));
        assert!(!aggregator.remove_check("payments"));
        let result = aggregator.run_checks(&CancellationToken::new()).await;
        assert!(result.is_up());
    }

    #[tokio::test]
    async fn test_down_without_error() {
        let aggregator = HealthAggregator::default();
        aggregator.add_check(Arc::new(FnCheck::new("quiet", |_| async {
            Ok(CheckStatus::Down)
        })));

        let result = aggregator.run_checks(&CancellationToken::new()).await;
        assert_eq!(result.status, CheckStatus::Down);
        assert_eq!(result.details["quiet"].error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_check_times_out() {
        let aggregator = HealthAggregator::new(Duration::from_secs(2));
        aggregator.add_check(Arc::new(FnCheck::new("slow", |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(CheckStatus::Up)
        })));
        aggregator.add_check(up("fast"));

        let result = aggregator.run_checks(&CancellationToken::new()).await;
        assert_eq!(result.status, CheckStatus::Down);
        assert_eq!(
            result.details["slow"].error.as_deref(),
            Some("check timed out after 2s")
        );
        assert_eq!(result.details["fast"].status, CheckStatus::Up);
    }

    #[tokio::test]
    async fn test_cancelled_token_marks_checks_down() {
        let aggregator = HealthAggregator::default();
        aggregator.add_check(up("db"));
        let token = CancellationToken::new();
        token.cancel();

        let result = aggregator.run_checks(&token).await;
        assert_eq!(result.status, CheckStatus::Down);
        assert_eq!(result.details["db"].error.as_deref(), Some("check cancelled"));
    }

    #[tokio::test]
    async fn test_panicking_check_is_down() {
        let aggregator = HealthAggregator::default();
        aggregator.add_check(Arc::new(FnCheck::new("boom", |_| async {
            let status: Option<CheckStatus> = None;
            Ok(status.expect("probe exploded"))
        })));
        aggregator.add_check(up("db"));

        let result = aggregator.run_checks(&CancellationToken::new()).await;
        assert_eq!(result.details["boom"].error.as_deref(), Some("check panicked"));
        assert_eq!(result.details["db"].status, CheckStatus::Up);
    }

    #[test]
    fn test_serialized_shape() {
        let mut details = BTreeMap::new();
        details.insert(
            "db".to_string(),
            CheckResult {
                name: "db".to_string(),
                status: CheckStatus::Up,
                error: None,
            },
        );
        let json = serde_json::to_value(AggregateResult {
            status: CheckStatus::Up,
            details,
        })
        .unwrap();
        assert_eq!(json["status"], "UP");
        assert!(json["details"]["db"].get("error").is_none());
    }
}

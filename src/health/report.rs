//! Health endpoint payload.
//!
//! The process is always reported UP: a degraded monitoring backend means the
//! fallback path is engaged, not that the service itself is down.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::health::aggregator::{AggregateResult, HealthAggregator};
use crate::health::check::CheckStatus;
use crate::monitoring::MonitoringFacade;

const FALLBACK_NOTE: &str = "Using fallback strategy for monitoring";

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: CheckStatus,
    pub details: HealthDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthDetails {
    pub monitoring: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<&'static str>,
    pub checks: AggregateResult,
}

impl HealthReport {
    /// Query both read paths and shape the payload.
    pub async fn collect(
        facade: &MonitoringFacade,
        aggregator: &HealthAggregator,
        token: &CancellationToken,
    ) -> Self {
        let monitoring_up = facade.is_healthy();
        let checks = aggregator.run_checks(token).await;
        Self::from_parts(monitoring_up, checks)
    }

    pub fn from_parts(monitoring_up: bool, checks: AggregateResult) -> Self {
        let (monitoring, notes) = if monitoring_up {
            (CheckStatus::Up, None)
        } else {
            (CheckStatus::Down, Some(FALLBACK_NOTE))
        };

        Self {
            status: CheckStatus::Up,
            details: HealthDetails {
                monitoring,
                notes,
                checks,
            },
        }
    }
}

//! Request metrics middleware.
//!
//! Records per-request counters and latency through the monitoring façade.
//! Recording happens in a spawned task so a slow or degraded backend never
//! delays the response.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::monitoring::{labels, MonitoringFacade};

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";
pub const REQUESTS_ACTIVE: &str = "http_requests_active";
pub const ERRORS_TOTAL: &str = "http_errors_total";

/// (matched path, method)
type Route = (String, String);

/// State shared by every request passing through [`track_requests`].
#[derive(Debug, Clone)]
pub struct RequestMetrics {
    facade: Arc<MonitoringFacade>,
    in_flight: Arc<DashMap<Route, i64>>,
}

impl RequestMetrics {
    pub fn new(facade: Arc<MonitoringFacade>) -> Self {
        Self {
            facade,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Requests currently inside the handler chain for one route.
    pub fn in_flight(&self, path: &str, method: &str) -> i64 {
        self.in_flight
            .get(&(path.to_string(), method.to_string()))
            .map(|count| *count)
            .unwrap_or(0)
    }

    fn enter(&self, route: Route) -> InFlight {
        *self.in_flight.entry(route.clone()).or_insert(0) += 1;
        InFlight {
            counts: self.in_flight.clone(),
            route,
        }
    }
}

/// Decrements its route's count on drop, including when the request future
/// is dropped mid-flight.
struct InFlight {
    counts: Arc<DashMap<Route, i64>>,
    route: Route,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(mut count) = self.counts.get_mut(&self.route) {
            *count -= 1;
        }
    }
}

pub async fn track_requests(
    State(metrics): State<RequestMetrics>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let method = request.method().to_string();

    let guard = metrics.enter((path.clone(), method.clone()));
    let response = next.run(request).await;
    drop(guard);
    let active = metrics.in_flight(&path, &method);

    let elapsed = start.elapsed().as_secs_f64();
    let status = response.status();
    let facade = metrics.facade.clone();

    tokio::spawn(async move {
        let route = labels([("path", path.as_str()), ("method", method.as_str())]);
        let mut by_status = route.clone();
        by_status.insert("status".to_string(), status.as_u16().to_string());

        let mut results = vec![
            facade.counter(REQUESTS_TOTAL, 1.0, &by_status).await,
            facade.histogram(REQUEST_DURATION, elapsed, &by_status).await,
            facade.gauge(REQUESTS_ACTIVE, active as f64, &route).await,
        ];
        if status.is_server_error() {
            results.push(facade.counter(ERRORS_TOTAL, 1.0, &by_status).await);
        }

        for result in results {
            if let Err(e) = result {
                tracing::debug!(path = %path, error = %e, "Request metric dropped");
            }
        }
    });

    response
}

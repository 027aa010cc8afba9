//! Process and runtime collectors.
//!
//! Gauges live on a recorder owned by the collector, separate from
//! application metrics, and are refreshed on every scrape.

use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{Key, KeyName, Level, Metadata, Recorder, SharedString};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusRecorder};

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// Snapshot source for process-level gauges.
pub struct ProcessCollector {
    recorder: PrometheusRecorder,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl ProcessCollector {
    pub fn new() -> Self {
        Self {
            recorder: PrometheusBuilder::new().build_recorder(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Refresh every process gauge and render the recorder.
    pub fn render(&self) -> String {
        self.set(
            "process_start_time_seconds",
            "Start time of the process since unix epoch in seconds.",
            self.started_at.timestamp_millis() as f64 / 1000.0,
        );
        self.set(
            "process_uptime_seconds",
            "Seconds since the monitor was started.",
            self.started.elapsed().as_secs_f64(),
        );
        self.set(
            "process_id",
            "Operating system process id.",
            f64::from(std::process::id()),
        );
        if let Some(rss) = resident_memory_bytes() {
            self.set(
                "process_resident_memory_bytes",
                "Resident memory size in bytes.",
                rss as f64,
            );
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            self.set(
                "tokio_workers_count",
                "Number of worker threads used by the runtime.",
                handle.metrics().num_workers() as f64,
            );
        }

        self.recorder.handle().render()
    }

    fn set(&self, name: &'static str, help: &'static str, value: f64) {
        self.recorder
            .describe_gauge(KeyName::from_const_str(name), None, SharedString::const_str(help));
        self.recorder
            .register_gauge(&Key::from_static_name(name), &METADATA)
            .set(value);
    }
}

impl Default for ProcessCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessCollector")
            .field("started_at", &self.started_at)
            .finish()
    }
}

/// Resident set size from `VmRSS`, reported in kB regardless of page size.
#[cfg(target_os = "linux")]
fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

#[cfg(not(target_os = "linux"))]
fn resident_memory_bytes() -> Option<u64> {
    None
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_rss(status: &str) -> Option<u64> {
    let kb: u64 = status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kb * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_render_contains_core_gauges() {
        let text = ProcessCollector::new().render();
        assert!(text.contains("# TYPE process_start_time_seconds gauge"), "{text}");
        assert!(text.contains("# HELP process_id Operating system process id."), "{text}");
        assert!(text.contains("process_uptime_seconds "), "{text}");
        assert!(text.contains(&format!("process_id {}", std::process::id())), "{text}");
        assert!(text.contains("tokio_workers_count"), "{text}");
    }

    #[test]
    fn test_render_without_runtime() {
        let text = ProcessCollector::new().render();
        assert!(!text.contains("tokio_workers_count"));
    }

    #[test]
    fn test_vm_rss_is_read_in_kilobytes() {
        let status = "Name:\tsentinel\nVmPeak:\t  9000 kB\nVmRSS:\t    2048 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss(status), Some(2048 * 1024));
        assert_eq!(parse_vm_rss("Name:\tsentinel\n"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_resident_memory_reported_on_linux() {
        let text = ProcessCollector::new().render();
        assert!(text.contains("process_resident_memory_bytes"), "{text}");
    }
}

//! Durable destinations for flushed fallback records.
//!
//! One flush produces one record:
//! ```text
//! {"timestamp":"…","metrics_count":2,"metrics":[{…},{…}]}
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::fallback::sink::FallbackError;
use crate::monitoring::metric::MetricPoint;

/// One flushed buffer generation.
#[derive(Debug, Serialize)]
pub struct FlushRecord<'a> {
    pub timestamp: DateTime<Utc>,
    pub metrics_count: usize,
    pub metrics: &'a [MetricPoint],
}

impl<'a> FlushRecord<'a> {
    pub fn new(metrics: &'a [MetricPoint]) -> Self {
        Self {
            timestamp: Utc::now(),
            metrics_count: metrics.len(),
            metrics,
        }
    }

    /// Serialize as a single JSON line (without the trailing newline).
    pub fn to_json(&self) -> Result<String, FallbackError> {
        serde_json::to_string(self).map_err(FallbackError::Serialize)
    }
}

/// Append-only sink for flush records.
pub trait RecordWriter: Send + Sync {
    fn write_record(&self, record: &FlushRecord<'_>) -> Result<(), FallbackError>;
}

/// Appends one JSON line per record to a file.
#[derive(Debug)]
pub struct JsonLinesWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesWriter {
    /// Open `path` for appending, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FallbackError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(FallbackError::Io)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(FallbackError::Io)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordWriter for JsonLinesWriter {
    fn write_record(&self, record: &FlushRecord<'_>) -> Result<(), FallbackError> {
        let mut line = record.to_json()?;
        line.push('\n');

        let mut file = self.file.lock().map_err(|_| FallbackError::Poisoned)?;
        file.write_all(line.as_bytes()).map_err(FallbackError::Io)?;
        file.flush().map_err(FallbackError::Io)
    }
}

/// Emits records on the `fallback_metrics` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWriter;

impl RecordWriter for TracingWriter {
    fn write_record(&self, record: &FlushRecord<'_>) -> Result<(), FallbackError> {
        let json = record.to_json()?;
        tracing::info!(
            target: "fallback_metrics",
            metrics_count = record.metrics_count,
            "{}",
            json
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::metric::{Labels, MetricKind};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("sentinel-monitor-{}-{}", std::process::id(), name))
            .join("metrics.log")
    }

    #[test]
    fn test_json_lines_append_one_record_per_write() {
        let path = temp_path("append");
        let _ = fs::remove_file(&path);
        let writer = JsonLinesWriter::open(&path).unwrap();

        let points = vec![
            MetricPoint::new("a_total", MetricKind::Counter, 1.0, Labels::new()),
            MetricPoint::new("b", MetricKind::Gauge, 2.0, Labels::new()),
        ];
        writer.write_record(&FlushRecord::new(&points)).unwrap();
        writer.write_record(&FlushRecord::new(&points[..1])).unwrap();

        let content = fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["metrics_count"], 2);
        assert_eq!(lines[0]["metrics"][1]["name"], "b");
        assert_eq!(lines[1]["metrics_count"], 1);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_tracing_writer_accepts_records() {
        let points = vec![MetricPoint::new("x", MetricKind::Histogram, 0.3, Labels::new())];
        assert!(TracingWriter.write_record(&FlushRecord::new(&points)).is_ok());
    }
}

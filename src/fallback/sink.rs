//! Bounded local fallback buffer.
//!
//! # Responsibilities
//! - Accept points the primary backend could not take
//! - Keep at most `capacity` points; a full buffer is flushed before appending
//! - Write each buffer generation as one record to an append-only writer
//!
//! # Design Decisions
//! - One mutex guards the buffer; flush and append serialize on it, so no
//!   point is lost or duplicated across a flush boundary
//! - A failed write keeps the buffer intact for the next flush
//! - A disabled sink drops points silently

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;

use crate::config::FallbackConfig;
use crate::fallback::flusher::spawn_flusher;
use crate::fallback::writer::{FlushRecord, JsonLinesWriter, RecordWriter, TracingWriter};
use crate::lifecycle::BackgroundTask;
use crate::monitoring::metric::MetricPoint;

/// Errors raised by the fallback path.
#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("buffer capacity must be at least 1")]
    InvalidCapacity,

    #[error("failed to serialize metrics buffer: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write metrics record: {0}")]
    Io(#[source] std::io::Error),

    #[error("fallback buffer lock poisoned")]
    Poisoned,
}

/// Capability of anything that can absorb points on the failure path.
pub trait FallbackStrategy: Send + Sync {
    /// Take ownership of a point the primary backend could not record.
    fn handle_failure(&self, point: MetricPoint) -> Result<(), FallbackError>;

    /// Whether the strategy should be consulted at all.
    fn is_enabled(&self) -> bool;
}

/// Buffers points in memory and flushes them to a `RecordWriter`.
pub struct FallbackSink {
    enabled: bool,
    capacity: usize,
    buffer: Mutex<Vec<MetricPoint>>,
    writer: Arc<dyn RecordWriter>,
    flusher: Mutex<Option<BackgroundTask>>,
}

impl FallbackSink {
    pub fn new(
        enabled: bool,
        capacity: usize,
        writer: Arc<dyn RecordWriter>,
    ) -> Result<Self, FallbackError> {
        if capacity == 0 {
            return Err(FallbackError::InvalidCapacity);
        }

        Ok(Self {
            enabled,
            capacity,
            buffer: Mutex::new(Vec::with_capacity(capacity)),
            writer,
            flusher: Mutex::new(None),
        })
    }

    /// Build from configuration. An unopenable log file degrades to the
    /// tracing writer rather than failing startup.
    pub fn from_config(config: &FallbackConfig) -> Result<Self, FallbackError> {
        let writer: Arc<dyn RecordWriter> = if config.log_path.is_empty() {
            Arc::new(TracingWriter)
        } else {
            match JsonLinesWriter::open(&config.log_path) {
                Ok(writer) => Arc::new(writer),
                Err(e) => {
                    tracing::warn!(
                        path = %config.log_path,
                        error = %e,
                        "Failed to open fallback log, using log stream"
                    );
                    Arc::new(TracingWriter)
                }
            }
        };

        Self::new(config.enabled, config.buffer_capacity, writer)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Points in the current buffer generation.
    pub fn len(&self) -> usize {
        self.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current buffer generation, in insertion order.
    pub fn snapshot(&self) -> Vec<MetricPoint> {
        self.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Write the buffer as one record and clear it.
    ///
    /// Returns the number of points flushed; `0` means the buffer was empty.
    pub fn flush(&self) -> Result<usize, FallbackError> {
        let mut buffer = self.lock()?;
        self.flush_locked(&mut buffer)
    }

    fn flush_locked(&self, buffer: &mut Vec<MetricPoint>) -> Result<usize, FallbackError> {
        if buffer.is_empty() {
            return Ok(0);
        }

        let record = FlushRecord::new(buffer);
        if let Err(e) = self.writer.write_record(&record) {
            tracing::error!(
                error = %e,
                buffered = buffer.len(),
                "Failed to flush metrics buffer, keeping points for next flush"
            );
            return Err(e);
        }

        let flushed = buffer.len();
        buffer.clear();
        tracing::debug!(metrics_count = flushed, "Flushed fallback buffer");
        Ok(flushed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<MetricPoint>>, FallbackError> {
        self.buffer.lock().map_err(|_| FallbackError::Poisoned)
    }

    /// Start the periodic flush ticker. A no-op if one is already running.
    pub fn start_flusher(self: &Arc<Self>, interval: Duration) {
        let mut slot = match self.flusher.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.is_some() {
            return;
        }
        *slot = Some(spawn_flusher(Arc::downgrade(self), interval));
        tracing::info!(interval_secs = interval.as_secs_f64(), "Fallback flusher started");
    }

    /// Stop the ticker (if any) and flush whatever is buffered.
    pub async fn stop(&self) {
        let task = match self.flusher.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task {
            task.stop().await;
        }

        match self.flush() {
            Ok(0) => {}
            Ok(n) => tracing::info!(metrics_count = n, "Final fallback flush"),
            Err(e) => tracing::error!(error = %e, "Final fallback flush failed"),
        }
    }
}

impl FallbackStrategy for FallbackSink {
    fn handle_failure(&self, point: MetricPoint) -> Result<(), FallbackError> {
        if !self.enabled {
            return Ok(());
        }

        let mut buffer = self.lock()?;
        if buffer.len() >= self.capacity {
            self.flush_locked(&mut buffer)?;
        }
        buffer.push(point);
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl std::fmt::Debug for FallbackSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackSink")
            .field("enabled", &self.enabled)
            .field("capacity", &self.capacity)
            .field("buffered", &self.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::monitoring::metric::{Labels, MetricKind};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Keeps flushed generations in memory; can be told to fail.
    #[derive(Default)]
    pub(crate) struct MemoryWriter {
        pub records: Mutex<Vec<Vec<MetricPoint>>>,
        pub failing: AtomicBool,
    }

    impl MemoryWriter {
        pub fn records(&self) -> Vec<Vec<String>> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.iter().map(|p| p.name.clone()).collect())
                .collect()
        }
    }

    impl RecordWriter for MemoryWriter {
        fn write_record(&self, record: &FlushRecord<'_>) -> Result<(), FallbackError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(FallbackError::Io(std::io::Error::other("disk full")));
            }
            record.to_json()?;
            self.records.lock().unwrap().push(record.metrics.to_vec());
            Ok(())
        }
    }

    fn point(name: &str) -> MetricPoint {
        MetricPoint::new(name, MetricKind::Counter, 1.0, Labels::new())
    }

    fn sink(capacity: usize) -> (Arc<FallbackSink>, Arc<MemoryWriter>) {
        let writer = Arc::new(MemoryWriter::default());
        let sink = FallbackSink::new(true, capacity, writer.clone()).unwrap();
        (Arc::new(sink), writer)
    }

    #[test]
    fn test_full_buffer_flushes_before_append() {
        let (sink, writer) = sink(2);
        sink.handle_failure(point("a")).unwrap();
        sink.handle_failure(point("b")).unwrap();
        assert_eq!(sink.len(), 2);
        assert!(writer.records().is_empty());

        sink.handle_failure(point("c")).unwrap();
        assert_eq!(writer.records(), vec![vec!["a", "b"]]);
        let names: Vec<String> = sink.snapshot().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["c"]);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let (sink, writer) = sink(3);
        for i in 0..20 {
            sink.handle_failure(point(&format!("p{i}"))).unwrap();
            assert!(sink.len() <= 3);
        }
        let flushed: usize = writer.records().iter().map(|r| r.len()).sum();
        assert_eq!(flushed + sink.len(), 20);
    }

    #[test]
    fn test_flush_twice_writes_one_record() {
        let (sink, writer) = sink(10);
        sink.handle_failure(point("a")).unwrap();

        assert_eq!(sink.flush().unwrap(), 1);
        assert_eq!(sink.flush().unwrap(), 0);
        assert_eq!(writer.records().len(), 1);
    }

    #[test]
    fn test_empty_flush_is_noop() {
        let (sink, writer) = sink(10);
        assert_eq!(sink.flush().unwrap(), 0);
        assert!(writer.records().is_empty());
    }

    #[test]
    fn test_disabled_sink_drops_silently() {
        let writer = Arc::new(MemoryWriter::default());
        let sink = FallbackSink::new(false, 4, writer.clone()).unwrap();
        assert!(!sink.is_enabled());
        assert!(sink.handle_failure(point("a")).is_ok());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_failed_flush_preserves_buffer() {
        let (sink, writer) = sink(2);
        sink.handle_failure(point("a")).unwrap();
        sink.handle_failure(point("b")).unwrap();

        writer.failing.store(true, Ordering::SeqCst);
        assert!(sink.flush().is_err());
        assert!(sink.handle_failure(point("c")).is_err());
        assert_eq!(sink.len(), 2);

        writer.failing.store(false, Ordering::SeqCst);
        sink.handle_failure(point("c")).unwrap();
        assert_eq!(writer.records(), vec![vec!["a", "b"]]);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let writer = Arc::new(MemoryWriter::default());
        assert!(matches!(
            FallbackSink::new(true, 0, writer),
            Err(FallbackError::InvalidCapacity)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_flush_and_stop() {
        let (sink, writer) = sink(100);
        sink.start_flusher(Duration::from_secs(30));
        sink.start_flusher(Duration::from_secs(1));

        sink.handle_failure(point("a")).unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(writer.records(), vec![vec!["a"]]);

        sink.handle_failure(point("b")).unwrap();
        sink.stop().await;
        assert_eq!(writer.records(), vec![vec!["a"], vec!["b"]]);

        sink.stop().await;
        assert_eq!(writer.records().len(), 2);
    }

    #[test]
    fn test_concurrent_appends_lose_nothing() {
        let (sink, writer) = sink(7);
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        sink.handle_failure(point(&format!("t{t}-{i}"))).unwrap();
                        if i % 13 == 0 {
                            sink.flush().unwrap();
                        }
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        sink.flush().unwrap();

        let mut all: Vec<String> = writer.records().into_iter().flatten().collect();
        assert_eq!(all.len(), 800);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 800);
    }
}

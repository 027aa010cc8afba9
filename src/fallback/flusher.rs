//! Periodic flush ticker for the fallback sink.

use std::sync::Weak;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use crate::fallback::sink::FallbackSink;
use crate::lifecycle::BackgroundTask;

/// Flush `sink` every `period` until stopped or the sink is dropped.
pub fn spawn_flusher(sink: Weak<FallbackSink>, period: Duration) -> BackgroundTask {
    BackgroundTask::spawn("fallback-flusher", move |token| async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(sink) = sink.upgrade() else { break };
                    if let Err(e) = sink.flush() {
                        tracing::warn!(error = %e, "Periodic fallback flush failed");
                    }
                }
            }
        }
    })
}

//! Buffer & Flush Scheduling
//!
//! Accumulates normalized trade events and flushes them through the sink
//! when either the batch-size threshold or the flush interval is reached,
//! whichever occurs first.
//!
//! All three flush initiators — the size trigger on the receive path, the
//! periodic timer tick, and the final shutdown flush — funnel through one
//! `tokio::sync::Mutex` that stays held across the sink round trip. The
//! hand-off of the current accumulation and the start of the next one is
//! therefore a single critical section: a batch is flushed exactly once, no
//! event can land in two batches or be dropped between "read for flush" and
//! "clear", and at most one flush is ever in flight per sink connection.

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::ports::TradeSink;
use crate::domain::stats::Stats;
use crate::domain::trade::TradeEvent;

/// Which of the flush initiators fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The accumulation reached the configured batch size.
    Size,
    /// The flush interval elapsed.
    Interval,
    /// The shutdown coordinator is draining remaining events.
    Shutdown,
}

impl FlushTrigger {
    /// Label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Interval => "interval",
            Self::Shutdown => "shutdown",
        }
    }
}

/// In-memory accumulation of trade events with dual-trigger flushing.
pub struct TradeBuffer {
    events: Mutex<Vec<TradeEvent>>,
    sink: Arc<dyn TradeSink>,
    stats: Arc<Stats>,
    batch_size: usize,
}

impl TradeBuffer {
    /// Create an empty buffer that flushes through `sink` once `batch_size`
    /// events have accumulated.
    #[must_use]
    pub fn new(sink: Arc<dyn TradeSink>, stats: Arc<Stats>, batch_size: usize) -> Self {
        Self {
            events: Mutex::new(Vec::with_capacity(batch_size)),
            sink,
            stats,
            batch_size,
        }
    }

    /// Append one event, flushing inside the same critical section when the
    /// batch-size threshold is reached.
    pub async fn push(&self, event: TradeEvent) {
        let mut events = self.events.lock().await;
        events.push(event);
        if events.len() >= self.batch_size {
            self.flush_locked(&mut events, FlushTrigger::Size).await;
        }
    }

    /// Flush whatever has accumulated. A no-op when the buffer is empty.
    pub async fn flush(&self, trigger: FlushTrigger) {
        let mut events = self.events.lock().await;
        self.flush_locked(&mut events, trigger).await;
    }

    /// Number of events currently accumulated.
    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    /// Whether the accumulation is currently empty.
    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }

    /// Run the periodic flush loop until cancelled.
    ///
    /// Ticks are delayed rather than bursted after a slow flush, so the
    /// interval is always measured from the end of the previous tick's work.
    pub async fn run_flush_timer(&self, flush_interval: Duration, cancel: CancellationToken) {
        let start = tokio::time::Instant::now() + flush_interval;
        let mut interval = tokio::time::interval_at(start, flush_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Flush timer cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.flush(FlushTrigger::Interval).await;
                }
            }
        }
    }

    /// Hand the accumulation to the sink while holding the buffer lock.
    ///
    /// On failure the batch is dropped, not retried: the pipeline provides
    /// at-most-once ingestion, and the error counter plus the log line are
    /// the operator's signal to investigate.
    async fn flush_locked(&self, events: &mut Vec<TradeEvent>, trigger: FlushTrigger) {
        if events.is_empty() {
            return;
        }

        let batch = mem::take(events);
        let started = Instant::now();

        match self.sink.write_batch(&batch).await {
            Ok(count) => {
                self.stats.add_inserted(count);
                tracing::info!(
                    trigger = trigger.as_str(),
                    count,
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    total_inserted = self.stats.snapshot().inserted,
                    "Flushed batch"
                );
            }
            Err(e) => {
                self.stats.record_error();
                tracing::error!(
                    trigger = trigger.as_str(),
                    batch_len = batch.len(),
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Batch write failed; events dropped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::SinkError;
    use crate::domain::normalize::normalize;
    use crate::domain::trade::MATCHES_CHANNEL;
    use async_trait::async_trait;
    use serde_json::json;

    struct CountingSink {
        calls: Mutex<Vec<usize>>,
    }

    impl CountingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TradeSink for CountingSink {
        async fn write_batch(&self, batch: &[TradeEvent]) -> Result<u64, SinkError> {
            self.calls.lock().await.push(batch.len());
            Ok(batch.len() as u64)
        }
    }

    struct FailingSink;

    #[async_trait]
    impl TradeSink for FailingSink {
        async fn write_batch(&self, _batch: &[TradeEvent]) -> Result<u64, SinkError> {
            Err(SinkError::Write("simulated outage".to_string()))
        }
    }

    fn sample_event(trade_id: u64) -> TradeEvent {
        normalize(
            MATCHES_CHANNEL,
            json!({"type": "match", "trade_id": trade_id, "price": "1.0"}),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn size_threshold_flushes_exactly_once() {
        let sink = CountingSink::new();
        let stats = Arc::new(Stats::new());
        let buffer = TradeBuffer::new(Arc::clone(&sink) as Arc<dyn TradeSink>, stats.clone(), 3);

        for i in 0..3 {
            buffer.push(sample_event(i)).await;
        }

        assert_eq!(*sink.calls.lock().await, vec![3]);
        assert!(buffer.is_empty().await);
        assert_eq!(stats.snapshot().inserted, 3);
    }

    #[tokio::test]
    async fn below_threshold_does_not_flush() {
        let sink = CountingSink::new();
        let stats = Arc::new(Stats::new());
        let buffer = TradeBuffer::new(Arc::clone(&sink) as Arc<dyn TradeSink>, stats, 10);

        buffer.push(sample_event(1)).await;
        buffer.push(sample_event(2)).await;

        assert!(sink.calls.lock().await.is_empty());
        assert_eq!(buffer.len().await, 2);
    }

    #[tokio::test]
    async fn empty_flush_is_a_noop() {
        let sink = CountingSink::new();
        let stats = Arc::new(Stats::new());
        let buffer = TradeBuffer::new(Arc::clone(&sink) as Arc<dyn TradeSink>, stats, 10);

        buffer.flush(FlushTrigger::Interval).await;

        assert!(sink.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn failed_flush_counts_one_error_and_drops_batch() {
        let stats = Arc::new(Stats::new());
        let buffer = TradeBuffer::new(Arc::new(FailingSink), stats.clone(), 4);

        for i in 0..4 {
            buffer.push(sample_event(i)).await;
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.inserted, 0);
        assert!(buffer.is_empty().await);
    }
}

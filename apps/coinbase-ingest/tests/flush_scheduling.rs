//! Flush Scheduling Integration Tests
//!
//! Exercises the buffer's dual-trigger contract against in-memory sinks:
//! size-trigger exclusivity, timer no-ops on an empty accumulation, atomic
//! hand-off under concurrent triggers, failure accounting, and the final
//! shutdown flush.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_truncation)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coinbase_ingest::{
    FlushTrigger, MATCHES_CHANNEL, SinkError, Stats, TradeBuffer, TradeEvent, TradeSink, normalize,
};
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Sink that records every batch it receives, with an optional write delay
/// to widen race windows.
struct RecordingSink {
    batches: Mutex<Vec<Vec<TradeEvent>>>,
    write_delay: Duration,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    fn with_delay(write_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
            write_delay,
        })
    }

    async fn batches(&self) -> Vec<Vec<TradeEvent>> {
        self.batches.lock().await.clone()
    }
}

#[async_trait]
impl TradeSink for RecordingSink {
    async fn write_batch(&self, batch: &[TradeEvent]) -> Result<u64, SinkError> {
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
        self.batches.lock().await.push(batch.to_vec());
        Ok(batch.len() as u64)
    }
}

/// Sink that fails every write.
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
        json!({
            "type": "match",
            "trade_id": trade_id,
            "product_id": "BTC-USD",
            "price": "42000.01",
            "time": "2024-01-01T00:00:00Z",
        }),
    )
    .expect("match payloads always normalize")
}

fn trade_ids(batches: &[Vec<TradeEvent>]) -> Vec<u64> {
    batches
        .iter()
        .flatten()
        .map(|event| event.payload["trade_id"].as_u64().unwrap())
        .collect()
}

#[tokio::test]
async fn size_trigger_flushes_exactly_n_events_once() {
    let sink = RecordingSink::new();
    let stats = Arc::new(Stats::new());
    let buffer = TradeBuffer::new(Arc::clone(&sink) as Arc<dyn TradeSink>, stats.clone(), 5);

    for i in 0..5 {
        buffer.push(sample_event(i)).await;
    }

    let batches = sink.batches().await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 5);
    assert!(buffer.is_empty().await);
    assert_eq!(stats.snapshot().inserted, 5);
}

#[tokio::test]
async fn timer_tick_with_empty_buffer_writes_nothing() {
    let sink = RecordingSink::new();
    let stats = Arc::new(Stats::new());
    let buffer = Arc::new(TradeBuffer::new(
        Arc::clone(&sink) as Arc<dyn TradeSink>,
        stats,
        10,
    ));

    let cancel = CancellationToken::new();
    let timer_buffer = Arc::clone(&buffer);
    let timer_cancel = cancel.clone();
    let timer = tokio::spawn(async move {
        timer_buffer
            .run_flush_timer(Duration::from_millis(10), timer_cancel)
            .await;
    });

    tokio::time::sleep(Duration::from_millis(60)).await;
    cancel.cancel();
    timer.await.unwrap();

    assert!(sink.batches().await.is_empty());
}

#[tokio::test]
async fn timer_flushes_partial_accumulation() {
    let sink = RecordingSink::new();
    let stats = Arc::new(Stats::new());
    let buffer = Arc::new(TradeBuffer::new(
        Arc::clone(&sink) as Arc<dyn TradeSink>,
        stats.clone(),
        100,
    ));

    for i in 0..3 {
        buffer.push(sample_event(i)).await;
    }

    let cancel = CancellationToken::new();
    let timer_buffer = Arc::clone(&buffer);
    let timer_cancel = cancel.clone();
    let timer = tokio::spawn(async move {
        timer_buffer
            .run_flush_timer(Duration::from_millis(10), timer_cancel)
            .await;
    });

    tokio::time::sleep(Duration::from_millis(60)).await;
    cancel.cancel();
    timer.await.unwrap();

    let batches = sink.batches().await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 3);
    assert_eq!(stats.snapshot().inserted, 3);
    assert!(buffer.is_empty().await);
}

#[tokio::test]
async fn concurrent_triggers_never_duplicate_or_drop_events() {
    const TOTAL: u64 = 200;

    // A slow sink widens the window in which a timer tick could race the
    // size trigger.
    let sink = RecordingSink::with_delay(Duration::from_millis(2));
    let stats = Arc::new(Stats::new());
    let buffer = Arc::new(TradeBuffer::new(
        Arc::clone(&sink) as Arc<dyn TradeSink>,
        stats.clone(),
        10,
    ));

    let cancel = CancellationToken::new();
    let timer_buffer = Arc::clone(&buffer);
    let timer_cancel = cancel.clone();
    let timer = tokio::spawn(async move {
        timer_buffer
            .run_flush_timer(Duration::from_millis(1), timer_cancel)
            .await;
    });

    let producer_buffer = Arc::clone(&buffer);
    let producer = tokio::spawn(async move {
        for i in 0..TOTAL {
            producer_buffer.push(sample_event(i)).await;
            if i % 7 == 0 {
                tokio::task::yield_now().await;
            }
        }
    });

    producer.await.unwrap();
    cancel.cancel();
    timer.await.unwrap();
    buffer.flush(FlushTrigger::Shutdown).await;

    let batches = sink.batches().await;
    let ids = trade_ids(&batches);

    let unique: HashSet<u64> = ids.iter().copied().collect();
    assert_eq!(ids.len() as u64, TOTAL, "an event was flushed twice or lost");
    assert_eq!(unique.len() as u64, TOTAL, "duplicate events across batches");
    assert_eq!(stats.snapshot().inserted, TOTAL);
    assert!(buffer.is_empty().await);
}

#[tokio::test]
async fn events_stay_in_arrival_order_within_and_across_batches() {
    let sink = RecordingSink::new();
    let stats = Arc::new(Stats::new());
    let buffer = TradeBuffer::new(Arc::clone(&sink) as Arc<dyn TradeSink>, stats, 4);

    for i in 0..12 {
        buffer.push(sample_event(i)).await;
    }

    let batches = sink.batches().await;
    assert_eq!(batches.len(), 3);
    assert_eq!(trade_ids(&batches), (0..12).collect::<Vec<_>>());
}

#[tokio::test]
async fn failed_flush_counts_one_error_not_one_per_event() {
    let stats = Arc::new(Stats::new());
    let buffer = TradeBuffer::new(Arc::new(FailingSink), stats.clone(), 8);

    for i in 0..8 {
        buffer.push(sample_event(i)).await;
    }

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.errors, 1);
    assert_eq!(snapshot.inserted, 0);
    assert!(buffer.is_empty().await, "failed batch must be dropped");
}

#[tokio::test]
async fn buffer_keeps_working_after_a_failed_flush() {
    struct FlakySink {
        inner: Arc<RecordingSink>,
        fail_first: Mutex<bool>,
    }

    #[async_trait]
    impl TradeSink for FlakySink {
        async fn write_batch(&self, batch: &[TradeEvent]) -> Result<u64, SinkError> {
            let mut fail_first = self.fail_first.lock().await;
            if *fail_first {
                *fail_first = false;
                return Err(SinkError::Write("simulated outage".to_string()));
            }
            drop(fail_first);
            self.inner.write_batch(batch).await
        }
    }

    let recording = RecordingSink::new();
    let sink = Arc::new(FlakySink {
        inner: Arc::clone(&recording),
        fail_first: Mutex::new(true),
    });
    let stats = Arc::new(Stats::new());
    let buffer = TradeBuffer::new(sink, stats.clone(), 2);

    for i in 0..4 {
        buffer.push(sample_event(i)).await;
    }

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.errors, 1);
    assert_eq!(snapshot.inserted, 2);
    assert_eq!(trade_ids(&recording.batches().await), vec![2, 3]);
}

#[tokio::test]
async fn shutdown_flush_drains_partial_buffer_exactly_once() {
    let sink = RecordingSink::new();
    let stats = Arc::new(Stats::new());
    let buffer = TradeBuffer::new(Arc::clone(&sink) as Arc<dyn TradeSink>, stats.clone(), 100);

    for i in 0..7 {
        buffer.push(sample_event(i)).await;
    }

    buffer.flush(FlushTrigger::Shutdown).await;
    // A second shutdown flush must be a no-op.
    buffer.flush(FlushTrigger::Shutdown).await;

    let batches = sink.batches().await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 7);
    assert_eq!(stats.snapshot().inserted, 7);
}

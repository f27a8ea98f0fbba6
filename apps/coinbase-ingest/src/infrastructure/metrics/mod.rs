//! Prometheus Metrics
//!
//! Exposes pipeline metrics via the Prometheus exporter's built-in HTTP
//! listener. These mirror the process [`Stats`](crate::domain::stats::Stats)
//! counters (which feed the exit summary) and add flush timing detail.
//!
//! # Metrics Categories
//!
//! - **Trades**: accepted trade frames and committed rows
//! - **Errors**: malformed frames, transport failures, failed flushes
//! - **Connection**: reconnection attempts
//! - **Latency**: flush duration

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with its HTTP scrape listener.
///
/// A `port` of zero disables the exporter entirely; the `metrics` macros
/// then record into the void, which keeps call sites unconditional.
///
/// # Errors
///
/// Returns an error if the recorder or listener cannot be installed.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    if port == 0 {
        tracing::info!("Metrics exporter disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;

    register_metrics();
    tracing::info!(port, "Metrics exporter listening");
    Ok(())
}

fn register_metrics() {
    describe_counter!(
        "coinbase_ingest_trades_received_total",
        "Trade frames accepted from the feed"
    );
    describe_counter!(
        "coinbase_ingest_rows_inserted_total",
        "Rows committed to the bronze table"
    );
    describe_counter!(
        "coinbase_ingest_malformed_frames_total",
        "Frames dropped because they could not be decoded"
    );
    describe_counter!(
        "coinbase_ingest_transport_errors_total",
        "Feed connection losses and protocol failures"
    );
    describe_counter!(
        "coinbase_ingest_reconnects_total",
        "Feed reconnection attempts"
    );
    describe_counter!(
        "coinbase_ingest_flush_failures_total",
        "Batch writes that failed and were rolled back"
    );
    describe_histogram!(
        "coinbase_ingest_flush_duration_seconds",
        "Wall-clock duration of batch writes"
    );
}

/// Record one accepted trade frame.
pub fn record_trade_received() {
    counter!("coinbase_ingest_trades_received_total").increment(1);
}

/// Record rows committed by a successful flush.
pub fn record_rows_inserted(count: u64) {
    counter!("coinbase_ingest_rows_inserted_total").increment(count);
}

/// Record a frame dropped as undecodable.
pub fn record_malformed_frame() {
    counter!("coinbase_ingest_malformed_frames_total").increment(1);
}

/// Record a feed connection loss or protocol failure.
pub fn record_transport_error() {
    counter!("coinbase_ingest_transport_errors_total").increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("coinbase_ingest_reconnects_total").increment(1);
}

/// Record a failed batch write.
pub fn record_flush_failure() {
    counter!("coinbase_ingest_flush_failures_total").increment(1);
}

/// Record the duration of a batch write.
pub fn record_flush_duration(duration: Duration) {
    histogram!("coinbase_ingest_flush_duration_seconds").record(duration.as_secs_f64());
}

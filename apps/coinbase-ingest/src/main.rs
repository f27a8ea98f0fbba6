//! Coinbase Ingest Binary
//!
//! Starts the trade-feed ingestion pipeline.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin coinbase-ingest
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `COINBASE_WS_URL`: Feed endpoint (default: wss://ws-feed.exchange.coinbase.com)
//! - `COINBASE_PRODUCTS`: Comma-separated product list (default: BTC-USD,ETH-USD)
//! - `DATABASE_URL`: Destination connection URL; otherwise assembled from
//!   `PGHOST`, `PGPORT`, `PGDATABASE`, `PGUSER`, `PGPASSWORD`
//! - `BATCH_SIZE`: Events per flush (default: 100)
//! - `FLUSH_INTERVAL_SECONDS`: Maximum seconds between flushes (default: 5)
//! - `INGEST_KEEPALIVE_INTERVAL_SECS` / `INGEST_KEEPALIVE_TIMEOUT_SECS`: Session liveness (default: 20 / 20)
//! - `INGEST_RECONNECT_DELAY_INITIAL_SECS` / `_MAX_SECS` / `_MULTIPLIER` / `INGEST_RECONNECT_JITTER`:
//!   Backoff shape (default: 1 / 60 / 2.0 / 0.0)
//! - `INGEST_STATEMENT_TIMEOUT_SECS`: Bound on each batch write (default: 30)
//! - `INGEST_METRICS_PORT`: Prometheus scrape port, 0 disables (default: 9090)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use coinbase_ingest::{
    FeedClient, FeedClientConfig, FlushTrigger, IngestConfig, MATCHES_CHANNEL, PgBronzeSink, Stats,
    TradeBuffer, TradeSink, init_metrics, init_telemetry,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[allow(clippy::expect_used)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let _ = dotenvy::dotenv();

    init_telemetry();

    tracing::info!("Starting Coinbase bronze ingestion");

    let config = IngestConfig::from_env().context("configuration error")?;
    log_config(&config);

    init_metrics(config.metrics.port).context("failed to start metrics exporter")?;

    // The sink connection is the only startup-blocking failure: there is
    // nothing to ingest into without a working destination.
    let sink = Arc::new(
        PgBronzeSink::connect(&config.database)
            .await
            .context("could not connect to destination database")?,
    );

    let shutdown_token = CancellationToken::new();
    let stats = Arc::new(Stats::new());
    let buffer = Arc::new(TradeBuffer::new(
        Arc::clone(&sink) as Arc<dyn TradeSink>,
        Arc::clone(&stats),
        config.pipeline.batch_size,
    ));

    let client = Arc::new(FeedClient::new(
        FeedClientConfig {
            url: config.feed.url.clone(),
            product_ids: config.feed.product_ids.clone(),
            channel: MATCHES_CHANNEL.to_string(),
            reconnect: config.websocket.reconnect_config(),
            keepalive: config.websocket.keepalive_config(),
        },
        Arc::clone(&buffer),
        Arc::clone(&stats),
        shutdown_token.clone(),
    ));

    let client_handle = tokio::spawn(Arc::clone(&client).run());

    let timer_buffer = Arc::clone(&buffer);
    let timer_token = shutdown_token.clone();
    let flush_interval = config.pipeline.flush_interval;
    let timer_handle = tokio::spawn(async move {
        timer_buffer.run_flush_timer(flush_interval, timer_token).await;
    });

    tracing::info!("Ingestion pipeline ready");

    await_shutdown(shutdown_token).await;

    // Both loops observe the token; join them before the final flush so no
    // task can repopulate the buffer afterwards.
    if let Err(e) = client_handle.await {
        tracing::error!(error = %e, "Feed client task failed");
    }
    if let Err(e) = timer_handle.await {
        tracing::error!(error = %e, "Flush timer task failed");
    }

    buffer.flush(FlushTrigger::Shutdown).await;
    sink.close().await;

    let snapshot = stats.snapshot();
    tracing::info!(
        received = snapshot.received,
        inserted = snapshot.inserted,
        errors = snapshot.errors,
        "Final statistics"
    );

    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &IngestConfig) {
    tracing::info!(
        url = %config.feed.url,
        products = ?config.feed.product_ids,
        batch_size = config.pipeline.batch_size,
        flush_interval_secs = config.pipeline.flush_interval.as_secs(),
        db_host = %config.database.host,
        db_name = %config.database.dbname,
        metrics_port = config.metrics.port,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then request cooperative
/// termination.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}

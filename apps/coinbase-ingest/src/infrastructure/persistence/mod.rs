//! Bronze-Layer Persistence
//!
//! Postgres adapter for the `TradeSink` port. One flush is one transaction:
//! a multi-row insert into the raw-ingestion table that commits fully or not
//! at all. The adapter never retries; a failed write rolls back, surfaces as
//! a single [`SinkError::Write`], and the caller decides what to do across
//! flush cycles.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::application::ports::{SinkError, TradeSink};
use crate::domain::trade::TradeEvent;
use crate::infrastructure::config::DatabaseSettings;
use crate::infrastructure::metrics;

/// Flushes are serialized by the buffer lock, so the pool stays small: one
/// writer plus headroom for the final shutdown flush.
const MAX_CONNECTIONS: u32 = 2;

/// How long to wait for a pooled connection before failing the flush.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Postgres sink writing into `bronze.coinbase_trades_raw`.
pub struct PgBronzeSink {
    pool: PgPool,
}

impl PgBronzeSink {
    /// Connect to the destination database.
    ///
    /// Every pooled connection gets a `statement_timeout` so a wedged write
    /// degrades into a counted error instead of blocking shutdown. Failure
    /// here is the only fatal startup error: the process must not open the
    /// feed session without a working sink.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Connection`] when the pool cannot be
    /// established.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, SinkError> {
        let statement_timeout_ms = settings.statement_timeout.as_millis().to_string();
        let options = settings
            .connect_options()
            .map_err(|e| SinkError::Connection(e.to_string()))?
            .options([("statement_timeout", statement_timeout_ms.as_str())]);

        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| SinkError::Connection(e.to_string()))?;

        tracing::info!(
            host = %settings.host,
            dbname = %settings.dbname,
            statement_timeout_ms = %statement_timeout_ms,
            "Database connected"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool (used by tests and tooling).
    #[must_use]
    pub const fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Close the pool, waiting for in-flight connections to finish.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database connection closed");
    }

    async fn insert_batch(&self, batch: &[TradeEvent]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let rows = build_insert(batch).build().execute(&mut *tx).await?.rows_affected();
        tx.commit().await?;
        Ok(rows)
    }
}

/// Build the multi-row insert for one batch.
///
/// The payload binds as `JSONB` and the event timestamp as a nullable
/// `TIMESTAMPTZ`; values are bound in batch order, preserving arrival order
/// within the flush.
fn build_insert(batch: &[TradeEvent]) -> QueryBuilder<'_, Postgres> {
    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "INSERT INTO bronze.coinbase_trades_raw (channel, payload, payload_hash, event_ts) ",
    );

    builder.push_values(batch, |mut row, event| {
        row.push_bind(&event.channel)
            .push_bind(&event.payload)
            .push_bind(&event.fingerprint)
            .push_bind(event.event_time);
    });

    builder
}

#[async_trait]
impl TradeSink for PgBronzeSink {
    async fn write_batch(&self, batch: &[TradeEvent]) -> Result<u64, SinkError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();

        match self.insert_batch(batch).await {
            Ok(rows) => {
                metrics::record_rows_inserted(rows);
                metrics::record_flush_duration(started.elapsed());
                tracing::debug!(
                    rows,
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Batch committed"
                );
                Ok(rows)
            }
            Err(e) => {
                metrics::record_flush_failure();
                Err(SinkError::Write(e.to_string()))
            }
        }
    }
}

//! Port Interfaces
//!
//! Contracts between the ingestion services and external systems, following
//! the hexagonal layering: the flush scheduler only ever sees the
//! [`TradeSink`] port, never a concrete database client.

use async_trait::async_trait;

use crate::domain::trade::TradeEvent;

/// Errors surfaced by a sink implementation.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The storage connection could not be established.
    #[error("storage connection failed: {0}")]
    Connection(String),

    /// The batch write failed and was rolled back; no rows are visible.
    #[error("batch write failed: {0}")]
    Write(String),
}

/// Destination for normalized trade batches.
///
/// One call writes one batch atomically: either every event in the slice is
/// committed or none are. Implementations never retry internally; retry
/// policy, if any, belongs to the caller across flush cycles. The
/// destination accepts duplicate fingerprints — deduplication is advisory
/// for downstream consumers, not enforced on this path.
#[async_trait]
pub trait TradeSink: Send + Sync {
    /// Write a batch in a single transaction, returning the committed row
    /// count.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Write`] when the transaction fails for any
    /// reason; the write is rolled back and zero rows are visible.
    async fn write_batch(&self, batch: &[TradeEvent]) -> Result<u64, SinkError>;
}

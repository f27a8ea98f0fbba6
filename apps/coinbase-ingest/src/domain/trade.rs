//! Normalized Trade Records
//!
//! The canonical internal representation of one trade execution pulled from
//! the feed. The original message body is preserved verbatim so the silver
//! layer can re-parse typed fields without a second round trip to the
//! exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The logical feed channel this pipeline monitors.
pub const MATCHES_CHANNEL: &str = "matches";

/// A normalized trade event ready for persistence.
///
/// Created by the normalizer immediately after a frame is classified as a
/// trade execution; immutable afterwards. Owned by the buffer until it is
/// handed to the sink as part of a batch, then dropped once the write is
/// acknowledged or permanently fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Logical stream identifier (always [`MATCHES_CHANNEL`] today).
    pub channel: String,

    /// Original message body, untouched.
    pub payload: Value,

    /// Lowercase SHA-256 hex digest of the canonical payload serialization,
    /// used by downstream consumers for advisory deduplication.
    pub fingerprint: String,

    /// Domain timestamp embedded in the payload, when present and parseable.
    pub event_time: Option<DateTime<Utc>>,
}

//! Message Normalization
//!
//! Pure functions that turn an accepted feed payload into a [`TradeEvent`]:
//! classification by message type, canonical fingerprinting, and domain
//! timestamp extraction. No state, no I/O.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::trade::TradeEvent;

/// Message type carried by trade executions on the matches channel.
const TRADE_MESSAGE_TYPE: &str = "match";

/// Compute the deduplication fingerprint for a payload.
///
/// The digest is taken over the canonical serialization of the payload:
/// object keys sorted at every nesting level, no incidental whitespace.
/// `serde_json` maps are `BTreeMap`s (the `preserve_order` feature is not
/// enabled), so re-serializing the parsed value yields exactly that form.
/// Structurally equal payloads therefore hash identically regardless of the
/// field order the exchange happened to emit.
#[must_use]
pub fn fingerprint(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extract the domain timestamp from a payload.
///
/// Reads the `time` field and parses it as RFC 3339 (a trailing `Z` offset
/// designator is accepted). Returns `None` when the field is absent, not a
/// string, or unparsable; a missing timestamp is not an error and downstream
/// consumers tolerate it.
#[must_use]
pub fn event_time(payload: &Value) -> Option<DateTime<Utc>> {
    let raw = payload.get("time")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Normalize an accepted payload into a [`TradeEvent`].
///
/// Returns `None` for payloads whose declared `type` is not the monitored
/// trade type; everything else is fingerprinted and timestamped, with the
/// payload itself preserved verbatim.
#[must_use]
pub fn normalize(channel: &str, payload: Value) -> Option<TradeEvent> {
    if payload.get("type").and_then(Value::as_str) != Some(TRADE_MESSAGE_TYPE) {
        return None;
    }

    let fingerprint = fingerprint(&payload);
    let event_time = event_time(&payload);

    Some(TradeEvent {
        channel: channel.to_string(),
        payload,
        fingerprint,
        event_time,
    })
}

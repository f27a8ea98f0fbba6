//! Feed Frame Codec
//!
//! Decodes text frames from the feed into classified messages, dispatching
//! on the `type` discriminator every feed frame carries. Trade executions
//! keep their payload as raw JSON; only control frames get typed structs.

use serde_json::Value;

use super::messages::{FeedErrorMessage, SubscriptionsMessage};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame decoded but is not a JSON object.
    #[error("frame is not a JSON object")]
    NotAnObject,
}

/// A classified feed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// Subscription acknowledgment.
    Subscriptions(SubscriptionsMessage),

    /// Error frame.
    Error(FeedErrorMessage),

    /// Trade execution; the payload is preserved verbatim for persistence.
    Match(Value),

    /// Any other frame type; discarded silently by the client.
    Other,
}

/// JSON codec for the exchange feed.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode and classify one text frame.
    ///
    /// Frames without a string `type` field classify as [`FeedMessage::Other`];
    /// the feed contract guarantees a discriminator on every well-formed frame,
    /// so anything else is simply not for us.
    ///
    /// # Errors
    ///
    /// Returns an error when the frame is not valid JSON or not an object.
    pub fn decode(&self, text: &str) -> Result<FeedMessage, CodecError> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(CodecError::NotAnObject);
        }

        match value.get("type").and_then(Value::as_str) {
            Some("subscriptions") => Ok(FeedMessage::Subscriptions(serde_json::from_value(value)?)),
            Some("error") => Ok(FeedMessage::Error(serde_json::from_value(value)?)),
            Some("match") => Ok(FeedMessage::Match(value)),
            _ => Ok(FeedMessage::Other),
        }
    }

    /// Encode a value to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }
}

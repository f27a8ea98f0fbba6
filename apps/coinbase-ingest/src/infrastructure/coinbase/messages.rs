//! Coinbase Feed Message Types
//!
//! Wire format types for the exchange WebSocket feed. Subscription control
//! frames are fully typed; `match` payloads deliberately stay as raw JSON
//! because the bronze layer persists them verbatim.
//!
//! # References
//!
//! - [Exchange WebSocket Overview](https://docs.cdp.coinbase.com/exchange/docs/websocket-overview)
//! - [Channels](https://docs.cdp.coinbase.com/exchange/docs/websocket-channels)

use serde::{Deserialize, Serialize};

/// Subscription request sent immediately after the socket opens.
///
/// # Wire Format (JSON)
/// ```json
/// {"type":"subscribe","product_ids":["BTC-USD","ETH-USD"],"channels":["matches"]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Message type (always "subscribe").
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Products to monitor.
    pub product_ids: Vec<String>,

    /// Channels to subscribe to.
    pub channels: Vec<String>,
}

impl SubscribeRequest {
    /// Create a subscribe request for one channel and a set of products.
    #[must_use]
    pub fn new(product_ids: Vec<String>, channel: &str) -> Self {
        Self {
            msg_type: "subscribe".to_string(),
            product_ids,
            channels: vec![channel.to_string()],
        }
    }
}

/// Per-channel portion of a subscription acknowledgment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSubscription {
    /// Channel name.
    pub name: String,

    /// Products confirmed for this channel.
    #[serde(default)]
    pub product_ids: Vec<String>,
}

/// Subscription acknowledgment.
///
/// The feed replies to a subscribe request with the full set of active
/// subscriptions. Frames received before this acknowledgment are not
/// guaranteed well-formed and are discarded.
///
/// # Wire Format (JSON)
/// ```json
/// {"type":"subscriptions","channels":[{"name":"matches","product_ids":["BTC-USD"]}]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionsMessage {
    /// Active channel subscriptions.
    #[serde(default)]
    pub channels: Vec<ChannelSubscription>,
}

impl SubscriptionsMessage {
    /// Product identifiers confirmed for the named channel.
    #[must_use]
    pub fn products_for(&self, channel: &str) -> Vec<String> {
        self.channels
            .iter()
            .filter(|sub| sub.name == channel)
            .flat_map(|sub| sub.product_ids.iter().cloned())
            .collect()
    }
}

/// Error frame from the feed.
///
/// # Wire Format (JSON)
/// ```json
/// {"type":"error","message":"Failed to subscribe","reason":"product not found"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedErrorMessage {
    /// Human-readable error description.
    pub message: String,

    /// Optional machine-readable reason.
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_request_wire_shape() {
        let request = SubscribeRequest::new(
            vec!["BTC-USD".to_string(), "ETH-USD".to_string()],
            "matches",
        );

        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"type":"subscribe","product_ids":["BTC-USD","ETH-USD"],"channels":["matches"]}"#
        );
    }

    #[test]
    fn subscriptions_ack_deserializes() {
        let json = r#"{"type":"subscriptions","channels":[{"name":"matches","product_ids":["BTC-USD"]}]}"#;
        let ack: SubscriptionsMessage = serde_json::from_str(json).unwrap();

        assert_eq!(ack.channels.len(), 1);
        assert_eq!(ack.products_for("matches"), vec!["BTC-USD"]);
        assert!(ack.products_for("ticker").is_empty());
    }

    #[test]
    fn subscriptions_ack_tolerates_missing_channels() {
        let ack: SubscriptionsMessage = serde_json::from_str(r#"{"type":"subscriptions"}"#).unwrap();
        assert!(ack.channels.is_empty());
    }

    #[test]
    fn error_message_with_and_without_reason() {
        let with: FeedErrorMessage = serde_json::from_str(
            r#"{"type":"error","message":"Failed to subscribe","reason":"bad product"}"#,
        )
        .unwrap();
        assert_eq!(with.reason.as_deref(), Some("bad product"));

        let without: FeedErrorMessage =
            serde_json::from_str(r#"{"type":"error","message":"oops"}"#).unwrap();
        assert!(without.reason.is_none());
    }
}

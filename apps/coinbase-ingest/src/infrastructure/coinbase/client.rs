//! Feed Client
//!
//! Owns the WebSocket session lifecycle: connect, subscribe, receive loop,
//! exponential-backoff reconnection, and clean teardown on shutdown. Every
//! accepted trade frame is normalized and handed to the buffer in arrival
//! order; everything else is discarded.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::codec::{CodecError, FeedMessage, JsonCodec};
use super::keepalive::{KeepaliveConfig, KeepaliveState};
use super::messages::SubscribeRequest;
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::services::buffer::TradeBuffer;
use crate::domain::normalize::normalize;
use crate::domain::stats::Stats;
use crate::infrastructure::metrics;

/// How often to emit a progress line, in accepted trade frames.
const STATS_LOG_INTERVAL: u64 = 100;

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle of the feed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session; waiting to connect or backing off.
    Disconnected,
    /// Handshake and subscription request in flight.
    Connecting,
    /// Subscription acknowledged; frames are being processed.
    Subscribed,
    /// Shutdown requested; draining the session.
    Closing,
}

impl ConnectionState {
    /// Label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::Closing => "closing",
        }
    }
}

// =============================================================================
// Error Type
// =============================================================================

/// Errors that tear down one feed session (and trigger reconnection).
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Codec error on an outbound control frame.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The feed rejected the subscription request.
    #[error("feed rejected subscription: {0}")]
    SubscriptionRejected(String),

    /// No pong within the keepalive deadline.
    #[error("keepalive timeout")]
    KeepaliveTimeout,

    /// The server closed the connection or the stream ended.
    #[error("connection closed")]
    ConnectionClosed,
}

// =============================================================================
// Feed Client
// =============================================================================

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Products to subscribe to.
    pub product_ids: Vec<String>,
    /// Channel to subscribe to.
    pub channel: String,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Keepalive configuration.
    pub keepalive: KeepaliveConfig,
}

/// WebSocket client that streams trade executions into the buffer.
///
/// Manages the connection lifecycle: subscription, keepalive monitoring,
/// and automatic reconnection with exponential backoff. Only a shutdown
/// request terminates the loop; connection loss never does.
pub struct FeedClient {
    config: FeedClientConfig,
    codec: JsonCodec,
    buffer: Arc<TradeBuffer>,
    stats: Arc<Stats>,
    cancel: CancellationToken,
    state: parking_lot::RwLock<ConnectionState>,
}

impl FeedClient {
    /// Create a new feed client.
    #[must_use]
    pub fn new(
        config: FeedClientConfig,
        buffer: Arc<TradeBuffer>,
        stats: Arc<Stats>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            codec: JsonCodec::new(),
            buffer,
            stats,
            cancel,
            state: parking_lot::RwLock::new(ConnectionState::Disconnected),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write();
        if *state != next {
            tracing::info!(from = state.as_str(), to = next.as_str(), "Feed state changed");
            *state = next;
        }
    }

    /// Run the feed connection loop until cancelled.
    ///
    /// Connection losses and transport errors are counted, logged, and
    /// retried with exponential backoff (1s doubling to a 60s ceiling,
    /// reset on every successful subscription). The loop only exits on
    /// shutdown.
    pub async fn run(self: Arc<Self>) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                self.set_state(ConnectionState::Disconnected);
                tracing::info!("Feed client cancelled");
                return;
            }

            self.set_state(ConnectionState::Connecting);

            match self.connect_and_run(&mut policy).await {
                Ok(()) => {
                    // Only cancellation ends a session cleanly.
                    self.set_state(ConnectionState::Disconnected);
                    tracing::info!("Feed session closed");
                    return;
                }
                Err(e) => {
                    self.stats.record_error();
                    metrics::record_transport_error();
                    self.set_state(ConnectionState::Disconnected);

                    let delay = policy.next_delay();
                    metrics::record_reconnect();
                    tracing::warn!(
                        error = %e,
                        attempt = policy.attempt_count(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Feed connection lost; reconnecting"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            self.set_state(ConnectionState::Disconnected);
                            tracing::info!("Feed client cancelled during reconnect delay");
                            return;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Connect, subscribe, and process frames until an error or cancellation.
    async fn connect_and_run(&self, policy: &mut ReconnectPolicy) -> Result<(), FeedError> {
        tracing::info!(url = %self.config.url, "Connecting to feed");

        let (ws_stream, _response) = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            connected = tokio_tungstenite::connect_async(&self.config.url) => connected?,
        };

        let (mut write, mut read) = ws_stream.split();

        // Subscribe before anything else; frames received before the
        // acknowledgment are not guaranteed well-formed.
        let request = SubscribeRequest::new(self.config.product_ids.clone(), &self.config.channel);
        let json = self.codec.encode(&request)?;
        write.send(Message::Text(json.into())).await?;

        let mut keepalive = KeepaliveState::new();
        let ping_start = tokio::time::Instant::now() + self.config.keepalive.ping_interval;
        let mut ping_interval =
            tokio::time::interval_at(ping_start, self.config.keepalive.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut subscribed = false;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    self.set_state(ConnectionState::Closing);
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                _ = ping_interval.tick() => {
                    if keepalive.timed_out(self.config.keepalive.pong_timeout) {
                        return Err(FeedError::KeepaliveTimeout);
                    }
                    keepalive.mark_ping_sent();
                    write.send(Message::Ping(Vec::new().into())).await?;
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_frame(&text, &mut subscribed, policy).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            keepalive.record_pong();
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Server sent close frame");
                            return Err(FeedError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {
                            // Binary frames are not part of the feed contract.
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            tracing::info!("WebSocket stream ended");
                            return Err(FeedError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Handle one text frame from the feed.
    async fn handle_text_frame(
        &self,
        text: &str,
        subscribed: &mut bool,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), FeedError> {
        let message = match self.codec.decode(text) {
            Ok(message) => message,
            Err(e) => {
                // Malformed frames are counted and dropped; they do not
                // tear down the session.
                self.stats.record_error();
                metrics::record_malformed_frame();
                tracing::warn!(error = %e, "Dropping undecodable frame");
                return Ok(());
            }
        };

        match message {
            FeedMessage::Subscriptions(ack) => {
                *subscribed = true;
                policy.reset();
                self.set_state(ConnectionState::Subscribed);
                tracing::info!(
                    products = ?ack.products_for(&self.config.channel),
                    channel = %self.config.channel,
                    "Subscription confirmed"
                );
            }
            FeedMessage::Error(err) if !*subscribed => {
                return Err(FeedError::SubscriptionRejected(err.message));
            }
            FeedMessage::Error(err) => {
                self.stats.record_error();
                tracing::error!(message = %err.message, reason = ?err.reason, "Feed error");
            }
            FeedMessage::Match(payload) if *subscribed => {
                if let Some(event) = normalize(&self.config.channel, payload) {
                    let received = self.stats.record_received();
                    metrics::record_trade_received();

                    self.buffer.push(event).await;

                    if received % STATS_LOG_INTERVAL == 0 {
                        let snapshot = self.stats.snapshot();
                        tracing::info!(
                            received = snapshot.received,
                            inserted = snapshot.inserted,
                            errors = snapshot.errors,
                            "Ingestion progress"
                        );
                    }
                }
            }
            FeedMessage::Match(_) | FeedMessage::Other => {
                // Pre-acknowledgment frames and unmonitored types are
                // discarded silently.
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_labels() {
        assert_eq!(ConnectionState::Disconnected.as_str(), "disconnected");
        assert_eq!(ConnectionState::Connecting.as_str(), "connecting");
        assert_eq!(ConnectionState::Subscribed.as_str(), "subscribed");
        assert_eq!(ConnectionState::Closing.as_str(), "closing");
    }

    #[test]
    fn client_starts_disconnected() {
        let stats = Arc::new(Stats::new());
        let buffer = Arc::new(TradeBuffer::new(
            Arc::new(NullSink),
            Arc::clone(&stats),
            10,
        ));
        let client = FeedClient::new(
            FeedClientConfig {
                url: "ws://127.0.0.1:1".to_string(),
                product_ids: vec!["BTC-USD".to_string()],
                channel: "matches".to_string(),
                reconnect: ReconnectConfig::default(),
                keepalive: KeepaliveConfig::default(),
            },
            buffer,
            stats,
            CancellationToken::new(),
        );

        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    struct NullSink;

    #[async_trait::async_trait]
    impl crate::application::ports::TradeSink for NullSink {
        async fn write_batch(
            &self,
            batch: &[crate::domain::trade::TradeEvent],
        ) -> Result<u64, crate::application::ports::SinkError> {
            Ok(batch.len() as u64)
        }
    }
}

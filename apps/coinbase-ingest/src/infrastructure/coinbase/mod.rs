//! Coinbase Feed Infrastructure
//!
//! Everything needed to hold a live subscription to the exchange WebSocket
//! feed: wire message types, the frame codec, the reconnect backoff policy,
//! keepalive probing, and the connection-owning client.

/// The connection-owning feed client.
pub mod client;

/// Frame decoding and classification.
pub mod codec;

/// Keepalive probing for session liveness.
pub mod keepalive;

/// Wire message types.
pub mod messages;

/// Exponential-backoff reconnection policy.
pub mod reconnect;

//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application-layer ports plus the
//! process-edge concerns: the feed WebSocket client, the Postgres sink,
//! configuration loading, metrics, and tracing setup.

/// Coinbase exchange WebSocket feed client.
pub mod coinbase;

/// Environment-sourced configuration.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Postgres bronze-layer sink.
pub mod persistence;

/// Tracing subscriber setup.
pub mod telemetry;

//! Application Layer - Ingestion services and port definitions.
//!
//! The buffering and flush-scheduling logic lives here, talking to durable
//! storage only through the `TradeSink` port so that adapters (and test
//! doubles) are interchangeable.

/// Port interfaces implemented by infrastructure adapters.
pub mod ports;

/// Buffering and flush scheduling.
pub mod services;

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::cast_possible_truncation,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Coinbase Ingest - Bronze Layer Streaming Pipeline
//!
//! Streams real-time trade ("match") events from the Coinbase exchange
//! public WebSocket feed into the bronze raw-ingestion table in Postgres,
//! with batch inserts, payload fingerprinting for downstream deduplication,
//! automatic reconnection, and graceful shutdown.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and logic
//!   - `trade`: the normalized trade record
//!   - `normalize`: fingerprinting and timestamp extraction
//!   - `stats`: atomic ingestion counters
//!
//! - **Application**: Services and port definitions
//!   - `ports`: the `TradeSink` contract the scheduler writes through
//!   - `services::buffer`: dual-trigger accumulation and flush scheduling
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `coinbase`: WebSocket feed client with reconnect and keepalive
//!   - `persistence`: Postgres bronze-layer sink
//!   - `config`: environment-sourced settings
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: tracing setup
//!
//! # Data Flow
//!
//! ```text
//! Coinbase WS ──► FeedClient ──► normalize ──► TradeBuffer ──► PgBronzeSink ──► bronze.coinbase_trades_raw
//!                                                  ▲
//!                                  flush timer / shutdown flush
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Pure trade ingestion types and logic.
pub mod domain;

/// Application layer - Ingestion services and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::normalize::{event_time, fingerprint, normalize};
pub use domain::stats::{Stats, StatsSnapshot};
pub use domain::trade::{MATCHES_CHANNEL, TradeEvent};

// Application services and ports
pub use application::ports::{SinkError, TradeSink};
pub use application::services::buffer::{FlushTrigger, TradeBuffer};

// Feed client
pub use infrastructure::coinbase::client::{
    ConnectionState, FeedClient, FeedClientConfig, FeedError,
};
pub use infrastructure::coinbase::keepalive::KeepaliveConfig;
pub use infrastructure::coinbase::reconnect::{ReconnectConfig, ReconnectPolicy};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, DatabaseSettings, FeedSettings, IngestConfig, MetricsSettings, PipelineSettings,
    WebSocketSettings,
};

// Persistence
pub use infrastructure::persistence::PgBronzeSink;

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::init as init_telemetry;

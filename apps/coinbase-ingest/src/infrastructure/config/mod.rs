//! Configuration
//!
//! Environment-sourced settings for the ingestion pipeline.

mod settings;

pub use settings::{
    ConfigError, DatabaseSettings, FeedSettings, IngestConfig, MetricsSettings, PipelineSettings,
    WebSocketSettings,
};

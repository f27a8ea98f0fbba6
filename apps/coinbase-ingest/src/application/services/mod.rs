//! Ingestion Services
//!
//! Application services wired between the feed client and the sink port.

/// Trade accumulation and dual-trigger flush scheduling.
pub mod buffer;

//! Ingest Configuration Settings
//!
//! Configuration types for the ingestion pipeline, loaded from environment
//! variables. Every setting has a default; a value that is present but
//! unparsable is a fatal configuration error rather than a silent fallback.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

use crate::infrastructure::coinbase::keepalive::KeepaliveConfig;
use crate::infrastructure::coinbase::reconnect::ReconnectConfig;

const DEFAULT_WS_URL: &str = "wss://ws-feed.exchange.coinbase.com";
const DEFAULT_PRODUCTS: &str = "BTC-USD,ETH-USD";

/// Feed endpoint and product set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Products to subscribe to.
    pub product_ids: Vec<String>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            product_ids: vec!["BTC-USD".to_string(), "ETH-USD".to_string()],
        }
    }
}

/// Batch accumulation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Flush once this many events have accumulated.
    pub batch_size: usize,
    /// Flush at least this often regardless of batch size.
    pub flush_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval: Duration::from_secs(5),
        }
    }
}

/// WebSocket session settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebSocketSettings {
    /// Keepalive ping interval.
    pub keepalive_interval: Duration,
    /// Keepalive pong deadline before the connection counts as dead.
    pub keepalive_timeout: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Jitter fraction applied to reconnection delays.
    pub reconnect_jitter: f64,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(20),
            keepalive_timeout: Duration::from_secs(20),
            reconnect_delay_initial: Duration::from_secs(1),
            reconnect_delay_max: Duration::from_secs(60),
            reconnect_delay_multiplier: 2.0,
            reconnect_jitter: 0.0,
        }
    }
}

impl WebSocketSettings {
    /// Build the reconnect policy configuration.
    #[must_use]
    pub const fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: self.reconnect_delay_initial,
            max_delay: self.reconnect_delay_max,
            multiplier: self.reconnect_delay_multiplier,
            jitter_factor: self.reconnect_jitter,
        }
    }

    /// Build the keepalive configuration.
    #[must_use]
    pub const fn keepalive_config(&self) -> KeepaliveConfig {
        KeepaliveConfig {
            ping_interval: self.keepalive_interval,
            pong_timeout: self.keepalive_timeout,
        }
    }
}

/// Destination database settings.
///
/// `DATABASE_URL` wins when set; otherwise the connection is assembled from
/// the conventional `PG*` variables.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// Full connection URL, when provided.
    pub url: Option<String>,
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database name.
    pub dbname: String,
    /// Database user.
    pub user: String,
    /// Database password.
    pub password: String,
    /// Per-statement execution bound applied to every pooled connection.
    pub statement_timeout: Duration,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            dbname: "crypto_dw".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            statement_timeout: Duration::from_secs(30),
        }
    }
}

impl DatabaseSettings {
    /// Build sqlx connection options.
    ///
    /// # Errors
    ///
    /// Returns an error when `DATABASE_URL` is set but unparsable.
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        match &self.url {
            Some(url) => url.parse(),
            None => Ok(PgConnectOptions::new()
                .host(&self.host)
                .port(self.port)
                .database(&self.dbname)
                .username(&self.user)
                .password(&self.password)),
        }
    }
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSettings {
    /// Prometheus scrape port (0 = disabled).
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self { port: 9090 }
    }
}

/// Complete ingestion configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestConfig {
    /// Feed endpoint and product set.
    pub feed: FeedSettings,
    /// Destination database settings.
    pub database: DatabaseSettings,
    /// Batch accumulation settings.
    pub pipeline: PipelineSettings,
    /// WebSocket session settings.
    pub websocket: WebSocketSettings,
    /// Metrics exporter settings.
    pub metrics: MetricsSettings,
}

impl IngestConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but unparsable, or when a
    /// parsed value is out of range (zero batch size or flush interval,
    /// empty product list).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let feed = FeedSettings {
            url: env_string("COINBASE_WS_URL").unwrap_or(defaults.feed.url),
            product_ids: parse_products(
                &env_string("COINBASE_PRODUCTS").unwrap_or_else(|| DEFAULT_PRODUCTS.to_string()),
            )?,
        };

        let database = DatabaseSettings {
            url: env_string("DATABASE_URL"),
            host: env_string("PGHOST").unwrap_or(defaults.database.host),
            port: parse_env("PGPORT")?.unwrap_or(defaults.database.port),
            dbname: env_string("PGDATABASE").unwrap_or(defaults.database.dbname),
            user: env_string("PGUSER").unwrap_or(defaults.database.user),
            password: env_string("PGPASSWORD").unwrap_or(defaults.database.password),
            statement_timeout: parse_env_duration_secs("INGEST_STATEMENT_TIMEOUT_SECS")?
                .unwrap_or(defaults.database.statement_timeout),
        };

        let batch_size: usize = parse_env("BATCH_SIZE")?.unwrap_or(defaults.pipeline.batch_size);
        if batch_size == 0 {
            return Err(ConfigError::OutOfRange {
                key: "BATCH_SIZE",
                reason: "must be at least 1",
            });
        }

        let flush_interval = parse_env_duration_secs("FLUSH_INTERVAL_SECONDS")?
            .unwrap_or(defaults.pipeline.flush_interval);
        if flush_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                key: "FLUSH_INTERVAL_SECONDS",
                reason: "must be at least 1 second",
            });
        }

        let websocket = WebSocketSettings {
            keepalive_interval: parse_env_duration_secs("INGEST_KEEPALIVE_INTERVAL_SECS")?
                .unwrap_or(defaults.websocket.keepalive_interval),
            keepalive_timeout: parse_env_duration_secs("INGEST_KEEPALIVE_TIMEOUT_SECS")?
                .unwrap_or(defaults.websocket.keepalive_timeout),
            reconnect_delay_initial: parse_env_duration_secs("INGEST_RECONNECT_DELAY_INITIAL_SECS")?
                .unwrap_or(defaults.websocket.reconnect_delay_initial),
            reconnect_delay_max: parse_env_duration_secs("INGEST_RECONNECT_DELAY_MAX_SECS")?
                .unwrap_or(defaults.websocket.reconnect_delay_max),
            reconnect_delay_multiplier: parse_env("INGEST_RECONNECT_DELAY_MULTIPLIER")?
                .unwrap_or(defaults.websocket.reconnect_delay_multiplier),
            reconnect_jitter: parse_env("INGEST_RECONNECT_JITTER")?
                .unwrap_or(defaults.websocket.reconnect_jitter),
        };
        if websocket.keepalive_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                key: "INGEST_KEEPALIVE_INTERVAL_SECS",
                reason: "must be at least 1 second",
            });
        }

        let metrics = MetricsSettings {
            port: parse_env("INGEST_METRICS_PORT")?.unwrap_or(defaults.metrics.port),
        };

        Ok(Self {
            feed,
            database,
            pipeline: PipelineSettings {
                batch_size,
                flush_interval,
            },
            websocket,
            metrics,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable is present but unparsable.
    #[error("invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// The offending raw value.
        value: String,
    },

    /// A parsed value is outside its valid range.
    #[error("{key} {reason}")]
    OutOfRange {
        /// Variable name.
        key: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env_string(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(None),
    }
}

fn parse_env_duration_secs(key: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_env::<u64>(key)?.map(Duration::from_secs))
}

fn parse_products(raw: &str) -> Result<Vec<String>, ConfigError> {
    let products: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|product| !product.is_empty())
        .map(ToString::to_string)
        .collect();

    if products.is_empty() {
        return Err(ConfigError::OutOfRange {
            key: "COINBASE_PRODUCTS",
            reason: "must name at least one product",
        });
    }

    Ok(products)
}

//! Configuration for Tidings

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TidingsConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// How long shutdown waits for in-flight deliveries
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_shutdown_grace() -> u64 {
    30
}

impl Default for TidingsConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            dispatcher: DispatcherConfig::default(),
            events: EventsConfig::default(),
            logging: LoggingConfig::default(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl TidingsConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::InternalError(format!("Failed to read config: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::Error::InternalError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("TIDINGS_BIND_ADDRESS") {
            config.server.bind_address = addr;
        }
        if let Some(port) = env_parse("TIDINGS_PORT") {
            config.server.port = port;
        }
        if let Ok(backend) = std::env::var("TIDINGS_STORE_BACKEND") {
            config.store.backend = backend;
        }
        if let Ok(url) = std::env::var("TIDINGS_DATABASE_URL") {
            config.store.database_url = url;
        }
        if let Some(concurrency) = env_parse("TIDINGS_DISPATCH_CONCURRENCY") {
            config.dispatcher.max_concurrent_deliveries = concurrency;
        }
        if let Some(attempts) = env_parse("TIDINGS_RETRY_MAX_ATTEMPTS") {
            config.dispatcher.retry.max_attempts = attempts;
        }
        if let Ok(region) = std::env::var("TIDINGS_REGION") {
            config.events.region = region;
        }
        if let Ok(level) = std::env::var("TIDINGS_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("TIDINGS_LOG_FORMAT") {
            config.logging.format = format;
        }

        config
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.store.validate()?;
        self.dispatcher.validate()?;
        self.logging.validate()
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn invalid(message: impl Into<String>) -> crate::Error {
    crate::Error::InvalidConfiguration(message.into())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 9400,
        }
    }
}

/// Backing store for notification configurations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// "memory" or "sqlite"
    pub backend: String,
    pub database_url: String,
    pub max_connections: u32,
    /// Upper bound for a single store operation
    pub timeout_secs: u64,
    /// How many buckets without a configuration the cache remembers
    pub absent_cache_entries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            database_url: "sqlite:///data/tidings/tidings.db?mode=rwc".to_string(),
            max_connections: 16,
            timeout_secs: 10,
            absent_cache_entries: 4096,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> crate::Result<()> {
        match self.backend.as_str() {
            "memory" | "sqlite" => {}
            other => return Err(invalid(format!("unknown store backend '{}'", other))),
        }
        if self.timeout_secs == 0 {
            return Err(invalid("store.timeout_secs must be greater than zero"));
        }
        if self.backend == "sqlite" && self.database_url.is_empty() {
            return Err(invalid("store.database_url is required for the sqlite backend"));
        }
        Ok(())
    }
}

/// Webhook delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Deliveries running at the same time
    pub max_concurrent_deliveries: usize,
    /// Deliveries waiting to start before new ones are dropped
    pub queue_capacity: usize,
    /// Per-attempt HTTP timeout
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub retry: RetryConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_deliveries: 16,
            queue_capacity: 10_000,
            request_timeout_secs: 10,
            user_agent: format!("tidings/{}", crate::VERSION),
            retry: RetryConfig::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_concurrent_deliveries == 0 {
            return Err(invalid("dispatcher.max_concurrent_deliveries must be greater than zero"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("dispatcher.queue_capacity must be greater than zero"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("dispatcher.request_timeout_secs must be greater than zero"));
        }
        self.retry.validate()
    }
}

/// Retry schedule for failed deliveries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction of the delay randomized in both directions (0.0 - 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_attempts == 0 {
            return Err(invalid("dispatcher.retry.max_attempts must be at least 1"));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(invalid(
                "dispatcher.retry.base_delay_ms must not exceed max_delay_ms",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(invalid("dispatcher.retry.jitter_factor must be within 0.0..=1.0"));
        }
        Ok(())
    }
}

/// Constants stamped into every event record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub region: String,
    pub event_source: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            region: crate::DEFAULT_REGION.to_string(),
            event_source: crate::EVENT_SOURCE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> crate::Result<()> {
        match self.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(invalid(format!("unknown log format '{}'", other))),
        }
    }
}

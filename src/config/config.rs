use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Broker connection configuration shared by the three staking queues.
///
/// The same address and credentials are used to open the active staking,
/// unbonding and withdraw queues.
#[derive(Debug, Deserialize, Clone)]
pub struct QueueSettings {
    /// Comma-separated list of broker addresses (e.g., "localhost:9092")
    #[serde(default = "default_queue_url")]
    pub url: String,
    /// SASL user. Empty means an unauthenticated connection.
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Upper bound for verifying a queue exists when it is opened.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Upper bound for flushing pending messages when a queue is stopped.
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
}

fn default_queue_url() -> String {
    "localhost:9092".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_flush_timeout_ms() -> u64 {
    5_000
}

impl QueueSettings {
    pub fn new(url: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            password: password.into(),
            connect_timeout_ms: default_connect_timeout_ms(),
            flush_timeout_ms: default_flush_timeout_ms(),
        }
    }
}

/// Root application configuration.
///
/// Loaded from `config.{yaml,toml,json}` at startup, with
/// `STAKING_QUEUE__QUEUE__URL`-style environment overrides.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub queue: QueueSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("STAKING_QUEUE").separator("__"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}

//! TOML configuration
//!
//! One file, three sections. Only `[broker] url` is required; everything
//! else has defaults matching the reference deployment (a single room
//! sensor publishing every 20 seconds).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub broker: BrokerSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
    #[serde(default)]
    pub subscriptions: SubscriptionSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// Broker endpoint as `mqtt://host[:port]`; port defaults to 1883.
    pub url: String,
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Upper bound on the ConnAck wait for a single connect attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Pause between failed connect attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    #[serde(default = "default_telemetry_topic")]
    pub topic: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Simulated sensor range, inclusive on both ends.
    #[serde(default = "default_min_value")]
    pub min_value: f64,
    #[serde(default = "default_max_value")]
    pub max_value: f64,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            topic: default_telemetry_topic(),
            interval_ms: default_interval_ms(),
            min_value: default_min_value(),
            max_value: default_max_value(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionSection {
    #[serde(default = "default_subscription_topics")]
    pub topics: Vec<String>,
}

impl Default for SubscriptionSection {
    fn default() -> Self {
        Self {
            topics: default_subscription_topics(),
        }
    }
}

fn default_client_id_prefix() -> String {
    "homelink".to_string()
}

fn default_keep_alive_secs() -> u64 {
    15
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

fn default_telemetry_topic() -> String {
    "home/room1/temperature".to_string()
}

fn default_interval_ms() -> u64 {
    20_000
}

fn default_min_value() -> f64 {
    20.0
}

fn default_max_value() -> f64 {
    30.0
}

fn default_subscription_topics() -> Vec<String> {
    vec!["home/messages".to_string()]
}

/// Host/port pair extracted from the broker URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
}

impl BrokerSection {
    pub fn endpoint(&self) -> Result<BrokerEndpoint, ConfigError> {
        let url = Url::parse(&self.url)
            .map_err(|_| ConfigError::InvalidBrokerUrl(self.url.clone()))?;
        if url.scheme() != "mqtt" {
            // TLS endpoints are out of scope.
            return Err(ConfigError::InvalidBrokerUrl(self.url.clone()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidBrokerUrl(self.url.clone()))?
            .to_string();
        let port = url.port().unwrap_or(1883);
        Ok(BrokerEndpoint { host, port })
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.broker.endpoint()?;
        if self.broker.retry_delay_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "broker.retry_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.telemetry.interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "telemetry.interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.telemetry.min_value >= self.telemetry.max_value {
            return Err(ConfigError::InvalidConfig(
                "telemetry.min_value must be below telemetry.max_value".to_string(),
            ));
        }
        if self.subscriptions.topics.iter().any(|t| t.is_empty()) {
            return Err(ConfigError::InvalidConfig(
                "subscriptions.topics must not contain empty topics".to_string(),
            ));
        }
        Ok(())
    }
}

//! Configuration for the Synheart Synchrony engine.
//!
//! Configuration is fixed at process start. It is read from a JSON file in the
//! user's config directory (falling back to defaults) and can be overridden
//! from the command line.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host to receive samples on
    pub listen_host: String,

    /// Port to receive samples on (0 for an ephemeral port)
    pub listen_port: u16,

    /// Recipients of the similarity messages, in send order
    pub destinations: Vec<Destination>,

    /// First address segment of inbound and outbound messages
    pub namespace: String,

    /// Maximum number of subjects tracked
    pub max_subjects: usize,

    /// Number of ticks of history kept per subject
    pub window_depth: usize,

    /// Interval between synchrony computations
    #[serde(with = "duration_serde")]
    pub tick_interval: Duration,

    /// EMA smoothing factor in (0, 1]; large means short memory
    pub alpha: f64,

    /// Subtract each subject's baseline before windowing
    pub centered: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_host: "127.0.0.1".to_string(),
            listen_port: 8001,
            destinations: vec![Destination::new("127.0.0.1", 8000)],
            namespace: "polar".to_string(),
            max_subjects: 20,
            window_depth: 30,
            tick_interval: Duration::from_secs(1),
            alpha: 0.5,
            centered: true,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a file, or defaults if it does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(config_path)
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-synchrony")
            .join("config.json")
    }

    /// Check the configuration before anything is bound or allocated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_subjects == 0 {
            return Err(ConfigError::Invalid(
                "max_subjects must be at least 1".to_string(),
            ));
        }
        if self.window_depth < 2 {
            return Err(ConfigError::Invalid(
                "window_depth must be at least 2 to estimate a covariance".to_string(),
            ));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "tick_interval must be positive".to_string(),
            ));
        }
        if self.destinations.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one destination is required".to_string(),
            ));
        }
        if self.namespace.is_empty() || self.namespace.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "namespace '{}' must be a single non-empty address segment",
                self.namespace
            )));
        }
        Ok(())
    }

    /// Address to bind the inbound socket to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}

/// A recipient of outbound similarity messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a `host:port` string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::Invalid(format!("destination '{s}' is not host:port")))?;
        let port: u16 = port
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("invalid port in '{s}': {e}")))?;
        if host.is_empty() {
            return Err(ConfigError::Invalid(format!("missing host in '{s}'")));
        }
        Ok(Self::new(host, port))
    }

    /// Resolve to a socket address.
    pub async fn resolve(&self) -> Result<SocketAddr, ConfigError> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| ConfigError::IoError(format!("{}:{}: {e}", self.host, self.port)))?
            .next()
            .ok_or_else(|| {
                ConfigError::Invalid(format!("{}:{} did not resolve", self.host, self.port))
            })
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration, as milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

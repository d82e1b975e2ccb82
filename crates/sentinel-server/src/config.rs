//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Push notification settings.
    #[serde(default)]
    pub push: PushConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "sentinel_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Push notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Directory holding the VAPID key artifacts. Created on first use.
    #[serde(default = "default_key_dir")]
    pub key_dir: String,

    /// Contact address for the VAPID `sub` claim (`mailto:<contact>`).
    #[serde(default = "default_push_contact")]
    pub contact: String,

    /// TTL, in seconds, the push service is asked to retain messages.
    #[serde(default = "default_push_ttl_secs")]
    pub ttl_secs: u32,

    /// Per-delivery request timeout in milliseconds.
    #[serde(default = "default_push_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> String {
    "sentinel.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_key_dir() -> String {
    "keys".to_string()
}

fn default_push_contact() -> String {
    "admin@localhost".to_string()
}

fn default_push_ttl_secs() -> u32 {
    3_600
}

fn default_push_timeout_ms() -> u64 {
    5_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            key_dir: default_key_dir(),
            contact: default_push_contact(),
            ttl_secs: default_push_ttl_secs(),
            timeout_ms: default_push_timeout_ms(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `SENTINEL_HOST` overrides `server.host`
/// - `SENTINEL_PORT` overrides `server.port`
/// - `SENTINEL_DB_PATH` overrides `database.path`
/// - `SENTINEL_LOG_LEVEL` overrides `logging.level`
/// - `SENTINEL_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `SENTINEL_PUSH_KEY_DIR` overrides `push.key_dir`
/// - `SENTINEL_PUSH_CONTACT` overrides `push.contact`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Ok(host) = std::env::var("SENTINEL_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("SENTINEL_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("SENTINEL_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("SENTINEL_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("SENTINEL_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(key_dir) = std::env::var("SENTINEL_PUSH_KEY_DIR") {
        config.push.key_dir = key_dir;
    }
    if let Ok(contact) = std::env::var("SENTINEL_PUSH_CONTACT") {
        config.push.contact = contact;
    }

    Ok(config)
}

//! Server configuration loading and validation.
//!
//! # Responsibility
//! - Load the JSON configuration file.
//! - Validate listen address, admission capacity and frame size limit.
//!
//! # Invariants
//! - A `ServerConfig` that passed `validate()` always describes a startable
//!   server; every violation is a `ConfigError` surfaced before binding.

use crate::db::DbError;
use crate::protocol::frame::{DEFAULT_MAX_MESSAGE_SIZE, MIN_MAX_MESSAGE_SIZE};
use crate::server::admission::{MAX_CONNECTIONS, MIN_CONNECTIONS};
use serde::{Deserialize, Deserializer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

const DEFAULT_DATABASE_PATH: &str = "notes.db";

/// Startup failure; the process must not start serving.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: io::Error },
    Parse(serde_json::Error),
    InvalidCapacity(usize),
    EmptyHost,
    InvalidMessageSize(usize),
    Database(DbError),
    Bind { addr: String, source: io::Error },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "malformed config: {err}"),
            Self::InvalidCapacity(value) => write!(
                f,
                "max_conn must be between {MIN_CONNECTIONS} and {MAX_CONNECTIONS}, got {value}"
            ),
            Self::EmptyHost => write!(f, "host cannot be empty"),
            Self::InvalidMessageSize(value) => write!(
                f,
                "max_message_size must be at least {MIN_MAX_MESSAGE_SIZE} bytes, got {value}"
            ),
            Self::Database(err) => write!(f, "failed to open database: {err}"),
            Self::Bind { addr, source } => write!(f, "failed to listen on {addr}: {source}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Bind { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Database(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ConfigError {
    fn from(value: DbError) -> Self {
        Self::Database(value)
    }
}

/// Server process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    /// Accepts a JSON string (`"8080"`) or integer.
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    /// Maximum concurrently active sessions.
    pub max_conn: usize,
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl ServerConfig {
    /// Builds a config with default database path and frame limit.
    pub fn new(host: impl Into<String>, port: u16, max_conn: usize) -> Self {
        Self {
            host: host.into(),
            port,
            max_conn,
            database: default_database(),
            max_message_size: default_max_message_size(),
        }
    }

    /// Parses and validates a JSON config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CONNECTIONS..=MAX_CONNECTIONS).contains(&self.max_conn) {
            return Err(ConfigError::InvalidCapacity(self.max_conn));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.max_message_size < MIN_MAX_MESSAGE_SIZE {
            return Err(ConfigError::InvalidMessageSize(self.max_message_size));
        }
        Ok(())
    }

    /// `host:port` string for binding the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reads, parses and validates the config file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<ServerConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ServerConfig::from_json(&text)
}

fn default_database() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_PATH)
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

fn deserialize_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        Text(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(port) => Ok(port),
        PortValue::Text(text) => text
            .trim()
            .parse::<u16>()
            .map_err(|_| serde::de::Error::custom(format!("invalid port `{text}`"))),
    }
}

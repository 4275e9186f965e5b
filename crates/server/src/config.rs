//! Configuration management for the dirshare server.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/dirshare/config.toml`.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::transfer::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("bind must be an IP address, got {0}")]
    InvalidBind(String),

    #[error("chunk_size must be between 1 and {max}, got {0}", max = MAX_CHUNK_SIZE)]
    InvalidChunkSize(usize),

    #[error("cookie_name must be a non-empty token without separators, got {0:?}")]
    InvalidCookieName(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the dirshare server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP listener configuration.
    pub server: ServerConfig,

    /// Shared directory configuration.
    pub share: ShareConfig,

    /// Access control.
    pub auth: AuthConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind: String,

    /// Port to listen on (0 picks a free port).
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Shared directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShareConfig {
    /// Root of the shared tree. Created at startup if missing.
    pub root: PathBuf,

    /// List entries whose name starts with '.'.
    pub include_hidden: bool,

    /// Follow symlinks whose target stays inside the root.
    pub follow_symlinks: bool,

    /// Read size per chunk when streaming files, in bytes.
    pub chunk_size: usize,
}

/// Access control.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared password that unlocks the share.
    pub password: String,

    /// Name of the session cookie.
    pub cookie_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            root: default_share_root(),
            include_hidden: true,
            follow_symlinks: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password: String::new(),
            cookie_name: "auth".to_string(),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dirshare")
        .join("config.toml")
}

/// Returns the default share root.
fn default_share_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dirshare")
        .join("shared")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Empty values are ignored. Supported variables:
    /// - DIRSHARE_PASSWORD: Override the share password
    /// - DIRSHARE_ROOT: Override the share root
    /// - DIRSHARE_PORT: Override the listen port
    /// - DIRSHARE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Some(password) = non_empty_env("DIRSHARE_PASSWORD") {
            tracing::info!("Overriding password from environment");
            self.auth.password = password;
        }

        if let Some(root) = non_empty_env("DIRSHARE_ROOT") {
            tracing::info!("Overriding share root from environment: {}", root);
            self.share.root = PathBuf::from(root);
        }

        if let Some(port) = non_empty_env("DIRSHARE_PORT") {
            match port.parse() {
                Ok(port) => {
                    tracing::info!("Overriding port from environment: {}", port);
                    self.server.port = port;
                }
                Err(_) => tracing::warn!("Ignoring invalid DIRSHARE_PORT: {}", port),
            }
        }

        if let Some(level) = non_empty_env("DIRSHARE_LOG_LEVEL") {
            tracing::info!("Overriding log_level from environment: {}", level);
            self.server.log_level = level;
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.password.is_empty() {
            return Err(ConfigError::EmptyPassword);
        }

        if self.server.bind.parse::<IpAddr>().is_err() {
            return Err(ConfigError::InvalidBind(self.server.bind.clone()));
        }

        if self.share.chunk_size == 0 || self.share.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::InvalidChunkSize(self.share.chunk_size));
        }

        if !is_cookie_token(&self.auth.cookie_name) {
            return Err(ConfigError::InvalidCookieName(self.auth.cookie_name.clone()));
        }

        let level = self.server.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.server.log_level.clone()));
        }

        Ok(())
    }

    /// Load configuration from `path`.
    ///
    /// A missing file yields the defaults. Malformed TOML is reported with
    /// its position in the file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot read config {}", path.display()))
            }
        };

        Self::from_toml(&contents).with_context(|| format!("Cannot parse config {}", path.display()))
    }

    /// Load configuration from [`default_config_path`].
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Write the configuration to `path`, creating missing parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents = self.to_toml()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
        fs::write(path, contents).with_context(|| format!("Cannot write config {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Serialize the configuration as pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Cannot serialize configuration")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// RFC 6265 cookie-name token: visible ASCII without separators.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
        })
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}

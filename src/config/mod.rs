//! Configuration for the master and regional servers
//!
//! Both configs can be built three ways:
//!
//! - a builder with defaults, validated on `build()`
//! - environment variables (`PAWMATCH_*`) via `from_env()`
//! - a TOML file via `from_file()`; missing keys take their defaults
//!
//! The CLI layers its flags on top of whichever source was used.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::utils::{normalize_base_url, validate_coordinates};

/// Default master base URL
pub const DEFAULT_MASTER_URL: &str = "http://localhost:3000";

/// Default period between two sync pushes
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// Default bound on every outbound call
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 5;

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Failed to read config file {path}: {reason}")]
    File { path: String, reason: String },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

// ============================================================================
// Master
// ============================================================================

/// Configuration for the master directory server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MasterConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Directory holding `server_registry.json` and `aggregated_data.json`
    pub data_dir: PathBuf,

    /// Enable CORS for the API
    pub enable_cors: bool,

    /// Enable request logging
    pub enable_request_logging: bool,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            data_dir: PathBuf::from("./data"),
            enable_cors: true,
            enable_request_logging: true,
        }
    }
}

impl MasterConfig {
    /// Load from environment variables
    ///
    /// - `PAWMATCH_BIND`: bind address [default: 0.0.0.0:3000]
    /// - `PAWMATCH_DATA_DIR`: data directory [default: ./data]
    /// - `PAWMATCH_CORS`: enable CORS [default: true]
    /// - `PAWMATCH_REQUEST_LOGGING`: enable request logging [default: true]
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            bind_address: env_parse("PAWMATCH_BIND")?.unwrap_or(defaults.bind_address),
            data_dir: env_parse("PAWMATCH_DATA_DIR")?.unwrap_or(defaults.data_dir),
            enable_cors: env_parse("PAWMATCH_CORS")?.unwrap_or(defaults.enable_cors),
            enable_request_logging: env_parse("PAWMATCH_REQUEST_LOGGING")?
                .unwrap_or(defaults.enable_request_logging),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = read_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("data_dir", "must not be empty"));
        }
        Ok(())
    }
}

// ============================================================================
// Region
// ============================================================================

/// Configuration for a regional server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegionConfig {
    /// City served by this region (registry key on the master)
    pub city: String,

    /// Server bind address
    pub bind_address: SocketAddr,

    /// Base URL advertised to the master; defaults to `http://localhost:<port>`
    pub public_url: Option<String>,

    pub latitude: f64,
    pub longitude: f64,

    /// Master directory base URL
    pub master_url: String,

    /// Directory holding the region's collection files
    pub data_dir: PathBuf,

    /// Period between two sync pushes
    pub sync_interval_secs: u64,

    /// Timeout applied to every outbound call
    pub upstream_timeout_secs: u64,

    pub enable_cors: bool,
    pub enable_request_logging: bool,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            city: String::new(),
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3001)),
            public_url: None,
            latitude: 0.0,
            longitude: 0.0,
            master_url: DEFAULT_MASTER_URL.to_string(),
            data_dir: PathBuf::from("./data"),
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            enable_cors: true,
            enable_request_logging: true,
        }
    }
}

impl RegionConfig {
    pub fn builder() -> RegionConfigBuilder {
        RegionConfigBuilder::default()
    }

    /// Load from environment variables
    ///
    /// - `PAWMATCH_CITY`: city name [required]
    /// - `PAWMATCH_BIND`: bind address [default: 0.0.0.0:3001]
    /// - `PAWMATCH_PUBLIC_URL`: advertised base URL [optional]
    /// - `PAWMATCH_LATITUDE` / `PAWMATCH_LONGITUDE`: city coordinates [default: 0]
    /// - `PAWMATCH_MASTER_URL`: master base URL [default: http://localhost:3000]
    /// - `PAWMATCH_DATA_DIR`: data directory [default: ./data]
    /// - `PAWMATCH_SYNC_INTERVAL`: seconds between pushes [default: 60]
    /// - `PAWMATCH_UPSTREAM_TIMEOUT`: outbound timeout in seconds [default: 5]
    pub fn from_env() -> Result<Self, ConfigError> {
        let city = std::env::var("PAWMATCH_CITY")
            .map_err(|_| ConfigError::MissingField("PAWMATCH_CITY".to_string()))?;

        let defaults = Self::default();
        let config = Self {
            city,
            bind_address: env_parse("PAWMATCH_BIND")?.unwrap_or(defaults.bind_address),
            public_url: std::env::var("PAWMATCH_PUBLIC_URL").ok(),
            latitude: env_parse("PAWMATCH_LATITUDE")?.unwrap_or(defaults.latitude),
            longitude: env_parse("PAWMATCH_LONGITUDE")?.unwrap_or(defaults.longitude),
            master_url: std::env::var("PAWMATCH_MASTER_URL").unwrap_or(defaults.master_url),
            data_dir: env_parse("PAWMATCH_DATA_DIR")?.unwrap_or(defaults.data_dir),
            sync_interval_secs: env_parse("PAWMATCH_SYNC_INTERVAL")?
                .unwrap_or(defaults.sync_interval_secs),
            upstream_timeout_secs: env_parse("PAWMATCH_UPSTREAM_TIMEOUT")?
                .unwrap_or(defaults.upstream_timeout_secs),
            enable_cors: env_parse("PAWMATCH_CORS")?.unwrap_or(defaults.enable_cors),
            enable_request_logging: env_parse("PAWMATCH_REQUEST_LOGGING")?
                .unwrap_or(defaults.enable_request_logging),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = read_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.city.trim().is_empty() {
            return Err(ConfigError::MissingField("city".to_string()));
        }

        validate_coordinates(self.latitude, self.longitude)
            .map_err(|e| ConfigError::invalid("latitude/longitude", e.to_string()))?;

        normalize_base_url(&self.master_url)
            .map_err(|e| ConfigError::invalid("master_url", e.to_string()))?;

        if let Some(url) = &self.public_url {
            normalize_base_url(url).map_err(|e| ConfigError::invalid("public_url", e.to_string()))?;
        }

        if self.sync_interval_secs == 0 {
            return Err(ConfigError::invalid("sync_interval_secs", "must be at least 1"));
        }

        if self.upstream_timeout_secs == 0 {
            return Err(ConfigError::invalid("upstream_timeout_secs", "must be at least 1"));
        }

        Ok(())
    }

    /// URL the master should route clients to
    pub fn advertised_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.bind_address.port()),
        }
    }

    /// Master base URL without a trailing slash
    pub fn master_base_url(&self) -> String {
        self.master_url.trim_end_matches('/').to_string()
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

/// Builder for RegionConfig
#[derive(Debug, Default)]
pub struct RegionConfigBuilder {
    config: RegionConfig,
}

impl RegionConfigBuilder {
    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.config.city = city.into();
        self
    }

    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    /// Set bind address from string
    pub fn bind_address_str(mut self, addr: &str) -> Result<Self, ConfigError> {
        self.config.bind_address = addr
            .parse()
            .map_err(|_| ConfigError::invalid("bind_address", format!("Invalid address: {addr}")))?;
        Ok(self)
    }

    pub fn public_url(mut self, url: impl Into<String>) -> Self {
        self.config.public_url = Some(url.into());
        self
    }

    pub fn coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.config.latitude = latitude;
        self.config.longitude = longitude;
        self
    }

    pub fn master_url(mut self, url: impl Into<String>) -> Self {
        self.config.master_url = url.into();
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn sync_interval_secs(mut self, secs: u64) -> Self {
        self.config.sync_interval_secs = secs;
        self
    }

    pub fn upstream_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upstream_timeout_secs = secs;
        self
    }

    pub fn enable_cors(mut self, enable: bool) -> Self {
        self.config.enable_cors = enable;
        self
    }

    pub fn enable_request_logging(mut self, enable: bool) -> Self {
        self.config.enable_request_logging = enable;
        self
    }

    pub fn build(self) -> Result<RegionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid(key, format!("cannot parse '{raw}'"))),
        Err(_) => Ok(None),
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::File {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the region pricing engine, supporting TOML
//! files and environment-variable overrides with validation and type-safe
//! access to all settings.
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (prefix `RPS_`, `__` as section separator)
//! 2. Configuration file (TOML)
//! 3. Default values
//!
//! ## Usage
//! ```rust,no_run
//! use region_price_scout::config::Config;
//!
//! let config = Config::from_file("config.toml").unwrap();
//! println!("Server port: {}", config.server.port);
//! ```

use crate::errors::{PricingError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server and API configuration
    pub server: ServerConfig,
    /// Cache TTLs and fetch concurrency
    pub cache: CacheConfig,
    /// Retail prices API client settings
    pub live_api: LiveApiConfig,
    /// Local price store settings
    pub store: StoreConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server and API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Enable CORS for browser frontends
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Cache TTLs and live-fetch concurrency
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Summary cache TTL (request-shape keyed)
    pub summary_ttl_seconds: u64,
    /// Raw-price cache TTL (region keyed)
    pub raw_price_ttl_seconds: u64,
    /// Maximum concurrent live region fetches
    pub max_in_flight_fetches: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            summary_ttl_seconds: 600,
            raw_price_ttl_seconds: 3600,
            max_in_flight_fetches: 8,
        }
    }
}

/// Retail prices API client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveApiConfig {
    /// API base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Safety cap on pagination depth per region
    pub max_pages: usize,
}

impl Default for LiveApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://prices.azure.com".to_string(),
            timeout_seconds: 30,
            max_pages: 50,
        }
    }
}

/// Local price store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Filesystem path of the sled database
    pub path: PathBuf,
    /// Entries older than this read as absent
    pub max_age_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/price-store"),
            max_age_seconds: 3600,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a specific TOML file plus environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("RPS").separator("__"))
            .build()
            .map_err(|e| PricingError::Config {
                message: e.to_string(),
            })?;

        let config: Config = settings.try_deserialize().map_err(|e| PricingError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `config.toml` when present, otherwise fall back to defaults
    /// with environment overrides.
    pub fn load() -> Result<Self> {
        let default_path = Path::new("config.toml");
        if default_path.exists() {
            return Self::from_file(default_path);
        }
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("RPS").separator("__"))
            .build()
            .map_err(|e| PricingError::Config {
                message: e.to_string(),
            })?;
        let config: Config = settings.try_deserialize().map_err(|e| PricingError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration as pretty TOML
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let rendered = toml::to_string_pretty(self).map_err(|e| PricingError::Config {
            message: format!("failed to render config: {}", e),
        })?;
        std::fs::write(path, rendered)?;
        Ok(())
    }

    /// Validate settings that would otherwise fail obscurely at runtime
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(PricingError::Config {
                message: "server.port must be non-zero".to_string(),
            });
        }
        if self.cache.summary_ttl_seconds == 0 || self.cache.raw_price_ttl_seconds == 0 {
            return Err(PricingError::Config {
                message: "cache TTLs must be positive".to_string(),
            });
        }
        if self.cache.max_in_flight_fetches == 0 {
            return Err(PricingError::Config {
                message: "cache.max_in_flight_fetches must be at least 1".to_string(),
            });
        }
        if self.live_api.base_url.is_empty() {
            return Err(PricingError::Config {
                message: "live_api.base_url must be set".to_string(),
            });
        }
        if self.live_api.max_pages == 0 {
            return Err(PricingError::Config {
                message: "live_api.max_pages must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

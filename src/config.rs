//! Configuration management for chat-memory
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{MemoryError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upper bound for any page size accepted at the request boundary
pub const PAGE_SIZE_LIMIT: usize = 100;

/// Main configuration structure for chat-memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Conversation store settings
    #[serde(default)]
    pub store: StoreConfig,
    /// History read settings
    #[serde(default)]
    pub history: HistoryConfig,
    /// Administrative access settings
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Which store implementation backs conversations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Remote Redis list per conversation
    #[default]
    Redis,
    /// Process-local map; contents are lost on restart
    Memory,
}

/// Conversation store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend selected at construction time
    #[serde(default)]
    pub backend: StoreBackend,

    /// Prefix prepended to every conversation id to form the store key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Sliding expiration window in seconds
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Use the in-memory store when redis cannot be reached at startup
    #[serde(default = "default_fallback_to_memory")]
    pub fallback_to_memory: bool,

    /// Redis connection settings
    #[serde(default)]
    pub redis: RedisConfig,
}

fn default_key_prefix() -> String {
    "chat:memory:".to_string()
}

fn default_ttl_seconds() -> u64 {
    604_800 // 7 days
}

fn default_fallback_to_memory() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            key_prefix: default_key_prefix(),
            ttl_seconds: default_ttl_seconds(),
            fallback_to_memory: default_fallback_to_memory(),
            redis: RedisConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Sliding expiration window as a `Duration`
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://:password@host:6379/0`
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// COUNT hint used when scanning keys for the directory
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,

    /// Timeout for establishing the initial connection (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_scan_count() -> usize {
    100
}

fn default_connect_timeout_ms() -> u64 {
    3_000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            scan_count: default_scan_count(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// History read configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Page size used when the caller does not supply one
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Largest page size accepted from callers
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

fn default_page_size() -> usize {
    10
}

fn default_max_page_size() -> usize {
    PAGE_SIZE_LIMIT
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Administrative access configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Key required to enumerate all conversations; enumeration is disabled when unset
    #[serde(default)]
    pub key: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MemoryError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| MemoryError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(backend) = std::env::var("CHAT_MEMORY_BACKEND") {
            self.store.backend = match backend.to_lowercase().as_str() {
                "redis" => StoreBackend::Redis,
                "memory" => StoreBackend::Memory,
                _ => {
                    tracing::warn!(
                        "Invalid CHAT_MEMORY_BACKEND: {}, keeping {:?}",
                        backend,
                        self.store.backend
                    );
                    self.store.backend
                }
            };
        }

        if let Ok(url) = std::env::var("CHAT_MEMORY_REDIS_URL") {
            self.store.redis.url = url;
        }

        if let Ok(prefix) = std::env::var("CHAT_MEMORY_KEY_PREFIX") {
            self.store.key_prefix = prefix;
        }

        if let Ok(ttl) = std::env::var("CHAT_MEMORY_TTL_SECONDS") {
            match ttl.parse::<u64>() {
                Ok(value) => {
                    self.store.ttl_seconds = value;
                    tracing::debug!(ttl_seconds = value, "Env override: CHAT_MEMORY_TTL_SECONDS");
                }
                Err(_) => tracing::warn!("Invalid CHAT_MEMORY_TTL_SECONDS: {}", ttl),
            }
        }

        if let Ok(key) = std::env::var("CHAT_MEMORY_ADMIN_KEY") {
            self.admin.key = Some(key).filter(|k| !k.is_empty());
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(url) = &cli.redis_url {
            self.store.redis.url = url.clone();
        }
        if cli.memory {
            tracing::debug!("CLI override: in-memory store");
            self.store.backend = StoreBackend::Memory;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `MemoryError::Config` describing the first invalid field
    pub fn validate(&self) -> Result<()> {
        if self.store.key_prefix.is_empty() {
            return Err(MemoryError::Config("store.key_prefix cannot be empty".to_string()).into());
        }

        if self.store.ttl_seconds == 0 {
            return Err(
                MemoryError::Config("store.ttl_seconds must be greater than 0".to_string()).into(),
            );
        }

        if self.store.backend == StoreBackend::Redis && self.store.redis.url.trim().is_empty() {
            return Err(MemoryError::Config(
                "store.redis.url is required for the redis backend".to_string(),
            )
            .into());
        }

        if self.store.redis.connect_timeout_ms == 0 {
            return Err(MemoryError::Config(
                "store.redis.connect_timeout_ms must be greater than 0".to_string(),
            )
            .into());
        }

        if self.store.redis.scan_count == 0 {
            return Err(MemoryError::Config(
                "store.redis.scan_count must be greater than 0".to_string(),
            )
            .into());
        }

        if self.history.max_page_size == 0 || self.history.max_page_size > PAGE_SIZE_LIMIT {
            return Err(MemoryError::Config(format!(
                "history.max_page_size must be between 1 and {}",
                PAGE_SIZE_LIMIT
            ))
            .into());
        }

        if self.history.default_page_size == 0
            || self.history.default_page_size > self.history.max_page_size
        {
            return Err(MemoryError::Config(format!(
                "history.default_page_size must be between 1 and {}",
                self.history.max_page_size
            ))
            .into());
        }

        Ok(())
    }
}

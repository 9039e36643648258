//! Configuration for the benchmark.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default reranking endpoint.
pub const DEFAULT_RERANK_API_BASE: &str = "https://api.cohere.com";

/// Default reranking model.
pub const DEFAULT_RERANK_MODEL: &str = "rerank-english-v3.0";

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL (e.g., "postgres://postgres:pw@127.0.0.1/testdb")
    pub url: String,

    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Timeout for a single store call, in seconds
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_query_timeout_secs() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

impl DatabaseConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

/// Reranking oracle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Base URL for the rerank API
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Model name (e.g., "rerank-english-v3.0")
    pub model: String,

    /// Per-request timeout, in seconds
    #[serde(default = "default_rerank_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts after a transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay, doubled on every retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_rerank_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_RERANK_API_BASE.to_string(),
            api_key: String::new(),
            model: DEFAULT_RERANK_MODEL.to_string(),
            timeout_secs: default_rerank_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl RerankConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// First few characters of the key, for display.
    pub fn masked_key(&self) -> String {
        if self.api_key.is_empty() {
            return "(unset)".to_string();
        }
        let prefix: String = self.api_key.chars().take(4).collect();
        format!("{}...", prefix)
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Vector store settings
    pub database: DatabaseConfig,
    /// Reranking oracle settings
    pub rerank: RerankConfig,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    database: Option<DatabaseFileSection>,
    rerank: Option<RerankFileSection>,
}

#[derive(Debug, Deserialize)]
struct DatabaseFileSection {
    url: Option<String>,
    max_connections: Option<u32>,
    query_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RerankFileSection {
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_backoff_ms: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (DATABASE_URL, POSTGRES_PWD, COHERE_API_KEY, RERANK_*)
    /// 2. Config file (~/.config/rerank-bench/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// Override values from the process environment.
    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var("DATABASE_URL") {
            self.database.url = url;
        } else if self.database.url.is_empty() {
            if let Ok(password) = env::var("POSTGRES_PWD") {
                self.database.url = local_database_url(&password);
            }
        }

        if let Ok(api_key) = env::var("COHERE_API_KEY") {
            self.rerank.api_key = api_key;
        }

        if let Ok(api_base) = env::var("RERANK_API_BASE") {
            self.rerank.api_base = api_base;
        }

        if let Ok(model) = env::var("RERANK_MODEL") {
            self.rerank.model = model;
        }

        if let Ok(timeout) = env::var("RERANK_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.rerank.timeout_secs = secs;
            }
        }

        if let Ok(retries) = env::var("RERANK_MAX_RETRIES") {
            if let Ok(n) = retries.parse() {
                self.rerank.max_retries = n;
            }
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML config document on top of the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| BenchError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(db) = file_config.database {
            if let Some(url) = db.url {
                config.database.url = url;
            }
            if let Some(max_connections) = db.max_connections {
                config.database.max_connections = max_connections;
            }
            if let Some(timeout) = db.query_timeout_secs {
                config.database.query_timeout_secs = timeout;
            }
        }

        if let Some(rerank) = file_config.rerank {
            if let Some(api_base) = rerank.api_base {
                config.rerank.api_base = api_base;
            }
            if let Some(api_key) = rerank.api_key {
                config.rerank.api_key = api_key;
            }
            if let Some(model) = rerank.model {
                config.rerank.model = model;
            }
            if let Some(timeout) = rerank.timeout_secs {
                config.rerank.timeout_secs = timeout;
            }
            if let Some(retries) = rerank.max_retries {
                config.rerank.max_retries = retries;
            }
            if let Some(backoff) = rerank.retry_backoff_ms {
                config.rerank.retry_backoff_ms = backoff;
            }
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rerank-bench")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate the settings needed to reach PostgreSQL.
    pub fn validate_database(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(BenchError::Config(
                "Database URL is required. Set DATABASE_URL (or POSTGRES_PWD) or add to config file."
                    .to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(BenchError::InvalidConfig(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate the settings needed to call the rerank API.
    pub fn validate_rerank(&self) -> Result<()> {
        if self.rerank.api_base.is_empty() {
            return Err(BenchError::Config(
                "Rerank API base URL is required. Set RERANK_API_BASE or add to config file."
                    .to_string(),
            ));
        }

        if self.rerank.api_key.is_empty() {
            return Err(BenchError::Config(
                "Rerank API key is required. Set COHERE_API_KEY or add to config file."
                    .to_string(),
            ));
        }

        if self.rerank.model.is_empty() {
            return Err(BenchError::Config(
                "Rerank model is required. Set RERANK_MODEL or add to config file.".to_string(),
            ));
        }

        Ok(())
    }
}

/// Connection URL of the local development database.
fn local_database_url(password: &str) -> String {
    format!("postgres://postgres:{}@127.0.0.1/testdb", password)
}

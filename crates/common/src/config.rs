//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Round engine configuration.
    #[serde(default)]
    pub rounds: RoundsConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL (`PostgreSQL` in production).
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Round engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RoundsConfig {
    /// Reject activating a round while another round of the same campaign
    /// is active or paused.
    #[serde(default = "default_true")]
    pub single_active_round: bool,
    /// Maximum size of a review attached to a vote, in bytes.
    #[serde(default = "default_max_review_bytes")]
    pub max_review_bytes: usize,
    /// Number of open tasks handed to a juror per batch.
    #[serde(default = "default_task_batch_size")]
    pub task_batch_size: u64,
    /// Fixed seed for task allocation shuffles. Unset means fresh entropy
    /// per operation.
    #[serde(default)]
    pub allocation_seed: Option<u64>,
}

impl Default for RoundsConfig {
    fn default() -> Self {
        Self {
            single_active_round: default_true(),
            max_review_bytes: default_max_review_bytes(),
            task_batch_size: default_task_batch_size(),
            allocation_seed: None,
        }
    }
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    1
}

const fn default_true() -> bool {
    true
}

const fn default_max_review_bytes() -> usize {
    8192
}

const fn default_task_batch_size() -> u64 {
    15
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `JURY_ENV`)
    /// 4. Environment variables with `JURY_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("JURY_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("JURY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("JURY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

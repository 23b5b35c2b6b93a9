//! Configuration system for vocabkeep.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `vocabkeep.toml` file in the working directory
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `VOCABKEEP_DATABASE_TYPE` - `sqlite` or `postgres`
//! - `VOCABKEEP_DATABASE_URL` - Database connection URL (routed by scheme)
//! - `VOCABKEEP_LOGGING_ENABLED` - Enable log output
//! - `VOCABKEEP_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
//! - `VOCABKEEP_LICENSE_KEY_PREFIX` - Prefix for generated license keys
//! - `VOCABKEEP_DICTIONARY_URL` - Base URL of the dictionary API

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{VocabError, VocabResult};

/// Global configuration singleton.
static CONFIG: OnceLock<VocabConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VocabConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub license: LicenseConfig,
    pub dictionary: DictionaryConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite" or "postgres"
    pub db_type: String,
    /// SQLite connection URL
    pub sqlite_url: String,
    /// PostgreSQL connection URL
    pub postgres_url: String,
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// How long SQLite waits on a locked database before giving up
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: default_sqlite_url(),
            postgres_url: "postgres://localhost/vocabkeep".to_string(),
            max_connections: 5,
            busy_timeout_secs: 5,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

/// License key provisioning configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// Prefix for generated license keys (e.g., "VOC" -> "VOC-XXXX-XXXX-XXXX-XXXX")
    pub key_prefix: String,
    /// Number of segments in the license key
    pub key_segments: u8,
    /// Characters per segment
    pub key_segment_length: u8,
    /// Activation slots given to newly provisioned keys
    pub default_max_activations: u32,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            key_prefix: "VOC".to_string(),
            key_segments: 4,
            key_segment_length: 4,
            default_max_activations: 1,
        }
    }
}

/// Dictionary lookup configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// Base URL; the lower-cased word is appended to it
    pub api_url: String,
    pub timeout_secs: u64,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.dictionaryapi.dev/api/v2/entries/en/".to_string(),
            timeout_secs: 10,
        }
    }
}

/// `sqlite://<data dir>/vocabkeep/vocabkeep.db?mode=rwc`, or a file in the
/// working directory when the platform has no data dir.
fn default_sqlite_url() -> String {
    match dirs::data_dir() {
        Some(dir) => format!(
            "sqlite://{}?mode=rwc",
            dir.join("vocabkeep").join("vocabkeep.db").display()
        ),
        None => "sqlite://vocabkeep.db?mode=rwc".to_string(),
    }
}

fn config_err(e: config::ConfigError) -> VocabError {
    VocabError::ConfigError(e.to_string())
}

impl VocabConfig {
    /// Load configuration from file and environment.
    ///
    /// Later sources override earlier ones: defaults, then `vocabkeep.toml`,
    /// then environment variables.
    pub fn load() -> VocabResult<Self> {
        let defaults = DatabaseConfig::default();
        let builder = Config::builder()
            .set_default("database.db_type", defaults.db_type)
            .map_err(config_err)?
            .set_default("database.sqlite_url", defaults.sqlite_url)
            .map_err(config_err)?
            .set_default("database.postgres_url", defaults.postgres_url)
            .map_err(config_err)?
            .set_default("database.max_connections", defaults.max_connections)
            .map_err(config_err)?
            .set_default("database.busy_timeout_secs", defaults.busy_timeout_secs)
            .map_err(config_err)?
            .set_default("logging.enabled", true)
            .map_err(config_err)?
            .set_default("logging.level", "info")
            .map_err(config_err)?
            .set_default("license.key_prefix", "VOC")
            .map_err(config_err)?
            .set_default("license.key_segments", 4)
            .map_err(config_err)?
            .set_default("license.key_segment_length", 4)
            .map_err(config_err)?
            .set_default("license.default_max_activations", 1)
            .map_err(config_err)?
            .set_default(
                "dictionary.api_url",
                "https://api.dictionaryapi.dev/api/v2/entries/en/",
            )
            .map_err(config_err)?
            .set_default("dictionary.timeout_secs", 10)
            .map_err(config_err)?
            // Load from vocabkeep.toml (optional)
            .add_source(config::File::with_name("vocabkeep").required(false))
            // Override with environment variables
            .set_override_option("database.db_type", env::var("VOCABKEEP_DATABASE_TYPE").ok())
            .map_err(config_err)?
            .set_override_option(
                "database.sqlite_url",
                env::var("VOCABKEEP_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("sqlite")),
            )
            .map_err(config_err)?
            .set_override_option(
                "database.postgres_url",
                env::var("VOCABKEEP_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("postgres")),
            )
            .map_err(config_err)?
            .set_override_option(
                "logging.enabled",
                env::var("VOCABKEEP_LOGGING_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(config_err)?
            .set_override_option("logging.level", env::var("VOCABKEEP_LOG_LEVEL").ok())
            .map_err(config_err)?
            .set_override_option(
                "license.key_prefix",
                env::var("VOCABKEEP_LICENSE_KEY_PREFIX").ok(),
            )
            .map_err(config_err)?
            .set_override_option(
                "dictionary.api_url",
                env::var("VOCABKEEP_DICTIONARY_URL").ok(),
            )
            .map_err(config_err)?;

        let settings = builder
            .build()
            .map_err(|e| VocabError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| VocabError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> VocabResult<()> {
        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(VocabError::ConfigError(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }
        if self.database.max_connections == 0 {
            return Err(VocabError::ConfigError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if self.license.key_prefix.is_empty() {
            return Err(VocabError::ConfigError(
                "license.key_prefix cannot be empty".to_string(),
            ));
        }
        if self.license.key_segments == 0 || self.license.key_segment_length == 0 {
            return Err(VocabError::ConfigError(
                "license.key_segments and license.key_segment_length must be greater than 0"
                    .to_string(),
            ));
        }
        if self.license.default_max_activations == 0 {
            return Err(VocabError::ConfigError(
                "license.default_max_activations must be at least 1".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(VocabError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        if !self.dictionary.api_url.starts_with("http://")
            && !self.dictionary.api_url.starts_with("https://")
        {
            return Err(VocabError::ConfigError(format!(
                "dictionary.api_url must be an http(s) URL, got '{}'",
                self.dictionary.api_url
            )));
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// Loads and validates on first access, then returns the cached value.
pub fn get_config() -> VocabResult<&'static VocabConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = VocabConfig::load()?;
    config.validate()?;

    // Another thread may have won the race; either value is fine.
    let _ = CONFIG.set(config);

    CONFIG
        .get()
        .ok_or_else(|| VocabError::ConfigError("configuration unavailable".to_string()))
}

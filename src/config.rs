//! Migration runner configuration
//!
//! [`MigrateConfig::load`] reads the `[migrate]` section of
//! `config/docshift.toml` (optional) and then environment variables such as
//! `DOCSHIFT__MIGRATE__URI`, which take precedence.

use crate::connection::ConnectOptions;
use crate::migration::{RunnerOptions, UndoAllStrategy, DEFAULT_COLLECTION};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/docshift.toml";

const ENV_PREFIX: &str = "DOCSHIFT";
const SECTION: &str = "migrate";

#[derive(Debug, Clone, Deserialize)]
pub struct MigrateConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub options: ConnectOptions,
    /// Ledger collection
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    /// Overrides the default `.rs` extension filter
    #[serde(default)]
    pub file_ext: Option<String>,
    #[serde(default)]
    pub operation_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub undo_all: UndoAllStrategy,
}

fn default_uri() -> String {
    "file://./data".to_string()
}

fn default_database() -> String {
    "docshift_dev".to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            database: default_database(),
            options: ConnectOptions::default(),
            collection: default_collection(),
            migrations_dir: default_migrations_dir(),
            file_ext: None,
            operation_timeout_seconds: None,
            undo_all: UndoAllStrategy::default(),
        }
    }
}

impl MigrateConfig {
    /// Load from `config/docshift.toml`, falling back to env vars.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or an environment value is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from an explicit file (optional), then env vars
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or an environment value is malformed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                ConfigError::Message(format!(
                    "Failed to load migration configuration from {}: {}",
                    path.display(),
                    e
                ))
            })?;

        match settings.get::<MigrateConfig>(SECTION) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => {
                log::debug!("No [{SECTION}] configuration found; using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Message(format!(
                "Migration configuration is invalid: {e}"
            ))),
        }
    }

    #[must_use]
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_seconds.map(Duration::from_secs)
    }

    /// Runner options derived from this configuration
    #[must_use]
    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            operation_timeout: self.operation_timeout(),
            undo_all: self.undo_all,
            ..RunnerOptions::default()
        }
    }
}

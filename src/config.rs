//! Configuration for model registries and database connections.
//!
//! Supports YAML files and environment variable overrides.

use serde::Deserialize;

use crate::grammar::Dialect;

/// Default configuration file name, without extension.
pub const DEFAULT_CONFIG_FILE: &str = "modelsql";

/// Environment variable naming an additional configuration file.
pub const CONFIG_ENV_VAR: &str = "MODELSQL_CONFIG";

/// Prefix for environment overrides, e.g. `MODELSQL__GRAMMAR__DIALECT=postgres`.
pub const CONFIG_ENV_PREFIX: &str = "MODELSQL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grammar: GrammarConfig,
    pub database: DatabaseConfig,
}

/// SQL dialect selection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    pub dialect: Dialect,
}

/// Database connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL, e.g. `sqlite::memory:` or `postgres://localhost/app`.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Sources, lowest priority first:
    /// 1. `modelsql.yaml` in the current directory, if present
    /// 2. The file at `path`, if given
    /// 3. The file named by `MODELSQL_CONFIG`, if set
    /// 4. Environment variables with the `MODELSQL` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

//! Configuration loading and validation.
//!
//! Settings come from an optional YAML file and the environment. The
//! environment always wins, so a checked-in file can hold defaults while
//! credentials stay in `DB_*` variables.

mod types;
mod validation;

pub use types::*;
pub use validation::max_batch_size;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{MigrateError, Result};

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// Missing sections and fields take their defaults. The result is not
    /// validated; see [`Config::resolve`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// The file if given, otherwise defaults, overridden by the environment.
    ///
    /// Not validated, so callers can layer further overrides first.
    pub fn layered(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let mut config = Self::load(path)?;
                config.apply_env_overrides()?;
                Ok(config)
            }
            None => Self::from_env(),
        }
    }

    /// [`Config::layered`], then validated.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let config = Self::layered(path)?;
        config.validate()?;
        debug!(?config, "configuration resolved");
        Ok(config)
    }

    /// Override settings from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override settings from `lookup`, keyed by environment variable name.
    ///
    /// Empty values are treated as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("SQLITE_PATH") {
            self.source.path = PathBuf::from(v);
        }
        if let Some(v) = get("DB_HOST") {
            self.target.host = v;
        }
        if let Some(v) = get("DB_PORT") {
            self.target.port = parse_env("DB_PORT", &v)?;
        }
        if let Some(v) = get("DB_NAME") {
            self.target.database = v;
        }
        if let Some(v) = get("DB_USER") {
            self.target.user = v;
        }
        if let Some(v) = get("DB_PASSWORD") {
            self.target.password = v;
        }
        if let Some(v) = get("DB_SCHEMA") {
            self.target.schema = v;
        }
        if let Some(v) = get("DB_SSL_MODE") {
            self.target.ssl_mode = v;
        }
        if let Some(v) = get("BATCH_SIZE") {
            self.migration.batch_size = parse_env("BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("LOG_FILE") {
            self.migration.log_file = PathBuf::from(v);
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl TargetConfig {
    /// libpq-style description of the connection, without the password.
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} sslmode={} options='-c search_path={}'",
            self.host, self.port, self.database, self.user, self.ssl_mode, self.schema
        )
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        MigrateError::Config(format!("{} has an invalid value: '{}'", key, value))
    })
}

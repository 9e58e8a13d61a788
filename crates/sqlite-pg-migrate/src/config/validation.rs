//! Configuration validation.

use super::Config;
use crate::core::identifier::validate_identifier;
use crate::core::schema::TableKind;
use crate::drivers::common::SslMode;
use crate::error::{MigrateError, Result};

/// PostgreSQL limit on bind parameters per statement.
const MAX_BIND_PARAMS: usize = 65_535;

/// Largest batch whose INSERT stays within the bind parameter limit for
/// every table.
pub fn max_batch_size() -> usize {
    let widest = TableKind::MIGRATION_ORDER
        .iter()
        .map(|t| t.spec().column_count())
        .max()
        .unwrap_or(1);
    MAX_BIND_PARAMS / widest
}

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.path.as_os_str().is_empty() {
        return Err(MigrateError::Config(
            "source.path is required (SQLITE_PATH)".into(),
        ));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config(
            "target.host is required (DB_HOST)".into(),
        ));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config(
            "target.database is required (DB_NAME)".into(),
        ));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config(
            "target.user is required (DB_USER)".into(),
        ));
    }
    validate_identifier(&config.target.schema)
        .map_err(|e| MigrateError::Config(format!("target.schema is invalid: {}", e)))?;
    config.target.ssl_mode.parse::<SslMode>()?;

    // Migration validation
    let max = max_batch_size();
    if config.migration.batch_size == 0 || config.migration.batch_size > max {
        return Err(MigrateError::Config(format!(
            "migration.batch_size must be between 1 and {}, got {}",
            max, config.migration.batch_size
        )));
    }
    if config.migration.log_file.as_os_str().is_empty() {
        return Err(MigrateError::Config(
            "migration.log_file cannot be empty".into(),
        ));
    }

    Ok(())
}

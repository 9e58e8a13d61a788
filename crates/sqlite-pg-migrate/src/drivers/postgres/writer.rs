//! PostgreSQL target writer implementation.
//!
//! Implements the `TargetWriter` trait on top of a single pooled
//! tokio-postgres client. Every batch becomes one multi-row
//! `INSERT ... ON CONFLICT (...) DO NOTHING` inside its own transaction.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::types::ToSql;
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::identifier::{qualify_pg, quote_pg};
use crate::core::schema::{TableKind, TableSpec};
use crate::core::traits::TargetWriter;
use crate::core::value::SqlValue;
use crate::drivers::common::SslMode;
use crate::error::{MigrateError, Result};
use crate::model::Record;

/// Connection timeout for the target.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL target writer.
pub struct PostgresWriter {
    pool: Pool,
    /// The one client used for the whole run; `None` after close.
    client: Option<Object>,
    schema: String,
}

impl PostgresWriter {
    /// Connect to the target described by `config`.
    ///
    /// The session's `search_path` is set to the configured schema.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.options(&format!("-c search_path={}", config.schema));
        pg_config.application_name("sqlite-pg-migrate");
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let ssl_mode: SslMode = config.ssl_mode.parse()?;
        let mgr = match ssl_mode.connector()? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
        };
        let pool = Pool::builder(mgr)
            .max_size(1)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?;

        let client = pool
            .get()
            .await
            .map_err(|e| {
                MigrateError::pool(e, format!("connecting to {}", config.connection_string()))
            })?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::pool(e, "testing PostgreSQL target connection"))?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{} (schema {})",
            config.host, config.port, config.database, config.schema
        );

        Ok(Self {
            pool,
            client: Some(client),
            schema: config.schema.clone(),
        })
    }

    fn client(&mut self) -> Result<&mut Object> {
        self.client
            .as_mut()
            .ok_or_else(|| MigrateError::pool("connection already closed", "PostgreSQL target"))
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    async fn prepare_session(&mut self) -> Result<()> {
        self.client()?
            .batch_execute("SET TIME ZONE 'UTC'")
            .await
            .map_err(|e| MigrateError::pool(e, "setting target session time zone"))?;
        debug!("target session time zone set to UTC");
        Ok(())
    }

    async fn upsert(&mut self, table: TableKind, records: &[Record]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let rows = batch_values(table, records)?;
        let sql = build_upsert_sql(&self.schema, table.spec(), rows.len())?;
        let params: Vec<&(dyn ToSql + Sync)> = rows
            .iter()
            .flatten()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect();

        let client = self.client()?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| MigrateError::target_write(table.name(), e))?;
        let inserted = tx
            .execute(sql.as_str(), &params)
            .await
            .map_err(|e| MigrateError::target_write(table.name(), e))?;
        tx.commit()
            .await
            .map_err(|e| MigrateError::target_write(table.name(), e))?;

        Ok(inserted)
    }

    async fn row_count(&mut self, table: TableKind) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*)::int8 FROM {}",
            qualify_pg(&self.schema, table.name())?
        );
        let row = self
            .client()?
            .query_one(sql.as_str(), &[])
            .await
            .map_err(|e| MigrateError::target_write(table.name(), e))?;
        Ok(row.get::<_, i64>(0).max(0) as u64)
    }

    async fn close(&mut self) {
        // Return the client before closing so the pool can drop it.
        self.client.take();
        self.pool.close();
    }
}

/// Column values of every record, checked against the table layout.
///
/// Fails before any SQL is built if a record belongs to another table or
/// does not carry exactly one value per target column.
fn batch_values(table: TableKind, records: &[Record]) -> Result<Vec<Vec<SqlValue<'_>>>> {
    let expected = table.spec().column_count();
    records
        .iter()
        .map(|record| {
            if record.table() != table {
                return Err(MigrateError::malformed(
                    table.name(),
                    format!("{} record in a {} batch", record.table(), table),
                ));
            }
            let values = record.values();
            if values.len() != expected {
                return Err(MigrateError::ColumnCountMismatch {
                    table: table.name().to_string(),
                    expected,
                    actual: values.len(),
                });
            }
            Ok(values)
        })
        .collect()
}

/// Build the multi-row conflict-tolerant INSERT for `rows` records.
fn build_upsert_sql(schema: &str, spec: &TableSpec, rows: usize) -> Result<String> {
    let columns = spec
        .target_columns
        .iter()
        .map(|c| quote_pg(c))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    let conflict = spec
        .conflict_key
        .iter()
        .map(|c| quote_pg(c))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let width = spec.column_count();
    let tuples: Vec<String> = (0..rows)
        .map(|row| {
            let placeholders: Vec<String> = (1..=width)
                .map(|col| format!("${}", row * width + col))
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) DO NOTHING",
        qualify_pg(schema, spec.name)?,
        columns,
        tuples.join(", "),
        conflict
    ))
}

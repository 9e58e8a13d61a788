//! # sqlite-pg-migrate
//!
//! Batch migration of the movies catalogue from SQLite to PostgreSQL.
//!
//! The five catalogue tables are copied in dependency order (works, genres,
//! persons, then the two join tables):
//!
//! - **Typed records** with audit timestamps normalized to UTC
//! - **Streaming extraction** in bounded batches from a read-only source
//! - **Conflict-tolerant inserts**, so re-running never duplicates rows
//! - **Failure isolation**: a failing table is skipped, a failing source aborts
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_pg_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> sqlite_pg_migrate::Result<()> {
//!     let config = Config::resolve(None)?;
//!     let orchestrator = Orchestrator::connect(&config).await?;
//!     let result = orchestrator.run().await?;
//!     println!("Inserted {} rows", result.rows_inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod model;
pub mod orchestrator;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use crate::core::{RecordStream, SourceReader, TableKind, TargetWriter};
pub use drivers::{PostgresWriter, SqliteReader};
pub use error::{MigrateError, Result};
pub use model::{RawRow, RawValue, Record};
pub use orchestrator::{
    MigrationResult, Orchestrator, RowCountCheck, RunStatus, TableReport, TableStatus,
};

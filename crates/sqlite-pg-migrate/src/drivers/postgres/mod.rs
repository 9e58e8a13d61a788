//! PostgreSQL target driver.
//!
//! - [`PostgresWriter`]: conflict-tolerant batch writer for the target schema

mod writer;

pub use writer::PostgresWriter;

//! Database driver implementations.
//!
//! - [`sqlite`]: read-only source reader
//! - [`postgres`]: target writer
//! - [`common`]: shared utilities (TLS)

pub mod common;
pub mod postgres;
pub mod sqlite;

pub use common::SslMode;
pub use postgres::PostgresWriter;
pub use sqlite::{SqliteReader, SqliteRecordStream};

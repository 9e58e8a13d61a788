//! SQLite source driver.
//!
//! - [`SqliteReader`]: read-only source reader over a single connection
//! - [`SqliteRecordStream`]: lazy batched stream over one table

mod reader;

pub use reader::{SqliteReader, SqliteRecordStream};

//! Core abstractions shared by the drivers and the orchestrator.
//!
//! - [`schema`]: the fixed table set and its column/conflict metadata
//! - [`value`]: SQL values bound as statement parameters
//! - [`traits`]: the reader, stream, and writer seams
//! - [`identifier`]: identifier validation and quoting

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{TableKind, TableSpec};
pub use traits::{RecordStream, SourceReader, TargetWriter};
pub use value::{SqlNullType, SqlValue};

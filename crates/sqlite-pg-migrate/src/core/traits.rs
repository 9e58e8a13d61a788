//! Reader and writer seams of the migration engine.
//!
//! - [`SourceReader`]: opens lazy, batched record streams over source tables
//! - [`RecordStream`]: yields one batch at a time until the table is exhausted
//! - [`TargetWriter`]: prepares the target session and inserts batches
//!
//! The orchestrator is generic over these traits, so it can be driven by the
//! SQLite/PostgreSQL drivers or by in-memory fakes in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Record;

use super::schema::TableKind;

/// Read records from the source database.
#[async_trait]
pub trait SourceReader: Send {
    /// Open a stream over every row of `table`, in batches of at most
    /// `batch_size` records.
    ///
    /// Nothing is read until the first [`RecordStream::next_batch`] call, so
    /// failures (including a missing table) surface there. The stream borrows
    /// the reader, which serializes access to the single source connection.
    fn stream<'a>(&'a mut self, table: TableKind, batch_size: usize)
        -> Box<dyn RecordStream + 'a>;

    /// Number of rows in `table`.
    async fn row_count(&mut self, table: TableKind) -> Result<u64>;

    /// Release the source connection.
    async fn close(&mut self);
}

/// A single-use, forward-only sequence of record batches.
#[async_trait]
pub trait RecordStream: Send {
    /// Next batch, or `None` once the table is exhausted.
    ///
    /// Batches are never empty and hold at most the stream's batch size. After
    /// `None` or an error the stream stays finished.
    async fn next_batch(&mut self) -> Result<Option<Vec<Record>>>;
}

/// Write records to the target database.
#[async_trait]
pub trait TargetWriter: Send {
    /// Per-session setup run once before the first write (UTC time zone).
    async fn prepare_session(&mut self) -> Result<()>;

    /// Insert `records` into `table`, skipping rows whose conflict key
    /// already exists.
    ///
    /// Returns the number of rows actually inserted. An empty slice is a
    /// no-op returning 0.
    async fn upsert(&mut self, table: TableKind, records: &[Record]) -> Result<u64>;

    /// Number of rows in `table`.
    async fn row_count(&mut self, table: TableKind) -> Result<u64>;

    /// Release the target connection.
    async fn close(&mut self);
}

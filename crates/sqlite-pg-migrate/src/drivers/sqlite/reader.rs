//! SQLite source reader implementation.
//!
//! Implements the `SourceReader` trait over one read-only SQLx connection.
//! Rows are pulled from the database cursor on demand, so at most one batch
//! of records is held in memory per table.

use std::path::Path;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Row, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::core::schema::TableKind;
use crate::core::traits::{RecordStream, SourceReader};
use crate::error::{MigrateError, Result};
use crate::model::{RawRow, RawValue, Record};

/// SQLite source reader.
pub struct SqliteReader {
    conn: Option<SqliteConnection>,
}

impl SqliteReader {
    /// Open the SQLite file at `path` read-only.
    ///
    /// A missing file is an error; nothing is created.
    pub async fn open(path: &Path) -> Result<Self> {
        let conn = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false)
            .connect()
            .await
            .map_err(|e| {
                MigrateError::pool(e, format!("opening SQLite source {}", path.display()))
            })?;

        info!("Opened SQLite source: {}", path.display());

        Ok(Self::from_connection(conn))
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: SqliteConnection) -> Self {
        Self { conn: Some(conn) }
    }
}

#[async_trait]
impl SourceReader for SqliteReader {
    fn stream<'a>(
        &'a mut self,
        table: TableKind,
        batch_size: usize,
    ) -> Box<dyn RecordStream + 'a> {
        let rows: BoxStream<'a, sqlx::Result<SqliteRow>> = match self.conn.as_mut() {
            Some(conn) => sqlx::query(table.select_sql()).fetch(conn),
            None => stream::once(async { Err(sqlx::Error::PoolClosed) }).boxed(),
        };
        debug!(table = %table, batch_size, "opened source stream");
        Box::new(SqliteRecordStream::new(table, batch_size, rows))
    }

    async fn row_count(&mut self, table: TableKind) -> Result<u64> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| MigrateError::source_read(table.name(), sqlx::Error::PoolClosed))?;
        let count: i64 = sqlx::query_scalar(table.count_sql())
            .fetch_one(conn)
            .await
            .map_err(|e| MigrateError::source_read(table.name(), e))?;
        Ok(count.max(0) as u64)
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close().await {
                debug!("closing SQLite source: {}", e);
            }
        }
    }
}

/// Batched record stream over one SQLite table.
pub struct SqliteRecordStream<'a> {
    table: TableKind,
    batch_size: usize,
    /// `None` once the stream has finished or failed.
    rows: Option<BoxStream<'a, sqlx::Result<SqliteRow>>>,
}

impl<'a> SqliteRecordStream<'a> {
    fn new(
        table: TableKind,
        batch_size: usize,
        rows: BoxStream<'a, sqlx::Result<SqliteRow>>,
    ) -> Self {
        Self {
            table,
            batch_size: batch_size.max(1),
            rows: Some(rows),
        }
    }
}

#[async_trait]
impl RecordStream for SqliteRecordStream<'_> {
    async fn next_batch(&mut self) -> Result<Option<Vec<Record>>> {
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };

        let mut batch = Vec::with_capacity(self.batch_size);
        let mut exhausted = false;
        while batch.len() < self.batch_size {
            let row = match rows.try_next().await {
                Ok(Some(row)) => row,
                Ok(None) => {
                    exhausted = true;
                    break;
                }
                Err(e) => {
                    self.rows = None;
                    return Err(MigrateError::source_read(self.table.name(), e));
                }
            };
            match row_to_record(self.table, &row) {
                Ok(record) => batch.push(record),
                Err(e) => {
                    self.rows = None;
                    return Err(e);
                }
            }
        }

        if exhausted {
            // Drops the cursor and releases the connection borrow.
            self.rows = None;
        }

        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }
}

/// Convert a SQLite row into the typed record for `table`.
fn row_to_record(table: TableKind, row: &SqliteRow) -> Result<Record> {
    let mut raw = RawRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = raw_value(row, idx).map_err(|e| {
            MigrateError::malformed(table.name(), format!("column '{}': {}", column.name(), e))
        })?;
        raw.insert(column.name(), value);
    }
    Record::from_row(table, &raw)
}

/// Decode one column by its runtime storage class.
fn raw_value(row: &SqliteRow, idx: usize) -> sqlx::Result<RawValue> {
    let value = row.try_get_raw(idx)?;
    if value.is_null() {
        return Ok(RawValue::Null);
    }

    let storage = value.type_info().name().to_ascii_uppercase();
    Ok(match storage.as_str() {
        "INTEGER" | "BOOLEAN" => RawValue::Integer(row.try_get_unchecked::<i64, _>(idx)?),
        "REAL" => RawValue::Real(row.try_get_unchecked::<f64, _>(idx)?),
        "BLOB" => RawValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        // TEXT and declared date/time types are all stored as text.
        _ => RawValue::Text(row.try_get_unchecked::<String, _>(idx)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const FILM_WORK_DDL: &str = "CREATE TABLE film_work (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        creation_date DATE,
        file_path TEXT,
        rating FLOAT,
        type TEXT NOT NULL,
        created_at timestamp with time zone,
        updated_at timestamp with time zone
    )";

    async fn memory_reader(films: usize) -> SqliteReader {
        let mut conn = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .connect()
            .await
            .unwrap();
        sqlx::query(FILM_WORK_DDL).execute(&mut conn).await.unwrap();
        for i in 0..films {
            sqlx::query(
                "INSERT INTO film_work (id, title, description, creation_date, rating, type, created_at, updated_at)
                 VALUES (?, ?, NULL, NULL, ?, 'movie', '2021-06-16 20:14:09.221838+00', '2021-06-16 20:14:09.221855+00')",
            )
            .bind(format!("00000000-0000-4000-8000-{:012}", i))
            .bind(format!("Film {}", i))
            .bind(5.0 + i as f64)
            .execute(&mut conn)
            .await
            .unwrap();
        }
        SqliteReader::from_connection(conn)
    }

    async fn batch_sizes(reader: &mut SqliteReader, batch_size: usize) -> Vec<usize> {
        let mut stream = reader.stream(TableKind::FilmWork, batch_size);
        let mut sizes = Vec::new();
        while let Some(batch) = stream.next_batch().await.unwrap() {
            sizes.push(batch.len());
        }
        sizes
    }

    #[tokio::test]
    async fn test_three_rows_batch_of_two() {
        let mut reader = memory_reader(3).await;
        assert_eq!(batch_sizes(&mut reader, 2).await, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_batch_count_is_ceiling() {
        let mut reader = memory_reader(10).await;
        assert_eq!(batch_sizes(&mut reader, 3).await, vec![3, 3, 3, 1]);
        assert_eq!(batch_sizes(&mut reader, 5).await, vec![5, 5]);
        assert_eq!(batch_sizes(&mut reader, 100).await, vec![10]);
    }

    #[tokio::test]
    async fn test_batches_cover_every_row_once() {
        let mut reader = memory_reader(7).await;
        let mut stream = reader.stream(TableKind::FilmWork, 3);
        let mut ids = Vec::new();
        while let Some(batch) = stream.next_batch().await.unwrap() {
            ids.extend(batch.iter().map(Record::id));
        }
        drop(stream);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 7);
    }

    #[tokio::test]
    async fn test_empty_table_yields_no_batches() {
        let mut reader = memory_reader(0).await;
        assert!(batch_sizes(&mut reader, 100).await.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_stream_stays_finished() {
        let mut reader = memory_reader(1).await;
        let mut stream = reader.stream(TableKind::FilmWork, 10);
        assert_eq!(stream.next_batch().await.unwrap().unwrap().len(), 1);
        assert!(stream.next_batch().await.unwrap().is_none());
        assert!(stream.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_records_are_typed_and_normalized() {
        let mut reader = memory_reader(1).await;
        let mut stream = reader.stream(TableKind::FilmWork, 10);
        let batch = stream.next_batch().await.unwrap().unwrap();
        match &batch[0] {
            Record::FilmWork(film) => {
                assert_eq!(film.title, "Film 0");
                assert_eq!(film.rating, Some(5.0));
                assert_eq!(film.description, None);
                assert_eq!(film.kind, "movie");
                assert_eq!(
                    film.created_at.to_rfc3339(),
                    "2021-06-16T20:14:09.221838+00:00"
                );
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_table_fails_on_first_batch() {
        let mut reader = memory_reader(0).await;
        // Opening the stream succeeds; the read error surfaces lazily.
        let mut stream = reader.stream(TableKind::Genre, 100);
        let err = stream.next_batch().await.unwrap_err();
        assert!(matches!(err, MigrateError::SourceRead { ref table, .. } if table == "genre"));
        assert!(err.is_abort());
        assert!(stream.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_row_is_table_scoped() {
        let mut reader = memory_reader(0).await;
        let conn = reader.conn.as_mut().unwrap();
        sqlx::query(
            "INSERT INTO film_work (id, title, type, created_at, updated_at)
             VALUES ('not-a-uuid', 'Broken', 'movie', '2021-06-16', '2021-06-16')",
        )
        .execute(conn)
        .await
        .unwrap();

        let mut stream = reader.stream(TableKind::FilmWork, 100);
        let err = stream.next_batch().await.unwrap_err();
        assert!(matches!(err, MigrateError::MalformedRow { .. }));
        assert!(!err.is_abort());
    }

    #[tokio::test]
    async fn test_row_count() {
        let mut reader = memory_reader(4).await;
        assert_eq!(reader.row_count(TableKind::FilmWork).await.unwrap(), 4);
        assert!(reader.row_count(TableKind::Person).await.is_err());
    }

    #[tokio::test]
    async fn test_closed_reader_fails_lazily() {
        let mut reader = memory_reader(2).await;
        reader.close().await;
        let mut stream = reader.stream(TableKind::FilmWork, 10);
        let err = stream.next_batch().await.unwrap_err();
        assert!(err.is_abort());
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.sqlite");
        let err = SqliteReader::open(&missing).await.err().unwrap();
        assert!(matches!(err, MigrateError::Pool { .. }));
        assert!(!missing.exists());
    }
}

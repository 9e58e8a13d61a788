//! Run and per-table outcome reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::schema::TableKind;
use crate::error::{MigrateError, Result};

/// Final state of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every table was migrated.
    Completed,
    /// Every table was attempted, at least one failed.
    CompletedWithErrors,
    /// A source read failure stopped the run.
    Aborted,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithErrors => "completed_with_errors",
            RunStatus::Aborted => "aborted",
        }
    }

    /// Process exit code for this outcome.
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::CompletedWithErrors => 2,
            RunStatus::Aborted => 3,
        }
    }
}

/// Outcome of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// Every batch was read and committed.
    Migrated,
    /// Processing stopped on an error; earlier batches stay committed.
    Failed,
    /// Not attempted because the run was aborted first.
    Skipped,
}

/// Per-table counters and outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    pub table: TableKind,
    pub status: TableStatus,
    /// Batches committed to the target.
    pub batches: u64,
    /// Records read from the source.
    pub rows_read: u64,
    /// Rows actually inserted (conflicting rows are not counted).
    pub rows_inserted: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableReport {
    pub(crate) fn new(table: TableKind) -> Self {
        Self {
            table,
            status: TableStatus::Skipped,
            batches: 0,
            rows_read: 0,
            rows_inserted: 0,
            error: None,
        }
    }

    pub(crate) fn fail(&mut self, err: &MigrateError) {
        self.status = TableStatus::Failed;
        self.error = Some(err.with_causes());
    }

    /// Failed after committing at least one batch.
    pub fn is_partial(&self) -> bool {
        self.status == TableStatus::Failed && self.batches > 0
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: RunStatus,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// One entry per table, in migration order.
    pub tables: Vec<TableReport>,

    /// Total records read.
    pub rows_read: u64,

    /// Total rows inserted.
    pub rows_inserted: u64,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Report for `table`, if it is part of this run.
    pub fn table(&self, table: TableKind) -> Option<&TableReport> {
        self.tables.iter().find(|r| r.table == table)
    }

    /// Tables that did not finish.
    pub fn failed_tables(&self) -> Vec<TableKind> {
        self.tables
            .iter()
            .filter(|r| r.status == TableStatus::Failed)
            .map(|r| r.table)
            .collect()
    }
}

/// Row counts of one table on both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowCountCheck {
    pub table: TableKind,
    pub source_rows: u64,
    pub target_rows: u64,
    pub matches: bool,
}

//! Migration orchestrator - main workflow coordinator.
//!
//! Tables are migrated one after another in [`TableKind::MIGRATION_ORDER`].
//! A failure while loading a table stops that table only; a failure while
//! reading the source aborts the run. Both connections are closed when the
//! run ends, whatever the outcome.

mod report;

pub use report::{MigrationResult, RowCountCheck, RunStatus, TableReport, TableStatus};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::schema::TableKind;
use crate::core::traits::{SourceReader, TargetWriter};
use crate::drivers::{PostgresWriter, SqliteReader};
use crate::error::Result;

/// Where the run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MigrationPhase {
    Idle,
    MigratingTable(TableKind),
    Aborted,
    Done,
}

/// Migration orchestrator.
pub struct Orchestrator<S, T> {
    source: S,
    target: T,
    batch_size: usize,
    phase: MigrationPhase,
}

impl Orchestrator<SqliteReader, PostgresWriter> {
    /// Open the SQLite source and connect to the PostgreSQL target.
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut source = SqliteReader::open(&config.source.path).await?;
        let target = match PostgresWriter::connect(&config.target).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };
        Ok(Self::new(source, target, config.migration.batch_size))
    }
}

impl<S: SourceReader, T: TargetWriter> Orchestrator<S, T> {
    /// Create an orchestrator over already opened stores.
    pub fn new(source: S, target: T, batch_size: usize) -> Self {
        Self {
            source,
            target,
            batch_size: batch_size.max(1),
            phase: MigrationPhase::Idle,
        }
    }

    /// Run the migration and release both connections.
    ///
    /// Table failures and aborts are reported in the result; `Err` is only
    /// returned when the target session could not be prepared.
    pub async fn run(mut self) -> Result<MigrationResult> {
        let outcome = self.migrate_all().await;
        self.source.close().await;
        self.target.close().await;
        debug!("source and target connections closed");
        outcome
    }

    /// Compare per-table row counts between source and target.
    pub async fn validate(mut self) -> Result<Vec<RowCountCheck>> {
        let outcome = self.compare_counts().await;
        self.source.close().await;
        self.target.close().await;
        outcome
    }

    fn enter(&mut self, phase: MigrationPhase) {
        debug!(from = ?self.phase, to = ?phase, "migration phase");
        if let MigrationPhase::MigratingTable(table) = phase {
            info!(table = %table, "Migrating table");
        }
        self.phase = phase;
    }

    async fn migrate_all(&mut self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting migration run: {}", run_id);

        self.target.prepare_session().await?;

        let mut reports = Vec::with_capacity(TableKind::MIGRATION_ORDER.len());
        for table in TableKind::MIGRATION_ORDER {
            if self.phase == MigrationPhase::Aborted {
                warn!(table = %table, "Skipped: migration aborted");
                reports.push(TableReport::new(table));
                continue;
            }

            self.enter(MigrationPhase::MigratingTable(table));
            let (report, abort) = self.migrate_table(table).await;
            reports.push(report);
            if abort {
                self.enter(MigrationPhase::Aborted);
            }
        }

        let status = if self.phase == MigrationPhase::Aborted {
            RunStatus::Aborted
        } else if reports.iter().any(|r| r.status == TableStatus::Failed) {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Completed
        };
        if self.phase != MigrationPhase::Aborted {
            self.enter(MigrationPhase::Done);
        }

        let completed_at = Utc::now();
        let result = MigrationResult {
            run_id,
            status,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            rows_read: reports.iter().map(|r| r.rows_read).sum(),
            rows_inserted: reports.iter().map(|r| r.rows_inserted).sum(),
            tables: reports,
        };

        info!(
            "Migration {}: {} rows read, {} rows inserted in {:.1}s",
            result.status.as_str(),
            result.rows_read,
            result.rows_inserted,
            result.duration_seconds
        );

        Ok(result)
    }

    /// Stream one table into the target.
    ///
    /// Returns the table report and whether the run must abort.
    async fn migrate_table(&mut self, table: TableKind) -> (TableReport, bool) {
        let mut report = TableReport::new(table);
        let mut stream = self.source.stream(table, self.batch_size);

        loop {
            let batch = match stream.next_batch().await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) => {
                    report.fail(&e);
                    if e.is_abort() {
                        error!(
                            table = %table,
                            batches = report.batches,
                            "Migration aborted, source read failed: {}",
                            e.with_causes()
                        );
                        return (report, true);
                    }
                    error!(
                        table = %table,
                        batches = report.batches,
                        "Table failed: {}",
                        e.with_causes()
                    );
                    return (report, false);
                }
            };

            report.rows_read += batch.len() as u64;
            match self.target.upsert(table, &batch).await {
                Ok(inserted) => {
                    report.batches += 1;
                    report.rows_inserted += inserted;
                    info!(
                        table = %table,
                        batch = report.batches,
                        rows = batch.len(),
                        inserted,
                        "Batch committed"
                    );
                }
                Err(e) => {
                    error!(
                        table = %table,
                        batches = report.batches,
                        "Table failed: {}",
                        e.with_causes()
                    );
                    report.fail(&e);
                    return (report, false);
                }
            }
        }

        report.status = TableStatus::Migrated;
        info!(
            table = %table,
            batches = report.batches,
            rows = report.rows_read,
            inserted = report.rows_inserted,
            "Table migrated"
        );
        (report, false)
    }

    async fn compare_counts(&mut self) -> Result<Vec<RowCountCheck>> {
        let mut checks = Vec::with_capacity(TableKind::MIGRATION_ORDER.len());
        for table in TableKind::MIGRATION_ORDER {
            let source_rows = self.source.row_count(table).await?;
            let target_rows = match self.target.row_count(table).await {
                Ok(n) => n,
                Err(e) => {
                    warn!("{}: cannot count target rows: {}", table, e);
                    0
                }
            };

            let matches = source_rows == target_rows;
            if matches {
                info!("{}: {} rows (match)", table, source_rows);
            } else {
                warn!(
                    "{}: source={} target={} (MISMATCH)",
                    table, source_rows, target_rows
                );
            }
            checks.push(RowCountCheck {
                table,
                source_rows,
                target_rows,
                matches,
            });
        }
        Ok(checks)
    }
}

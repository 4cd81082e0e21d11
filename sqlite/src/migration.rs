//! One-time migration of electerm data from NeDB (v1) to SQLite (v2).
//!
//! Provides the migration state detector ([`detect_state`],
//! [`is_migration_required`]), the runtime capability gate
//! ([`RuntimeSupport`]), and the engine itself ([`migrate`],
//! [`run_migration`]).
//!
//! The engine copies every table from the document store into the
//! relational store with upsert-by-`_id` writes, so a retry after a partial
//! failure never duplicates rows. Records are copied verbatim: encoded
//! passwords stay encoded. A table that fails to read or write is logged
//! and skipped; once every table has been processed a completion marker is
//! written to `dbUpgradeLog`, and from then on the detector reports
//! [`MigrationState::Completed`]. The NeDB datafiles are never touched.
//!
//! # Example
//!
//! ```no_run
//! use electerm_data_core::{AppContext, AppType};
//! use electerm_data_sqlite::{BundledSqlite, MigrationOutcome, migrate};
//!
//! let ctx = AppContext::new(AppType::Desktop, "/home/me/.config");
//! match migrate(&ctx, &BundledSqlite).unwrap() {
//!     MigrationOutcome::NotRequired(state) => println!("nothing to do ({state})"),
//!     MigrationOutcome::Migrated(report) => {
//!         println!("copied {} records", report.copied_records());
//!     }
//! }
//! ```

use std::fmt;

use chrono::Utc;
use electerm_data_core::{
    AppContext, Backend, ID_FIELD, Record, RecordStore, StoreError, Table,
};
use electerm_data_nedb::{NedbStore, data_files_exist};
use rusqlite::OptionalExtension;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::convert::row_to_record;
use crate::error::{MigrationError, Result};
use crate::schema::{table_exists, table_ident};
use crate::store::{SqliteStore, database_path, open_read_only_connection};

/// `_id` of the completion marker in `dbUpgradeLog`.
pub const MIGRATION_MARKER_ID: &str = "migrate-1-to-2";

/// Data format generation recorded in the marker.
pub const MIGRATED_VERSION: &str = "2";

/// Oldest SQLite that supports `INSERT .. ON CONFLICT DO UPDATE` (3.24.0).
pub const MIN_SQLITE_VERSION: i32 = 3_024_000;

/// Where an installation stands with respect to the v1 to v2 migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// No NeDB datafiles and no completion marker: nothing to migrate.
    Fresh,
    /// NeDB datafiles exist and the SQLite database does not.
    NotStarted,
    /// The SQLite database exists but holds no completion marker.
    InProgress,
    /// The completion marker is present.
    Completed,
}

impl MigrationState {
    pub fn is_migration_required(self) -> bool {
        matches!(self, MigrationState::NotStarted | MigrationState::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MigrationState::Fresh => "fresh",
            MigrationState::NotStarted => "not started",
            MigrationState::InProgress => "in progress",
            MigrationState::Completed => "completed",
        }
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inspects the on-disk stores of `ctx`. Never writes.
pub fn detect_state(ctx: &AppContext) -> MigrationState {
    let has_nedb = data_files_exist(ctx);
    let db_path = database_path(ctx);

    if !db_path.exists() {
        return if has_nedb {
            MigrationState::NotStarted
        } else {
            MigrationState::Fresh
        };
    }

    match read_marker(ctx) {
        Ok(Some(_)) => MigrationState::Completed,
        Ok(None) if has_nedb => MigrationState::InProgress,
        Ok(None) => MigrationState::Fresh,
        Err(e) if has_nedb => {
            warn!(path = %db_path.display(), error = %e, "Unreadable SQLite database, treating migration as unfinished");
            MigrationState::InProgress
        }
        Err(e) => {
            warn!(path = %db_path.display(), error = %e, "Unreadable SQLite database");
            MigrationState::Fresh
        }
    }
}

/// `true` iff NeDB datafiles exist and the SQLite database lacks the
/// completion marker.
pub fn is_migration_required(ctx: &AppContext) -> bool {
    detect_state(ctx).is_migration_required()
}

/// Reads the completion marker from an existing database without
/// modifying it.
pub fn read_marker(ctx: &AppContext) -> Result<Option<Record>> {
    let conn = open_read_only_connection(&database_path(ctx))?;
    if !table_exists(&conn, Table::DbUpgradeLog)? {
        return Ok(None);
    }
    let data = conn
        .query_row(
            &format!(
                "SELECT data FROM {} WHERE _id = ?1",
                table_ident(Table::DbUpgradeLog)
            ),
            [MIGRATION_MARKER_ID],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    data.map(|data| row_to_record(MIGRATION_MARKER_ID.to_string(), &data))
        .transpose()
}

/// Backend that currently holds the user's data: NeDB while a migration
/// is pending or no SQLite database exists, SQLite afterwards.
pub fn authoritative_backend(ctx: &AppContext) -> Backend {
    if is_migration_required(ctx) || !database_path(ctx).exists() {
        Backend::Nedb
    } else {
        Backend::Sqlite
    }
}

/// Opens the authoritative store for reading. The SQLite store is opened
/// read-only, and the NeDB store only creates files when written to.
pub fn open_authoritative(ctx: &AppContext) -> Result<Box<dyn RecordStore>> {
    Ok(match authoritative_backend(ctx) {
        Backend::Nedb => Box::new(NedbStore::new(ctx.clone())),
        Backend::Sqlite => Box::new(SqliteStore::open_read_only(ctx.clone())?),
    })
}

/// Capability gate for the relational engine.
pub trait RuntimeSupport {
    /// Returns `Err` with a human-readable reason when the relational store
    /// cannot be used.
    fn check(&self) -> std::result::Result<(), String>;
}

/// Gate for the SQLite library linked into this binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledSqlite;

impl RuntimeSupport for BundledSqlite {
    fn check(&self) -> std::result::Result<(), String> {
        if rusqlite::version_number() >= MIN_SQLITE_VERSION {
            Ok(())
        } else {
            Err(format!(
                "SQLite {} is older than the required 3.24.0",
                rusqlite::version()
            ))
        }
    }
}

/// Phase of a table copy that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStage {
    Read,
    Write,
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MigrationStage::Read => "read",
            MigrationStage::Write => "write",
        })
    }
}

/// Result of copying one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    /// Every record was written.
    Copied { records: usize },
    /// The table was skipped; `written` records reached the sink first.
    Failed {
        stage: MigrationStage,
        written: usize,
        error: String,
    },
}

impl TableOutcome {
    /// Records written to the relational store for this table.
    pub fn written(&self) -> usize {
        match self {
            TableOutcome::Copied { records } => *records,
            TableOutcome::Failed { written, .. } => *written,
        }
    }
}

/// Per-table outcomes of a completed migration run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub tables: Vec<(Table, TableOutcome)>,
    /// The completion marker as written.
    pub marker: Record,
}

impl MigrationReport {
    /// Tables that failed and were skipped.
    pub fn skipped_tables(&self) -> Vec<Table> {
        self.tables
            .iter()
            .filter(|(_, outcome)| matches!(outcome, TableOutcome::Failed { .. }))
            .map(|(table, _)| *table)
            .collect()
    }

    pub fn copied_records(&self) -> usize {
        self.tables.iter().map(|(_, outcome)| outcome.written()).sum()
    }

    /// `true` when no table was skipped.
    pub fn is_clean(&self) -> bool {
        self.skipped_tables().is_empty()
    }
}

/// What [`migrate`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    /// Nothing was written; the detector found no pending migration.
    NotRequired(MigrationState),
    /// Tables were copied and the completion marker was written.
    Migrated(MigrationReport),
}

/// Migrates the data of `ctx` from NeDB into SQLite, if required.
///
/// # Errors
///
/// - [`MigrationError::UnsupportedRuntime`] when `runtime` rejects SQLite;
///   checked before anything else.
/// - [`MigrationError::Open`] when the SQLite database cannot be created.
/// - [`MigrationError::Incomplete`] when the completion marker could not be
///   written. Re-running is safe.
pub fn migrate(
    ctx: &AppContext,
    runtime: &dyn RuntimeSupport,
) -> std::result::Result<MigrationOutcome, MigrationError> {
    runtime.check().map_err(MigrationError::UnsupportedRuntime)?;

    let state = detect_state(ctx);
    if !state.is_migration_required() {
        info!(%state, "Migration not required");
        return Ok(MigrationOutcome::NotRequired(state));
    }

    info!(%state, user = ctx.user(), "Starting migration from NeDB to SQLite");
    let mut source = NedbStore::new(ctx.clone());
    let mut sink = SqliteStore::open(ctx.clone())?;
    let report = run_migration(&mut source, &mut sink, &Table::ALL)?;
    Ok(MigrationOutcome::Migrated(report))
}

/// Copies `tables` from `source` into `sink`, then writes the completion
/// marker into `sink`'s `dbUpgradeLog`.
///
/// Tables are processed in order, one at a time. A table whose read or
/// write fails is recorded as [`TableOutcome::Failed`] and left in whatever
/// partial state it reached; the run continues with the next table.
pub fn run_migration(
    source: &mut dyn RecordStore,
    sink: &mut dyn RecordStore,
    tables: &[Table],
) -> std::result::Result<MigrationReport, MigrationError> {
    let all = Record::new();
    let mut report = MigrationReport::default();

    for &table in tables {
        let records = match source.find(table, &all) {
            Ok(records) => records,
            Err(e) => {
                warn!(%table, error = %e, "Skipping table: failed to read source");
                report.tables.push((
                    table,
                    TableOutcome::Failed {
                        stage: MigrationStage::Read,
                        written: 0,
                        error: e.to_string(),
                    },
                ));
                continue;
            }
        };

        let total = records.len();
        let outcome = match copy_records(sink, table, records) {
            Ok(written) => {
                info!(%table, records = written, "Migrated table");
                TableOutcome::Copied { records: written }
            }
            Err((written, e)) => {
                warn!(%table, written, total, error = %e, "Skipping table: failed to write");
                TableOutcome::Failed {
                    stage: MigrationStage::Write,
                    written,
                    error: e.to_string(),
                }
            }
        };
        report.tables.push((table, outcome));
    }

    report.marker = completion_marker(&report);
    sink.upsert(Table::DbUpgradeLog, report.marker.clone())
        .map_err(MigrationError::Incomplete)?;

    let skipped = report.skipped_tables();
    if skipped.is_empty() {
        info!(records = report.copied_records(), "Migration completed");
    } else {
        warn!(?skipped, "Migration completed with skipped tables");
    }
    Ok(report)
}

/// Upserts `records` one by one, stopping at the first failure.
fn copy_records(
    sink: &mut dyn RecordStore,
    table: Table,
    records: Vec<Record>,
) -> std::result::Result<usize, (usize, StoreError)> {
    let mut written = 0;
    for record in records {
        sink.upsert(table, record).map_err(|e| (written, e))?;
        written += 1;
    }
    debug!(%table, written, "Copied records");
    Ok(written)
}

fn completion_marker(report: &MigrationReport) -> Record {
    let counts: Record = report
        .tables
        .iter()
        .map(|(table, outcome)| (table.as_str().to_string(), Value::from(outcome.written())))
        .collect();

    let mut marker = Record::new();
    marker.insert(ID_FIELD.to_string(), Value::from(MIGRATION_MARKER_ID));
    marker.insert("version".to_string(), Value::from(MIGRATED_VERSION));
    marker.insert("migratedAt".to_string(), Value::from(Utc::now().to_rfc3339()));
    marker.insert("tables".to_string(), Value::Object(counts));
    marker
}

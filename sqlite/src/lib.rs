//! SQLite (v2) storage backend and the NeDB to SQLite migration engine for
//! electerm user data.
//!
//! # Architecture
//!
//! - **`schema`**: one `(_id, data)` table per [`Table`](electerm_data_core::Table),
//!   versioned through `PRAGMA user_version`
//! - **`convert`**: [`Record`](electerm_data_core::Record) to row conversion
//! - **`store`**: [`SqliteStore`], the relational
//!   [`RecordStore`](electerm_data_core::RecordStore) implementation
//! - **`migration`**: state detection, the runtime capability gate, and
//!   the one-time copy from the document store
//!
//! # Quick start
//!
//! ```no_run
//! use electerm_data_core::{AppContext, AppType, Table, export_all};
//! use electerm_data_sqlite::{BundledSqlite, is_migration_required, migrate, open_authoritative};
//!
//! let ctx = AppContext::new(AppType::Desktop, "/home/me/.config");
//! if is_migration_required(&ctx) {
//!     migrate(&ctx, &BundledSqlite).unwrap();
//! }
//!
//! let mut store = open_authoritative(&ctx).unwrap();
//! let snapshot = export_all(store.as_mut(), &Table::ALL);
//! println!("{} records", snapshot.total_records());
//! ```

mod convert;
mod error;
mod migration;
mod schema;
mod store;

pub use error::{MigrationError, Result, SqliteError};
pub use migration::{
    BundledSqlite, MIGRATED_VERSION, MIGRATION_MARKER_ID, MIN_SQLITE_VERSION, MigrationOutcome,
    MigrationReport, MigrationStage, MigrationState, RuntimeSupport, TableOutcome,
    authoritative_backend, detect_state, is_migration_required, migrate, open_authoritative,
    read_marker, run_migration,
};
pub use schema::{SCHEMA_VERSION, apply_schema, generate_schema_sql, schema_version};
pub use store::{DATABASE_FILE, SqliteStore, database_path};

//! [`RecordStore`] implementation over the single-file SQLite database.
//!
//! Queries are evaluated with the same matcher the document store uses:
//! rows are loaded in `_id` order, decoded, and filtered in memory. Every
//! mutation commits before returning.

use std::fs;
use std::path::{Path, PathBuf};

use electerm_data_core::{
    AppContext, Backend, OperationKind, Record, RecordStore, StoreError, Table, apply_update,
    ensure_record_id, matches, record_id,
};
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension, params};
use tracing::debug;

use crate::convert::{record_to_data, row_to_record};
use crate::error::{Result, SqliteError};
use crate::schema::{apply_schema, table_ident};

/// File name of the relational store inside the user directory.
pub const DATABASE_FILE: &str = "electerm.db";

/// `<dataRoot>/<namespace>/users/<user>/electerm.db`.
pub fn database_path(ctx: &AppContext) -> PathBuf {
    ctx.user_dir(Backend::Sqlite).join(DATABASE_FILE)
}

/// Record store over the SQLite database of one [`AppContext`].
///
/// # Examples
///
/// ```no_run
/// use electerm_data_core::{AppContext, AppType, Record, RecordStore, Table};
/// use electerm_data_sqlite::SqliteStore;
///
/// let mut store = SqliteStore::open(AppContext::new(AppType::Desktop, "/tmp/electerm")).unwrap();
/// let bookmarks = store.find(Table::Bookmarks, &Record::new()).unwrap();
/// println!("{} bookmarks", bookmarks.len());
/// ```
#[derive(Debug)]
pub struct SqliteStore {
    ctx: AppContext,
    path: PathBuf,
    conn: Connection,
}

impl SqliteStore {
    /// Opens the database for `ctx`, creating the file, its directory and
    /// any missing tables.
    pub fn open(ctx: AppContext) -> Result<Self> {
        let path = database_path(&ctx);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut conn = Connection::open(&path)?;
        apply_schema(&mut conn)?;
        debug!(path = %path.display(), "Opened SQLite database");
        Ok(Self { ctx, path, conn })
    }

    /// Opens an existing database without creating or altering anything.
    /// Writes through a read-only store fail.
    pub fn open_read_only(ctx: AppContext) -> Result<Self> {
        let path = database_path(&ctx);
        let conn = open_read_only_connection(&path)?;
        Ok(Self { ctx, path, conn })
    }

    /// Opens a private in-memory database with the full schema.
    pub fn open_in_memory(ctx: AppContext) -> Result<Self> {
        let path = database_path(&ctx);
        let mut conn = Connection::open_in_memory()?;
        apply_schema(&mut conn)?;
        Ok(Self { ctx, path, conn })
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_rows(&self, table: Table) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT _id, data FROM {} ORDER BY _id",
            table_ident(table)
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, data) = row?;
            records.push(row_to_record(id, &data)?);
        }
        Ok(records)
    }

    fn find_records(&self, table: Table, query: &Record) -> Result<Vec<Record>> {
        let mut found = Vec::new();
        for record in self.load_rows(table)? {
            if matches(&record, query)? {
                found.push(record);
            }
        }
        Ok(found)
    }

    fn find_first(&self, table: Table, query: &Record) -> Result<Option<Record>> {
        if let Some(id) = exact_id(query) {
            return self.load_by_id(table, id);
        }
        for record in self.load_rows(table)? {
            if matches(&record, query)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn load_by_id(&self, table: Table, id: &str) -> Result<Option<Record>> {
        let data = self
            .conn
            .query_row(
                &format!("SELECT data FROM {} WHERE _id = ?1", table_ident(table)),
                [id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        data.map(|data| row_to_record(id.to_string(), &data))
            .transpose()
    }

    fn write(&mut self, table: Table, mut record: Record, replace: bool) -> Result<Record> {
        let id = ensure_record_id(&mut record)?;
        let data = record_to_data(&record)?;
        let ident = table_ident(table);

        if replace {
            self.conn.execute(
                &format!(
                    "INSERT INTO {ident} (_id, data) VALUES (?1, ?2) \
                     ON CONFLICT(_id) DO UPDATE SET data = excluded.data"
                ),
                params![id, data],
            )?;
            return Ok(record);
        }

        match self.conn.execute(
            &format!("INSERT INTO {ident} (_id, data) VALUES (?1, ?2)"),
            params![id, data],
        ) {
            Ok(_) => Ok(record),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(SqliteError::DuplicateId(id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_records(
        &mut self,
        table: Table,
        query: &Record,
        changes: &Record,
        multi: bool,
    ) -> Result<usize> {
        let mut updated = Vec::new();
        for record in self.find_records(table, query)? {
            let Some(id) = record_id(&record).map(str::to_owned) else {
                continue;
            };
            updated.push((id, apply_update(&record, changes)?));
            if !multi {
                break;
            }
        }

        let sql = format!("UPDATE {} SET data = ?2 WHERE _id = ?1", table_ident(table));
        let tx = self.conn.transaction()?;
        for (id, record) in &updated {
            tx.execute(&sql, params![id, record_to_data(record)?])?;
        }
        tx.commit()?;
        Ok(updated.len())
    }

    fn remove_records(&mut self, table: Table, query: &Record, multi: bool) -> Result<usize> {
        let mut ids = Vec::new();
        for record in self.find_records(table, query)? {
            if let Some(id) = record_id(&record) {
                ids.push(id.to_string());
            }
            if !multi {
                break;
            }
        }

        let sql = format!("DELETE FROM {} WHERE _id = ?1", table_ident(table));
        let tx = self.conn.transaction()?;
        for id in &ids {
            tx.execute(&sql, [id])?;
        }
        tx.commit()?;
        Ok(ids.len())
    }

    fn vacuum(&mut self) -> Result<()> {
        self.conn.execute_batch("VACUUM;")?;
        debug!(path = %self.path.display(), "Vacuumed SQLite database");
        Ok(())
    }

    fn wrap(table: Table, operation: OperationKind) -> impl FnOnce(SqliteError) -> StoreError {
        move |e| StoreError::new(Backend::Sqlite, table, operation, e)
    }
}

/// Read-only connection to an existing database file.
pub(crate) fn open_read_only_connection(path: &Path) -> Result<Connection> {
    if !path.exists() {
        return Err(SqliteError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }
    Ok(Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?)
}

/// `Some(id)` when the query is exactly `{ "_id": "<id>" }`.
fn exact_id(query: &Record) -> Option<&str> {
    if query.len() == 1 { record_id(query) } else { None }
}

impl RecordStore for SqliteStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn location(&self, _table: Table) -> PathBuf {
        self.path.clone()
    }

    fn find(&mut self, table: Table, query: &Record) -> std::result::Result<Vec<Record>, StoreError> {
        self.find_records(table, query)
            .map_err(Self::wrap(table, OperationKind::Find))
    }

    fn find_one(
        &mut self,
        table: Table,
        query: &Record,
    ) -> std::result::Result<Option<Record>, StoreError> {
        self.find_first(table, query)
            .map_err(Self::wrap(table, OperationKind::FindOne))
    }

    fn insert(&mut self, table: Table, record: Record) -> std::result::Result<Record, StoreError> {
        self.write(table, record, false)
            .map_err(Self::wrap(table, OperationKind::Insert))
    }

    fn upsert(&mut self, table: Table, record: Record) -> std::result::Result<Record, StoreError> {
        self.write(table, record, true)
            .map_err(Self::wrap(table, OperationKind::Upsert))
    }

    fn update(
        &mut self,
        table: Table,
        query: &Record,
        changes: &Record,
        multi: bool,
    ) -> std::result::Result<usize, StoreError> {
        self.update_records(table, query, changes, multi)
            .map_err(Self::wrap(table, OperationKind::Update))
    }

    fn remove(
        &mut self,
        table: Table,
        query: &Record,
        multi: bool,
    ) -> std::result::Result<usize, StoreError> {
        self.remove_records(table, query, multi)
            .map_err(Self::wrap(table, OperationKind::Remove))
    }

    /// SQLite keeps every table in one file, so compaction vacuums the
    /// whole database regardless of `table`.
    fn compact(&mut self, table: Table) -> std::result::Result<(), StoreError> {
        self.vacuum()
            .map_err(Self::wrap(table, OperationKind::Compact))
    }
}

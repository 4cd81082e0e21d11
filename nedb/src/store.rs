//! [`RecordStore`] implementation over NeDB datafiles.
//!
//! Each table is loaded on first use and cached for the lifetime of the
//! store. Every write appends to the datafile before returning, so nothing
//! is buffered across calls. Reads see dates as RFC 3339 strings; the
//! datafile keeps NeDB's `$$date` form.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;

use electerm_data_core::{
    AppContext, Backend, OperationKind, Record, RecordStore, StoreError, Table,
    apply_update, ensure_record_id, matches, record_id,
};
use tracing::debug;

use crate::datafile::{self, Datafile, deserialize_dates, temp_path};
use crate::error::{NedbError, Result};

/// Datafile path for `table`:
/// `<dataRoot>/<namespace>/users/<user>/electerm.<table>.nedb`.
pub fn datafile_path(ctx: &AppContext, table: Table) -> PathBuf {
    ctx.user_dir(Backend::Nedb)
        .join(format!("electerm.{}.nedb", table.as_str()))
}

/// Returns `true` if any table's datafile (or its `~` sibling) exists.
pub fn data_files_exist(ctx: &AppContext) -> bool {
    Table::ALL.iter().any(|&table| {
        let path = datafile_path(ctx, table);
        path.exists() || temp_path(&path).exists()
    })
}

/// Document store over the NeDB datafiles of one [`AppContext`].
///
/// # Examples
///
/// ```no_run
/// use electerm_data_core::{AppContext, AppType, Record, RecordStore, Table};
/// use electerm_data_nedb::NedbStore;
/// use serde_json::json;
///
/// let mut store = NedbStore::new(AppContext::new(AppType::Desktop, "/tmp/electerm"));
/// let record = json!({ "_id": "q1", "name": "uptime", "command": "uptime" })
///     .as_object()
///     .cloned()
///     .unwrap();
/// store.insert(Table::QuickCommands, record).unwrap();
/// store.compact(Table::QuickCommands).unwrap();
/// ```
#[derive(Debug)]
pub struct NedbStore {
    ctx: AppContext,
    tables: HashMap<Table, Datafile>,
}

impl NedbStore {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            tables: HashMap::new(),
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Drops cached table state so the next access re-reads from disk.
    pub fn reload(&mut self) {
        self.tables.clear();
    }

    fn datafile(&mut self, table: Table) -> Result<&mut Datafile> {
        let path = datafile_path(&self.ctx, table);
        match self.tables.entry(table) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let loaded = Datafile::load(&path)?;
                debug!(
                    %table,
                    path = %path.display(),
                    docs = loaded.len(),
                    skipped = loaded.skipped(),
                    "Loaded datafile"
                );
                Ok(entry.insert(loaded))
            }
        }
    }

    fn matching_ids(&mut self, table: Table, query: &Record, multi: bool) -> Result<Vec<String>> {
        let df = self.datafile(table)?;
        let mut ids = Vec::new();
        for doc in df.docs() {
            if matches(&deserialize_dates(doc), query)? {
                if let Some(id) = record_id(doc) {
                    ids.push(id.to_string());
                }
                if !multi {
                    break;
                }
            }
        }
        Ok(ids)
    }

    fn write(&mut self, table: Table, mut record: Record, replace: bool) -> Result<Record> {
        let id = ensure_record_id(&mut record)?;
        let path = datafile_path(&self.ctx, table);
        let df = self.datafile(table)?;
        if !replace && df.contains(&id) {
            return Err(NedbError::DuplicateId(id));
        }
        datafile::append_lines(&path, &[datafile::document_line(&record)?])?;
        df.put(id, record.clone());
        Ok(record)
    }

    fn find_records(&mut self, table: Table, query: &Record) -> Result<Vec<Record>> {
        let df = self.datafile(table)?;
        let mut found = Vec::new();
        for doc in df.docs() {
            let doc = deserialize_dates(doc);
            if matches(&doc, query)? {
                found.push(doc);
            }
        }
        Ok(found)
    }

    fn find_first(&mut self, table: Table, query: &Record) -> Result<Option<Record>> {
        let df = self.datafile(table)?;
        for doc in df.docs() {
            let doc = deserialize_dates(doc);
            if matches(&doc, query)? {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    fn update_records(
        &mut self,
        table: Table,
        query: &Record,
        changes: &Record,
        multi: bool,
    ) -> Result<usize> {
        let ids = self.matching_ids(table, query, multi)?;
        let path = datafile_path(&self.ctx, table);
        let df = self.datafile(table)?;

        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = df.get(&id) {
                updated.push((id, apply_update(doc, changes)?));
            }
        }
        let lines = updated
            .iter()
            .map(|(_, doc)| datafile::document_line(doc))
            .collect::<Result<Vec<_>>>()?;
        datafile::append_lines(&path, &lines)?;

        let count = updated.len();
        for (id, doc) in updated {
            df.put(id, doc);
        }
        Ok(count)
    }

    fn remove_records(&mut self, table: Table, query: &Record, multi: bool) -> Result<usize> {
        let ids = self.matching_ids(table, query, multi)?;
        let path = datafile_path(&self.ctx, table);
        let lines = ids
            .iter()
            .map(|id| datafile::deletion_line(id))
            .collect::<Result<Vec<_>>>()?;
        datafile::append_lines(&path, &lines)?;

        let df = self.datafile(table)?;
        for id in &ids {
            df.delete(id);
        }
        Ok(ids.len())
    }

    fn compact_table(&mut self, table: Table) -> Result<()> {
        let path = datafile_path(&self.ctx, table);
        let exists = path.exists() || temp_path(&path).exists();
        let df = self.datafile(table)?;
        if !exists && df.is_empty() {
            return Ok(());
        }
        let content = df.to_compacted()?;
        datafile::write_atomic(&path, &content)?;
        debug!(%table, "Compacted datafile");
        Ok(())
    }

    fn wrap(table: Table, operation: OperationKind) -> impl FnOnce(NedbError) -> StoreError {
        move |e| StoreError::new(Backend::Nedb, table, operation, e)
    }
}

impl RecordStore for NedbStore {
    fn backend(&self) -> Backend {
        Backend::Nedb
    }

    fn location(&self, table: Table) -> PathBuf {
        datafile_path(&self.ctx, table)
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

    fn compact(&mut self, table: Table) -> std::result::Result<(), StoreError> {
        self.compact_table(table)
            .map_err(Self::wrap(table, OperationKind::Compact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use electerm_data_core::AppType;
    use serde_json::{Value, json};

    fn obj(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn id_query(id: &str) -> Record {
        obj(json!({ "_id": id }))
    }

    #[test]
    fn test_datafile_path_layout() {
        let ctx = AppContext::new(AppType::Desktop, "/data");
        assert_eq!(
            datafile_path(&ctx, Table::BookmarkGroups),
            PathBuf::from("/data/electerm/users/default_user/electerm.bookmarkGroups.nedb")
        );
        let web = AppContext::new(AppType::Web, "/data");
        assert_eq!(
            datafile_path(&web, Table::Log),
            PathBuf::from("/data/nedb-database/users/default_user/electerm.log.nedb")
        );
    }

    #[test]
    fn test_find_one_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = NedbStore::new(AppContext::new(AppType::Desktop, dir.path()));
        store
            .insert(Table::Profiles, obj(json!({ "_id": "p1", "name": "work" })))
            .unwrap();
        let found = store.find_one(Table::Profiles, &id_query("p1")).unwrap();
        assert_eq!(found.unwrap()["name"], json!("work"));
        assert!(store.find_one(Table::Profiles, &id_query("p2")).unwrap().is_none());
    }

    #[test]
    fn test_reads_deserialize_dates_and_writes_keep_them() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::new(AppType::Desktop, dir.path());
        let path = datafile_path(&ctx, Table::Log);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{\"_id\":\"l1\",\"time\":{\"$$date\":1700000000000}}\n").unwrap();

        let mut store = NedbStore::new(ctx);
        let by_time = obj(json!({ "time": "2023-11-14T22:13:20.000Z" }));
        assert_eq!(
            store.find(Table::Log, &by_time).unwrap(),
            vec![obj(json!({ "_id": "l1", "time": "2023-11-14T22:13:20.000Z" }))]
        );

        let changes = obj(json!({ "$set": { "level": "info" } }));
        assert_eq!(store.update(Table::Log, &id_query("l1"), &changes, false).unwrap(), 1);
        store.compact(Table::Log).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"time\":{\"$$date\":1700000000000}"));
    }
}

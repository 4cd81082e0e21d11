//! Integration tests for the electerm-data-nedb crate.

use std::fs;

use electerm_data_core::{
    AppContext, AppType, GENERATED_ID_LEN, Operation, Outcome, Record, RecordStore, Table,
};
use electerm_data_nedb::{NedbStore, data_files_exist, datafile_path};
use serde_json::{Value, json};
use tempfile::TempDir;

fn obj(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn store_in(dir: &TempDir) -> NedbStore {
    NedbStore::new(AppContext::new(AppType::Desktop, dir.path()))
}

fn ids(records: &[Record]) -> Vec<&str> {
    records.iter().map(|r| r["_id"].as_str().unwrap()).collect()
}

#[test]
fn test_insert_and_find_in_id_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);

    store
        .insert(Table::Bookmarks, obj(json!({ "_id": "b2", "host": "two" })))
        .unwrap();
    store
        .insert(Table::Bookmarks, obj(json!({ "_id": "b1", "host": "one" })))
        .unwrap();

    let all = store.find(Table::Bookmarks, &Record::new()).unwrap();
    assert_eq!(ids(&all), vec!["b1", "b2"]);

    let hosts = store
        .find(Table::Bookmarks, &obj(json!({ "host": "two" })))
        .unwrap();
    assert_eq!(ids(&hosts), vec!["b2"]);
}

#[test]
fn test_insert_generates_id() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);

    let written = store
        .insert(Table::QuickCommands, obj(json!({ "name": "uptime" })))
        .unwrap();
    let id = written["_id"].as_str().unwrap();
    assert_eq!(id.len(), GENERATED_ID_LEN);

    let found = store
        .find_one(Table::QuickCommands, &obj(json!({ "_id": id })))
        .unwrap();
    assert_eq!(found.unwrap()["name"], json!("uptime"));
}

#[test]
fn test_insert_rejects_duplicate_id() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);

    store
        .insert(Table::Profiles, obj(json!({ "_id": "p1" })))
        .unwrap();
    let err = store
        .insert(Table::Profiles, obj(json!({ "_id": "p1", "name": "again" })))
        .unwrap_err();
    assert!(err.to_string().contains("insert"));
    assert!(err.to_string().contains("profiles"));
}

#[test]
fn test_upsert_replaces_existing_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);

    store
        .upsert(Table::Bookmarks, obj(json!({ "_id": "b1", "host": "old", "port": 22 })))
        .unwrap();
    store
        .upsert(Table::Bookmarks, obj(json!({ "_id": "b1", "host": "new" })))
        .unwrap();

    let all = store.find(Table::Bookmarks, &Record::new()).unwrap();
    assert_eq!(all, vec![obj(json!({ "_id": "b1", "host": "new" }))]);
}

#[test]
fn test_update_single_and_multi() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);
    for id in ["a", "b", "c"] {
        store
            .insert(Table::Log, obj(json!({ "_id": id, "level": "info" })))
            .unwrap();
    }

    let query = obj(json!({ "level": "info" }));
    let one = store
        .update(
            Table::Log,
            &query,
            &obj(json!({ "$set": { "level": "warn" } })),
            false,
        )
        .unwrap();
    assert_eq!(one, 1);

    let rest = store
        .update(
            Table::Log,
            &query,
            &obj(json!({ "$set": { "seen": true } })),
            true,
        )
        .unwrap();
    assert_eq!(rest, 2);

    let warn = store
        .find(Table::Log, &obj(json!({ "level": "warn" })))
        .unwrap();
    assert_eq!(ids(&warn), vec!["a"]);
    let seen = store
        .find(Table::Log, &obj(json!({ "seen": true })))
        .unwrap();
    assert_eq!(ids(&seen), vec!["b", "c"]);
}

#[test]
fn test_remove_single_and_multi() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);
    for id in ["a", "b", "c"] {
        store
            .insert(Table::LastStates, obj(json!({ "_id": id, "kind": "ssh" })))
            .unwrap();
    }

    let query = obj(json!({ "kind": "ssh" }));
    assert_eq!(store.remove(Table::LastStates, &query, false).unwrap(), 1);
    assert_eq!(store.remove(Table::LastStates, &query, true).unwrap(), 2);
    assert_eq!(store.remove(Table::LastStates, &query, true).unwrap(), 0);
    assert!(store.find(Table::LastStates, &Record::new()).unwrap().is_empty());
}

#[test]
fn test_writes_persist_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = store_in(&dir);
        store
            .insert(Table::Bookmarks, obj(json!({ "_id": "b1", "host": "one" })))
            .unwrap();
        store
            .insert(Table::Bookmarks, obj(json!({ "_id": "b2", "host": "two" })))
            .unwrap();
        store
            .remove(Table::Bookmarks, &obj(json!({ "_id": "b2" })), false)
            .unwrap();
        store
            .update(
                Table::Bookmarks,
                &obj(json!({ "_id": "b1" })),
                &obj(json!({ "$set": { "port": 2222 } })),
                false,
            )
            .unwrap();
    }

    let mut reopened = store_in(&dir);
    let all = reopened.find(Table::Bookmarks, &Record::new()).unwrap();
    assert_eq!(
        all,
        vec![obj(json!({ "_id": "b1", "host": "one", "port": 2222 }))]
    );
}

#[test]
fn test_compact_rewrites_live_documents_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);
    store
        .insert(Table::TerminalThemes, obj(json!({ "_id": "t1" })))
        .unwrap();
    store
        .insert(Table::TerminalThemes, obj(json!({ "_id": "t2" })))
        .unwrap();
    store
        .remove(Table::TerminalThemes, &obj(json!({ "_id": "t1" })), false)
        .unwrap();

    let path = datafile_path(store.context(), Table::TerminalThemes);
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);

    store.compact(Table::TerminalThemes).unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content, "{\"_id\":\"t2\"}\n");

    store.reload();
    let all = store.find(Table::TerminalThemes, &Record::new()).unwrap();
    assert_eq!(ids(&all), vec!["t2"]);
}

#[test]
fn test_reads_do_not_create_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);

    assert!(store.find(Table::Bookmarks, &Record::new()).unwrap().is_empty());
    store.compact(Table::Bookmarks).unwrap();

    assert!(!datafile_path(store.context(), Table::Bookmarks).exists());
    assert!(!data_files_exist(store.context()));
}

#[test]
fn test_corrupt_datafile_reports_store_error() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = AppContext::new(AppType::Desktop, dir.path());
    let path = datafile_path(&ctx, Table::Log);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "not json\n{\"_id\":\"ok\"}\n{broken\n").unwrap();

    let mut store = NedbStore::new(ctx);
    let err = store.find(Table::Log, &Record::new()).unwrap_err();
    assert_eq!(err.table, Table::Log);
    assert!(err.to_string().starts_with("nedb find on table 'log' failed"));

    // Other tables are unaffected.
    assert!(store.find(Table::Bookmarks, &Record::new()).unwrap().is_empty());
}

#[test]
fn test_data_files_exist_after_write() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = NedbStore::new(AppContext::new(AppType::Web, dir.path()));
    assert!(!data_files_exist(store.context()));

    store
        .insert(Table::AddressBookmarks, obj(json!({ "_id": "a1" })))
        .unwrap();
    assert!(data_files_exist(store.context()));
    assert!(
        dir.path()
            .join("nedb-database/users/default_user/electerm.addressBookmarks.nedb")
            .exists()
    );
}

#[test]
fn test_reads_existing_nedb_file_with_history() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = AppContext::new(AppType::Desktop, dir.path()).with_user("alice");
    let path = datafile_path(&ctx, Table::BookmarkGroups);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        &path,
        concat!(
            "{\"_id\":\"default\",\"title\":\"Default\",\"bookmarkIds\":[]}\n",
            "{\"$$indexCreated\":{\"fieldName\":\"title\"}}\n",
            "{\"_id\":\"g1\",\"title\":\"Servers\"}\n",
            "{\"_id\":\"default\",\"title\":\"Default\",\"bookmarkIds\":[\"b1\"]}\n",
            "{\"$$deleted\":true,\"_id\":\"g1\"}\n",
        ),
    )
    .unwrap();

    let mut store = NedbStore::new(ctx);
    let all = store.find(Table::BookmarkGroups, &Record::new()).unwrap();
    assert_eq!(
        all,
        vec![obj(json!({ "_id": "default", "title": "Default", "bookmarkIds": ["b1"] }))]
    );
    let tagged = store
        .find(Table::BookmarkGroups, &obj(json!({ "bookmarkIds": "b1" })))
        .unwrap();
    assert_eq!(tagged.len(), 1);
}

#[test]
fn test_execute_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);

    let outcome = store
        .execute(
            Table::Data,
            Operation::Upsert(obj(json!({ "_id": "config", "value": { "theme": "dark" } }))),
        )
        .unwrap();
    assert!(matches!(outcome, Outcome::Written(_)));

    let removed = store
        .execute(
            Table::Data,
            Operation::Remove {
                query: obj(json!({ "_id": "config" })),
                multi: false,
            },
        )
        .unwrap();
    assert_eq!(removed, Outcome::Count(1));
    assert_eq!(
        store.execute(Table::Data, Operation::Compact).unwrap(),
        Outcome::Done
    );
}

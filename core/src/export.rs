//! Snapshot export through any [`RecordStore`].
//!
//! [`export_all`] reads every requested table, decodes shifted passwords,
//! and folds the results into a single [`Snapshot`]. A table that cannot be
//! read is exported as an empty list and reported in
//! [`Snapshot::failed_tables`]; the export as a whole never aborts.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use tracing::{info, warn};

use crate::codec;
use crate::store::RecordStore;
use crate::types::{CONFIG_ID, ID_FIELD, Record, Table};

/// Key under which the configuration value is exported.
pub const CONFIG_KEY: &str = "config";

/// Consolidated, decoded export of electerm data.
///
/// Serializes as a JSON object keyed by table name in [`Table::ALL`] order,
/// followed by `config` when a configuration record was found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Exported tables with their decoded records, in export order.
    pub tables: Vec<(Table, Vec<Record>)>,
    /// `value` of the `data` table's `config` record, if any.
    pub config: Option<Value>,
    /// Tables that failed to read and were exported empty.
    pub failed_tables: Vec<Table>,
}

impl Snapshot {
    /// Records exported for `table`.
    pub fn table(&self, table: Table) -> Option<&[Record]> {
        self.tables
            .iter()
            .find(|(t, _)| *t == table)
            .map(|(_, records)| records.as_slice())
    }

    /// Total number of records across all tables.
    pub fn total_records(&self) -> usize {
        self.tables.iter().map(|(_, records)| records.len()).sum()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.tables.len() + usize::from(self.config.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (table, records) in &self.tables {
            map.serialize_entry(table.as_str(), records)?;
        }
        if let Some(config) = &self.config {
            map.serialize_entry(CONFIG_KEY, config)?;
        }
        map.end()
    }
}

/// Exports `tables` from `store` into a [`Snapshot`].
///
/// Every record passes through [`codec::remove_from_record`], so the result
/// holds plaintext passwords and no `passwordEncrypted` flags.
pub fn export_all(store: &mut dyn RecordStore, tables: &[Table]) -> Snapshot {
    let backend = store.backend();
    let mut snapshot = Snapshot::default();
    let all = Record::new();

    for &table in tables {
        info!(%backend, %table, "Exporting table");
        match store.find(table, &all) {
            Ok(mut records) => {
                for record in &mut records {
                    codec::remove_from_record(record);
                }
                info!(%table, count = records.len(), "Exported table");
                snapshot.tables.push((table, records));
            }
            Err(e) => {
                warn!(%table, error = %e, "Failed to export table");
                snapshot.tables.push((table, Vec::new()));
                snapshot.failed_tables.push(table);
            }
        }
    }

    let mut config_query = Record::new();
    config_query.insert(ID_FIELD.to_string(), Value::String(CONFIG_ID.to_string()));
    match store.find_one(Table::Data, &config_query) {
        Ok(Some(record)) => {
            // Falsy values (`false`, `0`, `""`, `null`) count as no config.
            if let Some(value) = record.get("value").filter(|v| codec::truthy(v)) {
                snapshot.config = Some(value.clone());
                info!("Exported config data");
            }
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Failed to export config data"),
    }

    snapshot
}

/// Record count for one table, or `None` when it could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCount {
    pub table: Table,
    pub count: Option<usize>,
}

/// Counts records per table through `store`.
pub fn table_counts(store: &mut dyn RecordStore, tables: &[Table]) -> Vec<TableCount> {
    let all = Record::new();
    tables
        .iter()
        .map(|&table| {
            let count = match store.find(table, &all) {
                Ok(records) => Some(records.len()),
                Err(e) => {
                    warn!(%table, error = %e, "Failed to read table");
                    None
                }
            };
            TableCount { table, count }
        })
        .collect()
}

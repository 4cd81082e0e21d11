//! Record and table definitions shared by every storage backend.
//!
//! Records are kept schema-less: a [`Record`] is a plain JSON object and the
//! only field the tooling relies on is the identifier, [`ID_FIELD`]. Both
//! backends store the same objects, so the same identifier resolves to the
//! same logical record before and after migration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Name of the identifier field carried by every record.
pub const ID_FIELD: &str = "_id";

/// Identifier of the configuration record stored in the [`Table::Data`] table.
pub const CONFIG_ID: &str = "config";

/// Length of identifiers generated for records inserted without one.
pub const GENERATED_ID_LEN: usize = 16;

/// A schema-less record: field name to JSON value, including `_id`.
pub type Record = Map<String, Value>;

/// One of the ten logical collections of electerm user data.
///
/// The string form (see [`Table::as_str`]) is the collection name used in
/// file names, relational table names, and snapshot keys.
///
/// # Examples
///
/// ```
/// use electerm_data_core::Table;
///
/// assert_eq!(Table::QuickCommands.as_str(), "quickCommands");
/// assert_eq!(Table::ALL[0], Table::Bookmarks);
/// assert!("nope".parse::<Table>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Table {
    Bookmarks,
    BookmarkGroups,
    AddressBookmarks,
    TerminalThemes,
    LastStates,
    Data,
    QuickCommands,
    Log,
    DbUpgradeLog,
    Profiles,
}

impl Table {
    /// Every table, in the stable order used for migration and export.
    pub const ALL: [Table; 10] = [
        Table::Bookmarks,
        Table::BookmarkGroups,
        Table::AddressBookmarks,
        Table::TerminalThemes,
        Table::LastStates,
        Table::Data,
        Table::QuickCommands,
        Table::Log,
        Table::DbUpgradeLog,
        Table::Profiles,
    ];

    /// Returns the collection name.
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Bookmarks => "bookmarks",
            Table::BookmarkGroups => "bookmarkGroups",
            Table::AddressBookmarks => "addressBookmarks",
            Table::TerminalThemes => "terminalThemes",
            Table::LastStates => "lastStates",
            Table::Data => "data",
            Table::QuickCommands => "quickCommands",
            Table::Log => "log",
            Table::DbUpgradeLog => "dbUpgradeLog",
            Table::Profiles => "profiles",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownTable(s.to_string()))
    }
}

/// Storage backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Schema-less document store, one NeDB datafile per table.
    Nedb,
    /// Single-file SQLite database, one relational table per table.
    Sqlite,
}

impl Backend {
    /// Short backend name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            Backend::Nedb => "nedb",
            Backend::Sqlite => "sqlite",
        }
    }

    /// Human-readable label including the data format generation.
    pub fn label(self) -> &'static str {
        match self {
            Backend::Nedb => "NeDB (v1)",
            Backend::Sqlite => "SQLite (v2)",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the record's identifier when it is a string.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(Value::as_str)
}

/// Generates a fresh 16-character alphanumeric record identifier.
pub fn new_record_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(GENERATED_ID_LEN);
    id
}

/// Ensures the record carries a string `_id`, generating one if absent.
///
/// Returns the identifier. A non-string `_id` is rejected, since both
/// backends key records by text.
pub fn ensure_record_id(record: &mut Record) -> Result<String, CoreError> {
    match record.get(ID_FIELD) {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(other) => Err(CoreError::InvalidId(other.to_string())),
        None => {
            let id = new_record_id();
            record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            Ok(id)
        }
    }
}

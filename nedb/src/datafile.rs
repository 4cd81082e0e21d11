//! NeDB datafile format.
//!
//! A datafile is an append-only log with one JSON object per line:
//!
//! - a document with an `_id` adds or supersedes that document;
//! - `{"$$deleted": true, "_id": ..}` removes a document;
//! - `{"$$indexCreated": {"fieldName": ..}}` declares an index, and
//!   `{"$$indexRemoved": ..}` drops it.
//!
//! Dates are stored as `{"$$date": <epoch millis>}`. Documents are kept in
//! that raw form so rewrites preserve it; [`deserialize_dates`] turns the
//! wrappers into RFC 3339 strings for readers.
//!
//! Compaction rewrites the file with only the live documents followed by
//! the index declarations. Writes go to `<file>~` first and are renamed
//! into place, so a crash leaves either the old or the new file; loading
//! falls back to the `~` file when the main file is missing.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use electerm_data_core::{ID_FIELD, Record};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{NedbError, Result};

/// Fraction of unreadable lines above which a datafile is rejected.
pub const CORRUPT_ALERT_THRESHOLD: f64 = 0.1;

const DELETED_KEY: &str = "$$deleted";
const INDEX_CREATED_KEY: &str = "$$indexCreated";
const INDEX_REMOVED_KEY: &str = "$$indexRemoved";
const DATE_KEY: &str = "$$date";

/// Live state of one datafile: documents by `_id` plus index declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Datafile {
    docs: BTreeMap<String, Record>,
    indexes: BTreeMap<String, Record>,
    skipped: usize,
}

/// Copy of `doc` with every `{"$$date": <millis>}` wrapper, at any depth,
/// replaced by an RFC 3339 string such as `2023-11-14T22:13:20.000Z`.
///
/// Wrappers whose timestamp is out of range are left as they are.
pub fn deserialize_dates(doc: &Record) -> Record {
    doc.iter()
        .map(|(key, value)| (key.clone(), deserialize_value(value)))
        .collect()
}

fn deserialize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => match date_string(map) {
            Some(date) => Value::String(date),
            None => Value::Object(deserialize_dates(map)),
        },
        Value::Array(items) => Value::Array(items.iter().map(deserialize_value).collect()),
        other => other.clone(),
    }
}

fn date_string(map: &Record) -> Option<String> {
    if map.len() != 1 {
        return None;
    }
    let millis = map.get(DATE_KEY)?;
    let millis = millis
        .as_i64()
        .or_else(|| millis.as_f64().map(|f| f as i64))?;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|date| date.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Path of the crash-safe temporary file for `path`.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push("~");
    PathBuf::from(name)
}

impl Datafile {
    /// Parses datafile content. `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`NedbError::Corrupt`] when more than
    /// [`CORRUPT_ALERT_THRESHOLD`] of the non-blank lines cannot be read.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut datafile = Datafile::default();
        let mut total = 0usize;
        let mut corrupt = 0usize;

        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            total += 1;
            let doc = match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(doc)) => doc,
                _ => {
                    corrupt += 1;
                    continue;
                }
            };
            if !datafile.apply_line(doc) {
                datafile.skipped += 1;
            }
        }

        if total > 0 && corrupt as f64 / total as f64 > CORRUPT_ALERT_THRESHOLD {
            return Err(NedbError::Corrupt {
                path: path.to_path_buf(),
                corrupt,
                total,
            });
        }
        if corrupt > 0 {
            debug!(path = %path.display(), corrupt, total, "Skipped unreadable datafile lines");
        }
        if datafile.skipped > 0 {
            warn!(
                path = %path.display(),
                skipped = datafile.skipped,
                total,
                "Skipped documents whose _id is not a string"
            );
        }
        Ok(datafile)
    }

    /// Applies one line. Returns `false` when the line is a document whose
    /// `_id` is not a string; such documents are not kept.
    fn apply_line(&mut self, doc: Record) -> bool {
        match doc.get(ID_FIELD) {
            Some(Value::String(id)) => {
                let id = id.clone();
                if doc.get(DELETED_KEY) == Some(&Value::Bool(true)) {
                    self.docs.remove(&id);
                } else {
                    self.docs.insert(id, doc);
                }
                return true;
            }
            Some(Value::Null) | None => {}
            Some(_) => return false,
        }
        if let Some(Value::Object(index)) = doc.get(INDEX_CREATED_KEY) {
            if let Some(field) = index.get("fieldName").and_then(Value::as_str) {
                self.indexes.insert(field.to_string(), index.clone());
            }
        } else if let Some(removed) = doc.get(INDEX_REMOVED_KEY).and_then(Value::as_str) {
            self.indexes.remove(removed);
        }
        true
    }

    /// Loads the datafile at `path`, or its `~` sibling when only that
    /// exists. A missing file yields an empty datafile; nothing is created.
    pub fn load(path: &Path) -> Result<Self> {
        let source = if path.exists() {
            path.to_path_buf()
        } else {
            let temp = temp_path(path);
            if !temp.exists() {
                return Ok(Datafile::default());
            }
            temp
        };
        let content = fs::read_to_string(&source)?;
        Datafile::parse(&source, &content)
    }

    /// Live documents in `_id` order.
    pub fn docs(&self) -> impl Iterator<Item = &Record> {
        self.docs.values()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.docs.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    /// Documents dropped on load because their `_id` was not a string.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Adds or replaces a document in memory. The caller persists it.
    pub(crate) fn put(&mut self, id: String, doc: Record) {
        self.docs.insert(id, doc);
    }

    /// Drops a document from memory. The caller persists the deletion.
    pub(crate) fn delete(&mut self, id: &str) -> Option<Record> {
        self.docs.remove(id)
    }

    /// Serialized compacted content: live documents, then index lines.
    pub fn to_compacted(&self) -> Result<String> {
        let mut out = String::new();
        for doc in self.docs.values() {
            out.push_str(&serde_json::to_string(doc)?);
            out.push('\n');
        }
        for index in self.indexes.values() {
            let mut line = Record::new();
            line.insert(INDEX_CREATED_KEY.to_string(), Value::Object(index.clone()));
            out.push_str(&serde_json::to_string(&line)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Serializes a document as one datafile line (without the newline).
pub(crate) fn document_line(doc: &Record) -> Result<String> {
    Ok(serde_json::to_string(doc)?)
}

/// Serializes the deletion marker for `id`.
pub(crate) fn deletion_line(id: &str) -> Result<String> {
    let mut line = Record::new();
    line.insert(DELETED_KEY.to_string(), Value::Bool(true));
    line.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    Ok(serde_json::to_string(&line)?)
}

/// Promotes a leftover `~` file when the main file is missing.
fn ensure_integrity(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    let temp = temp_path(path);
    if temp.exists() {
        fs::rename(&temp, path)?;
    }
    Ok(())
}

/// Appends `lines` to the datafile, creating it and its directory if needed.
pub(crate) fn append_lines(path: &Path, lines: &[String]) -> Result<()> {
    if lines.is_empty() {
        return Ok(());
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    ensure_integrity(path)?;

    let mut buf = String::new();
    for line in lines {
        buf.push_str(line);
        buf.push('\n');
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(buf.as_bytes())?;
    file.sync_data()?;
    Ok(())
}

/// Replaces the datafile with `content` via the `~` temporary file.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let temp = temp_path(path);
    {
        let mut file = fs::File::create(&temp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&temp, path)?;
    Ok(())
}

//! Query matching and update application over schema-less records.
//!
//! Implements the subset of the NeDB query language that electerm issues:
//! equality on top-level or dotted fields, the `$ne`, `$in`, `$nin` and
//! `$exists` comparison operators, and `$and`/`$or` combinators. Updates are
//! either `$set`/`$unset` modifier documents or whole-record replacements.
//!
//! Both backends evaluate queries with these functions, so a query selects
//! the same records whichever store is authoritative.
//!
//! # Examples
//!
//! ```
//! use electerm_data_core::{apply_update, matches};
//! use serde_json::json;
//!
//! let record = json!({ "_id": "b1", "host": "example.com", "port": 22 })
//!     .as_object().cloned().unwrap();
//!
//! let query = json!({ "port": { "$in": [22, 2222] } }).as_object().cloned().unwrap();
//! assert!(matches(&record, &query).unwrap());
//!
//! let changes = json!({ "$set": { "port": 2222 } }).as_object().cloned().unwrap();
//! let updated = apply_update(&record, &changes).unwrap();
//! assert_eq!(updated["port"], json!(2222));
//! assert_eq!(updated["_id"], json!("b1"));
//! ```

use serde_json::{Map, Value};

use crate::error::{CoreError, Result};
use crate::types::{ID_FIELD, Record};

fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn is_operator_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn equals(field: Option<&Value>, expected: &Value) -> bool {
    match field {
        None => false,
        Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
        Some(value) => value == expected,
    }
}

fn operand_array<'a>(op: &str, operand: &'a Value) -> Result<&'a Vec<Value>> {
    operand
        .as_array()
        .ok_or_else(|| CoreError::InvalidQuery(format!("{op} expects an array")))
}

fn match_operators(field: Option<&Value>, ops: &Map<String, Value>) -> Result<bool> {
    for (op, operand) in ops {
        let ok = match op.as_str() {
            "$ne" => !equals(field, operand),
            "$in" => operand_array(op, operand)?
                .iter()
                .any(|candidate| equals(field, candidate)),
            "$nin" => !operand_array(op, operand)?
                .iter()
                .any(|candidate| equals(field, candidate)),
            "$exists" => {
                let wanted = operand.as_bool().unwrap_or(!operand.is_null());
                field.is_some() == wanted
            }
            other => {
                return Err(CoreError::InvalidQuery(format!(
                    "unsupported operator {other}"
                )));
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_queries<'a>(op: &str, operand: &'a Value) -> Result<Vec<&'a Record>> {
    operand_array(op, operand)?
        .iter()
        .map(|q| {
            q.as_object()
                .ok_or_else(|| CoreError::InvalidQuery(format!("{op} expects objects")))
        })
        .collect()
}

/// Returns whether `record` satisfies `query`. An empty query matches all.
///
/// # Errors
///
/// Returns [`CoreError::InvalidQuery`] for unsupported operators or
/// malformed operands.
pub fn matches(record: &Record, query: &Record) -> Result<bool> {
    for (key, condition) in query {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for q in sub_queries(key, condition)? {
                    if !matches(record, q)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for q in sub_queries(key, condition)? {
                    if matches(record, q)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            op if op.starts_with('$') => {
                return Err(CoreError::InvalidQuery(format!(
                    "unsupported top-level operator {op}"
                )));
            }
            path => {
                let field = lookup(record, path);
                match condition {
                    Value::Object(ops) if is_operator_object(condition) => {
                        match_operators(field, ops)?
                    }
                    expected => equals(field, expected),
                }
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn set_path(record: &mut Record, path: &str, value: Value) -> Result<()> {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else {
        return Err(CoreError::InvalidUpdate("empty field path".to_string()));
    };
    let mut current = record;
    for part in parts {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = entry.as_object_mut().ok_or_else(|| {
            CoreError::InvalidUpdate(format!("cannot set {path}: {part} is not an object"))
        })?;
    }
    current.insert(last.to_string(), value);
    Ok(())
}

fn unset_path(record: &mut Record, path: &str) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else {
        return;
    };
    let mut current = record;
    for part in parts {
        match current.get_mut(part).and_then(Value::as_object_mut) {
            Some(next) => current = next,
            None => return,
        }
    }
    current.remove(last);
}

fn modifier_fields<'a>(modifier: &str, value: &'a Value) -> Result<&'a Record> {
    let fields = value
        .as_object()
        .ok_or_else(|| CoreError::InvalidUpdate(format!("{modifier} expects an object")))?;
    if fields.contains_key(ID_FIELD) {
        return Err(CoreError::InvalidUpdate(format!(
            "{modifier} cannot modify {ID_FIELD}"
        )));
    }
    Ok(fields)
}

/// Applies `changes` to a copy of `record` and returns the new record.
///
/// A document made only of `$set`/`$unset` modifiers edits the named fields.
/// Any other document replaces the record wholesale, keeping its `_id`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidUpdate`] when modifiers and plain fields are
/// mixed, an unknown modifier is used, or the update would change `_id`.
pub fn apply_update(record: &Record, changes: &Record) -> Result<Record> {
    let modifier_count = changes.keys().filter(|k| k.starts_with('$')).count();
    if modifier_count > 0 && modifier_count != changes.len() {
        return Err(CoreError::InvalidUpdate(
            "cannot mix modifiers and plain fields".to_string(),
        ));
    }

    if modifier_count == 0 {
        if let (Some(new_id), Some(old_id)) = (changes.get(ID_FIELD), record.get(ID_FIELD)) {
            if new_id != old_id {
                return Err(CoreError::InvalidUpdate(format!(
                    "cannot change {ID_FIELD}"
                )));
            }
        }
        let mut replaced = Record::new();
        if let Some(id) = record.get(ID_FIELD) {
            replaced.insert(ID_FIELD.to_string(), id.clone());
        }
        for (key, value) in changes {
            replaced.insert(key.clone(), value.clone());
        }
        return Ok(replaced);
    }

    let mut updated = record.clone();
    for (modifier, value) in changes {
        match modifier.as_str() {
            "$set" => {
                for (path, v) in modifier_fields(modifier, value)? {
                    set_path(&mut updated, path, v.clone())?;
                }
            }
            "$unset" => {
                for path in modifier_fields(modifier, value)?.keys() {
                    unset_path(&mut updated, path);
                }
            }
            other => {
                return Err(CoreError::InvalidUpdate(format!(
                    "unsupported modifier {other}"
                )));
            }
        }
    }
    Ok(updated)
}

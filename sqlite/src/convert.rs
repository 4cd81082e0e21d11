//! Conversion between [`Record`]s and `(_id, data)` rows.
//!
//! The identifier lives in its own column and is stripped from the stored
//! JSON; loading a row puts it back, so a record round-trips field for
//! field, including the `password`/`passwordEncrypted` pair.

use electerm_data_core::{ID_FIELD, Record};
use serde_json::Value;

use crate::error::{Result, SqliteError};

/// Serializes every field except `_id` into the `data` column value.
pub(crate) fn record_to_data(record: &Record) -> Result<String> {
    let data: Record = record
        .iter()
        .filter(|(key, _)| key.as_str() != ID_FIELD)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Ok(serde_json::to_string(&data)?)
}

/// Rebuilds a record from its identifier and `data` column value.
pub(crate) fn row_to_record(id: String, data: &str) -> Result<Record> {
    let mut record = match serde_json::from_str::<Value>(data)? {
        Value::Object(map) => map,
        other => {
            return Err(SqliteError::ConversionError(format!(
                "row '{id}' holds {} instead of a JSON object",
                json_kind(&other)
            )));
        }
    };
    record.insert(ID_FIELD.to_string(), Value::String(id));
    Ok(record)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_excludes_id() {
        let record = json!({ "_id": "b1", "host": "example.com" })
            .as_object()
            .cloned()
            .unwrap();
        let data = record_to_data(&record).unwrap();
        assert_eq!(data, r#"{"host":"example.com"}"#);
    }

    #[test]
    fn test_row_round_trip_keeps_password_pair() {
        let record = json!({
            "_id": "b1",
            "host": "example.com",
            "password": "tgfvjz",
            "passwordEncrypted": true,
            "nested": { "list": [1, 2, 3] }
        })
        .as_object()
        .cloned()
        .unwrap();
        let data = record_to_data(&record).unwrap();
        assert_eq!(row_to_record("b1".to_string(), &data).unwrap(), record);
    }

    #[test]
    fn test_non_object_row_is_rejected() {
        let err = row_to_record("x".to_string(), "[1]").unwrap_err();
        assert!(err.to_string().contains("an array"));
        assert!(matches!(
            row_to_record("x".to_string(), "{oops"),
            Err(SqliteError::JsonError(_))
        ));
    }
}

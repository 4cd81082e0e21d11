//! Reversible obfuscation of the `password` field.
//!
//! electerm stores passwords with a position-dependent shift of each UTF-16
//! code unit: unit `i` becomes `(unit + i + 1) mod 65536`. A record whose
//! `password` has been shifted carries `passwordEncrypted: true`.
//!
//! This is compatibility encoding, not encryption. It must stay bit-exact so
//! data written by the desktop application can be read back.
//!
//! The store-to-store migration never touches these fields; only the export
//! path calls [`remove_from_record`].

use serde_json::Value;

use crate::types::Record;

/// Field holding the (possibly shifted) password.
pub const PASSWORD_FIELD: &str = "password";

/// Flag field marking `password` as shifted.
pub const ENCRYPTED_FLAG: &str = "passwordEncrypted";

fn shift(text: &str, forward: bool) -> Option<String> {
    let units: Vec<u16> = text
        .encode_utf16()
        .enumerate()
        .map(|(i, unit)| {
            let offset = ((i + 1) % 65536) as u16;
            if forward {
                unit.wrapping_add(offset)
            } else {
                unit.wrapping_sub(offset)
            }
        })
        .collect();
    String::from_utf16(&units).ok()
}

/// Shifts every code unit forward by its 1-based position.
///
/// Returns `None` when the shifted units do not form valid UTF-16 (an
/// unpaired surrogate), which neither backend can store as JSON text.
///
/// # Examples
///
/// ```
/// use electerm_data_core::codec::{decode, encode};
///
/// assert_eq!(encode("abc").as_deref(), Some("bdf"));
/// assert_eq!(decode("bdf").as_deref(), Some("abc"));
/// ```
pub fn encode(text: &str) -> Option<String> {
    shift(text, true)
}

/// Exact inverse of [`encode`].
pub fn decode(text: &str) -> Option<String> {
    shift(text, false)
}

/// [`decode`] over a JSON value; non-string values come back unchanged.
///
/// Returns `None` when a string cannot be decoded.
fn decode_value(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => decode(s).map(Value::String),
        other => Some(other.clone()),
    }
}

fn is_flagged(record: &Record) -> bool {
    record.get(ENCRYPTED_FLAG).is_some_and(truthy)
}

/// JavaScript truthiness of a JSON value.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Shifts a plaintext `password` and sets `passwordEncrypted: true`.
///
/// No-op when the record has no non-empty password, when it is already
/// flagged, or when the password is not text. Returns whether the record
/// changed.
pub fn apply_to_record(record: &mut Record) -> bool {
    if is_flagged(record) {
        return false;
    }
    let Some(Value::String(password)) = record.get(PASSWORD_FIELD) else {
        return false;
    };
    if password.is_empty() {
        return false;
    }
    let Some(shifted) = encode(password) else {
        return false;
    };
    record.insert(PASSWORD_FIELD.to_string(), Value::String(shifted));
    record.insert(ENCRYPTED_FLAG.to_string(), Value::Bool(true));
    true
}

/// Restores a shifted `password` and deletes `passwordEncrypted`.
///
/// No-op unless the record is flagged and carries a non-empty password.
/// A password that does not decode to valid text leaves the record
/// untouched, flag included. Returns whether the record changed.
pub fn remove_from_record(record: &mut Record) -> bool {
    if !is_flagged(record) {
        return false;
    }
    let decoded = match record.get(PASSWORD_FIELD) {
        Some(value) if truthy(value) => match decode_value(value) {
            Some(decoded) => decoded,
            None => return false,
        },
        _ => return false,
    };
    record.insert(PASSWORD_FIELD.to_string(), decoded);
    record.remove(ENCRYPTED_FLAG);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_encode_shifts_by_position() {
        assert_eq!(encode("").as_deref(), Some(""));
        assert_eq!(encode("aaa").as_deref(), Some("bcd"));
        assert_eq!(encode("secret").as_deref(), Some("tgfvjz"));
    }

    #[test]
    fn test_decode_inverts_encode() {
        let samples = [
            "secret",
            "p@ss w0rd!",
            "пароль",
            "密码123",
            "emoji \u{1F511} key",
            "\u{FFFF}\u{0000}",
        ];
        for sample in samples {
            let encoded = encode(sample).unwrap();
            assert_eq!(decode(&encoded).as_deref(), Some(sample), "sample {sample:?}");
        }
    }

    #[test]
    fn test_encode_wraps_at_u16_boundary() {
        let encoded = encode("\u{FFFF}").unwrap();
        assert_eq!(encoded, "\u{0000}");
        assert_eq!(decode(&encoded).as_deref(), Some("\u{FFFF}"));
    }

    #[test]
    fn test_encode_into_surrogate_range_is_none() {
        // U+D7FF shifted by one lands on an unpaired high surrogate.
        assert!(encode("\u{D7FF}").is_none());
    }

    #[test]
    fn test_decode_value_ignores_non_strings() {
        assert_eq!(decode_value(&json!(42)), Some(json!(42)));
        assert_eq!(decode_value(&json!(null)), Some(json!(null)));
        assert_eq!(decode_value(&json!("b")), Some(json!("a")));
        assert_eq!(decode_value(&json!(["x"])), Some(json!(["x"])));
        assert_eq!(decode_value(&json!("\u{E000}")), None);
    }

    #[test]
    fn test_records_without_password_are_untouched() {
        let original = record(json!({ "_id": "b1", "host": "example.com" }));
        let mut r = original.clone();
        assert!(!apply_to_record(&mut r));
        assert_eq!(r, original);
        assert!(!remove_from_record(&mut r));
        assert_eq!(r, original);
    }

    #[test]
    fn test_apply_then_remove_restores_password() {
        let mut r = record(json!({ "_id": "b1", "password": "hunter2" }));
        assert!(apply_to_record(&mut r));
        assert_eq!(r[ENCRYPTED_FLAG], json!(true));
        assert_ne!(r[PASSWORD_FIELD], json!("hunter2"));

        assert!(remove_from_record(&mut r));
        assert_eq!(r[PASSWORD_FIELD], json!("hunter2"));
        assert!(!r.contains_key(ENCRYPTED_FLAG));
    }

    #[test]
    fn test_apply_is_idempotent_when_flagged() {
        let mut r = record(json!({ "password": "hunter2" }));
        apply_to_record(&mut r);
        let once = r.clone();
        assert!(!apply_to_record(&mut r));
        assert_eq!(r, once);
    }

    #[test]
    fn test_apply_with_false_flag_encodes() {
        let mut r = record(json!({ "password": "x", "passwordEncrypted": false }));
        assert!(apply_to_record(&mut r));
        assert_eq!(r[PASSWORD_FIELD], json!("y"));
        assert_eq!(r[ENCRYPTED_FLAG], json!(true));
    }

    #[test]
    fn test_remove_is_noop_without_flag() {
        let mut r = record(json!({ "password": "plain" }));
        assert!(!remove_from_record(&mut r));
        assert_eq!(r[PASSWORD_FIELD], json!("plain"));
    }

    #[test]
    fn test_remove_keeps_flag_for_empty_password() {
        let mut r = record(json!({ "password": "", "passwordEncrypted": true }));
        assert!(!remove_from_record(&mut r));
        assert_eq!(r[ENCRYPTED_FLAG], json!(true));
    }

    #[test]
    fn test_remove_leaves_undecodable_password_flagged() {
        // U+E000 shifted back by one lands on an unpaired low surrogate.
        let original = record(json!({
            "_id": "b1",
            "password": "\u{E000}",
            "passwordEncrypted": true
        }));
        let mut r = original.clone();
        assert!(!remove_from_record(&mut r));
        assert_eq!(r, original);
    }

    #[test]
    fn test_remove_decodes_only_strings() {
        let mut r = record(json!({ "password": 42, "passwordEncrypted": true }));
        assert!(remove_from_record(&mut r));
        assert_eq!(r[PASSWORD_FIELD], json!(42));
        assert!(!r.contains_key(ENCRYPTED_FLAG));
    }
}

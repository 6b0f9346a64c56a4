//! Record keys and key-path extraction.
//!
//! Keys follow the ordering of browser object stores: every number sorts
//! before every string, numbers compare by value, strings compare
//! lexicographically. This gives full scans a stable natural order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Key of a record inside a store.
///
/// Ordering rules:
/// 1. Numbers before strings
/// 2. Numbers by value
/// 3. Strings lexicographically
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Number(f64),
    Text(String),
}

impl Key {
    /// Whether the key can be stored. `NaN` is the only invalid key.
    pub fn is_valid(&self) -> bool {
        match self {
            Key::Number(n) => !n.is_nan(),
            Key::Text(_) => true,
        }
    }

    /// Convert a JSON value into a key.
    ///
    /// Returns `None` for values that cannot act as keys (null, booleans,
    /// arrays, objects).
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Number(n) => n.as_f64().map(Key::Number),
            Value::String(s) => Some(Key::Text(s.clone())),
            _ => None,
        }
    }

    /// Convert the key back into a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Key::Text(s) => Value::String(s.clone()),
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // Zero and negative zero are one key; NaN only needs a consistent slot.
            (Key::Number(a), Key::Number(b)) => a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b)),
            (Key::Number(_), Key::Text(_)) => Ordering::Less,
            (Key::Text(_), Key::Number(_)) => Ordering::Greater,
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Number(n) => write!(f, "{}", n),
            Key::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::Text(s.clone())
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Key::Number(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Number(n as f64)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Number(n as f64)
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Key::Number(n as f64)
    }
}

impl From<u64> for Key {
    fn from(n: u64) -> Self {
        Key::Number(n as f64)
    }
}

/// A dotted path naming the key field of a record, e.g. `id` or `meta.uid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPath(String);

impl KeyPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the key from a record value.
    ///
    /// Returns `None` if any segment is missing or the final value is not a
    /// valid key.
    pub fn extract(&self, record: &Value) -> Option<Key> {
        let mut current = record;
        for segment in self.0.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Key::from_value(current).filter(Key::is_valid)
    }
}

impl Default for KeyPath {
    fn default() -> Self {
        Self("id".to_string())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_sort_before_strings() {
        let mut keys = vec![
            Key::from("b"),
            Key::from(10),
            Key::from("a"),
            Key::from(-3.5),
            Key::from(2),
        ];
        keys.sort();

        assert_eq!(
            keys,
            vec![
                Key::from(-3.5),
                Key::from(2),
                Key::from(10),
                Key::from("a"),
                Key::from("b"),
            ]
        );
    }

    #[test]
    fn integer_and_float_keys_are_equal() {
        assert_eq!(Key::from(1), Key::from(1.0));
        assert_ne!(Key::from(1), Key::from("1"));
    }

    #[test]
    fn negative_zero_is_zero() {
        assert_eq!(Key::from(-0.0), Key::from(0));
        assert!(Key::from(-0.0) > Key::from(-1));
        assert!(Key::from(-0.0) < Key::from(f64::MIN_POSITIVE));
    }

    #[test]
    fn nan_is_invalid() {
        assert!(!Key::from(f64::NAN).is_valid());
        assert!(Key::from(f64::INFINITY).is_valid());
        assert!(Key::from("").is_valid());
    }

    #[test]
    fn extract_top_level_key() {
        let path = KeyPath::default();
        assert_eq!(path.extract(&json!({"id": "1"})), Some(Key::from("1")));
        assert_eq!(path.extract(&json!({"id": 7})), Some(Key::from(7)));
    }

    #[test]
    fn extract_missing_or_invalid_key() {
        let path = KeyPath::default();
        assert_eq!(path.extract(&json!({"name": "x"})), None);
        assert_eq!(path.extract(&json!({"id": null})), None);
        assert_eq!(path.extract(&json!({"id": true})), None);
        assert_eq!(path.extract(&json!({"id": [1]})), None);
        assert_eq!(path.extract(&json!("not an object")), None);
    }

    #[test]
    fn extract_dotted_path() {
        let path = KeyPath::new("meta.uid");
        assert_eq!(
            path.extract(&json!({"meta": {"uid": "u-1"}})),
            Some(Key::from("u-1"))
        );
        assert_eq!(path.extract(&json!({"meta": "u-1"})), None);
    }

    #[test]
    fn display() {
        assert_eq!(Key::from("abc").to_string(), "\"abc\"");
        assert_eq!(Key::from(3).to_string(), "3");
        assert_eq!(KeyPath::default().to_string(), "id");
    }
}

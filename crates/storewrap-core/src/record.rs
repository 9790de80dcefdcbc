//! Record and transaction mode types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Field name every object store uses as its primary key.
pub const KEY_PATH: &str = "keyPath";

/// A key-value entry in one object store.
///
/// Serializes as `{"keyPath": "...", "data": ...}` so the store's key path
/// resolves to `key_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<T> {
    /// Unique identifier of the record within the store
    #[serde(rename = "keyPath")]
    pub key_path: String,
    /// Application payload
    pub data: T,
}

impl<T> Record<T> {
    pub fn new(key_path: impl Into<String>, data: T) -> Self {
        Self {
            key_path: key_path.into(),
            data,
        }
    }

    pub fn key(&self) -> &str {
        &self.key_path
    }
}

/// Transaction mode a `StoreWrapper` opens every transaction with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionMode {
    #[default]
    #[serde(rename = "readonly")]
    ReadOnly,
    #[serde(rename = "readwrite")]
    ReadWrite,
}

impl TransactionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionMode::ReadOnly => "readonly",
            TransactionMode::ReadWrite => "readwrite",
        }
    }

    /// Whether writes are allowed in this mode.
    pub fn is_writable(&self) -> bool {
        matches!(self, TransactionMode::ReadWrite)
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "readonly" => Ok(TransactionMode::ReadOnly),
            "readwrite" => Ok(TransactionMode::ReadWrite),
            other => Err(format!(
                "unknown transaction mode '{}' (expected readonly or readwrite)",
                other
            )),
        }
    }
}

/// Result of `StoreWrapper::initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome<T> {
    /// No record existed at the key; the initial record was written
    Created(Record<T>),
    /// A record already existed at the key; the initial record (returned here)
    /// was not written and the stored one is untouched
    AlreadyExists(Record<T>),
}

impl<T> InitOutcome<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, InitOutcome::Created(_))
    }

    /// The initial record, whether or not it was written.
    pub fn into_record(self) -> Record<T> {
        match self {
            InitOutcome::Created(record) | InitOutcome::AlreadyExists(record) => record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_record_serializes_with_key_path_field() {
        let record = Record::new("user1", json!({"name": "A"}));
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value, json!({"keyPath": "user1", "data": {"name": "A"}}));
        assert_eq!(value.get(KEY_PATH).and_then(|v| v.as_str()), Some("user1"));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("readonly".parse::<TransactionMode>(), Ok(TransactionMode::ReadOnly));
        assert_eq!("readwrite".parse::<TransactionMode>(), Ok(TransactionMode::ReadWrite));
        assert!("versionchange".parse::<TransactionMode>().is_err());
        assert_eq!(TransactionMode::default(), TransactionMode::ReadOnly);
    }

    #[test]
    fn test_mode_serde_uses_dom_names() {
        let json = serde_json::to_string(&TransactionMode::ReadWrite).unwrap();
        assert_eq!(json, "\"readwrite\"");
    }

    #[test]
    fn test_init_outcome() {
        let created = InitOutcome::Created(Record::new("a", 1));
        let existing = InitOutcome::AlreadyExists(Record::new("a", 1));

        assert!(created.is_created());
        assert!(!existing.is_created());
        assert_eq!(existing.into_record(), Record::new("a", 1));
    }
}

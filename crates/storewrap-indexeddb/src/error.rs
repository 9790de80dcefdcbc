//! Error types for the IndexedDB engine

use storewrap_core::engine::EngineError;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::DomException;

/// Result type for IndexedDB operations
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Errors that can occur during IndexedDB operations
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// Database open error
    #[error("IndexedDB open error: {0}")]
    Open(String),

    /// Schema creation error, or no database handle during upgrade
    #[error("IndexedDB upgrade error: {0}")]
    Upgrade(String),

    /// Transaction error
    #[error("IndexedDB transaction error: {0}")]
    Transaction(String),

    /// Request error from IDB operation, with the DOM exception name
    #[error("IndexedDB request error: {name}: {message}")]
    Request { name: String, message: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JavaScript value conversion error
    #[error("JS conversion error: {0}")]
    JsValue(String),
}

impl IndexedDbError {
    /// Build a request error from a rejected request or a thrown exception.
    pub fn request(val: JsValue) -> Self {
        match val.dyn_ref::<DomException>() {
            Some(exc) => IndexedDbError::Request {
                name: exc.name(),
                message: exc.message(),
            },
            None => IndexedDbError::Request {
                name: "Error".to_string(),
                message: js_message(&val),
            },
        }
    }

    pub fn open(val: JsValue) -> Self {
        IndexedDbError::Open(js_message(&val))
    }

    pub fn transaction(val: JsValue) -> Self {
        IndexedDbError::Transaction(js_message(&val))
    }
}

impl From<JsValue> for IndexedDbError {
    fn from(val: JsValue) -> Self {
        IndexedDbError::request(val)
    }
}

/// Readable message for a JS error value.
pub(crate) fn js_message(val: &JsValue) -> String {
    if let Some(exc) = val.dyn_ref::<DomException>() {
        return format!("{}: {}", exc.name(), exc.message());
    }
    if let Some(s) = val.as_string() {
        return s;
    }
    js_sys::JSON::stringify(val)
        .map(String::from)
        .unwrap_or_else(|_| format!("{:?}", val))
}

/// Convert IndexedDbError to EngineError for the engine protocol
impl From<IndexedDbError> for EngineError {
    fn from(err: IndexedDbError) -> Self {
        match err {
            IndexedDbError::NotAvailable(msg) => EngineError::NotAvailable(msg),
            IndexedDbError::Open(msg) => EngineError::Open(msg),
            IndexedDbError::Upgrade(msg) => EngineError::Upgrade(msg),
            IndexedDbError::Transaction(msg) => EngineError::Transaction(msg),
            IndexedDbError::Request { name, message } => match name.as_str() {
                "ConstraintError" => EngineError::Constraint(message),
                "ReadOnlyError" => EngineError::ReadOnly(message),
                "DataError" => EngineError::Data(message),
                "TransactionInactiveError" | "InvalidStateError" | "NotFoundError" => {
                    EngineError::Transaction(format!("{}: {}", name, message))
                }
                _ => EngineError::Request(format!("{}: {}", name, message)),
            },
            IndexedDbError::Json(e) => EngineError::Data(e.to_string()),
            IndexedDbError::JsValue(msg) => EngineError::Data(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> IndexedDbError {
        IndexedDbError::Request {
            name: name.to_string(),
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_dom_names_map_to_engine_kinds() {
        assert_eq!(
            EngineError::from(request("ConstraintError")),
            EngineError::Constraint("boom".into())
        );
        assert_eq!(
            EngineError::from(request("ReadOnlyError")),
            EngineError::ReadOnly("boom".into())
        );
        assert_eq!(
            EngineError::from(request("DataError")),
            EngineError::Data("boom".into())
        );
        assert_eq!(
            EngineError::from(request("UnknownError")),
            EngineError::Request("UnknownError: boom".into())
        );
    }

    #[test]
    fn test_stage_errors_keep_their_stage() {
        assert_eq!(
            EngineError::from(IndexedDbError::Upgrade("no handle".into())),
            EngineError::Upgrade("no handle".into())
        );
        assert_eq!(
            EngineError::from(IndexedDbError::NotAvailable("no indexedDB".into())),
            EngineError::NotAvailable("no indexedDB".into())
        );
    }
}

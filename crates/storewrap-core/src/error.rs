//! Error types for StoreWrapper operations

use std::fmt;

use thiserror::Error;

use crate::engine::EngineError;

/// Result type for StoreWrapper operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// The StoreWrapper operation an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Initialize,
    Get,
    Add,
    Put,
    Exists,
    Delete,
    Clear,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Initialize => "initialize",
            Operation::Get => "get",
            Operation::Add => "add",
            Operation::Put => "put",
            Operation::Exists => "exists",
            Operation::Delete => "delete",
            Operation::Clear => "clear",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during StoreWrapper operations.
///
/// Variants name the stage that failed; every message starts with the same
/// static prefix followed by the operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database could not be opened or created
    #[error("indexedDB open failed:{operation} indexeddb request failed: {source}")]
    Open {
        operation: Operation,
        source: EngineError,
    },

    /// Object store creation failed, or no database handle during upgrade
    #[error("indexedDB open failed:{operation} indexeddb onupgradeneeded failed: {source}")]
    Upgrade {
        operation: Operation,
        source: EngineError,
    },

    /// Transaction could not be started or did not commit
    #[error("indexedDB open failed:{operation} indexeddb transaction failed: {source}")]
    Transaction {
        operation: Operation,
        source: EngineError,
    },

    /// The request itself errored (constraint violation, read-only, bad key, ...)
    #[error("indexedDB open failed:{operation} indexeddb {operation} failed: {source}")]
    Request {
        operation: Operation,
        source: EngineError,
    },

    /// Record could not be converted to or from the stored value
    #[error("indexedDB open failed:{operation} serialization failed: {source}")]
    Serialization {
        operation: Operation,
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Classify an error returned by `Engine::open`.
    pub(crate) fn open(operation: Operation, source: EngineError) -> Self {
        match source {
            EngineError::Upgrade(_) => StoreError::Upgrade { operation, source },
            _ => StoreError::Open { operation, source },
        }
    }

    pub(crate) fn transaction(operation: Operation, source: EngineError) -> Self {
        StoreError::Transaction { operation, source }
    }

    pub(crate) fn request(operation: Operation, source: EngineError) -> Self {
        StoreError::Request { operation, source }
    }

    pub(crate) fn serialization(operation: Operation, source: serde_json::Error) -> Self {
        StoreError::Serialization { operation, source }
    }

    /// The operation that failed.
    pub fn operation(&self) -> Operation {
        match self {
            StoreError::Open { operation, .. }
            | StoreError::Upgrade { operation, .. }
            | StoreError::Transaction { operation, .. }
            | StoreError::Request { operation, .. }
            | StoreError::Serialization { operation, .. } => *operation,
        }
    }

    /// The engine error behind this failure, if it came from the engine.
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            StoreError::Open { source, .. }
            | StoreError::Upgrade { source, .. }
            | StoreError::Transaction { source, .. }
            | StoreError::Request { source, .. } => Some(source),
            StoreError::Serialization { .. } => None,
        }
    }

    /// True when a write was rejected because its key already exists.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Request {
                source: EngineError::Constraint(_),
                ..
            }
        )
    }
}

//! Engine error types

use thiserror::Error;

/// Errors reported by an engine at the open/upgrade/transaction/request boundary.
///
/// Kinds follow the DOM exception names an IndexedDB engine reports, so that
/// backends can map their native failures without losing information.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine is not reachable in this environment
    #[error("engine not available: {0}")]
    NotAvailable(String),

    /// Database could not be opened or created
    #[error("open: {0}")]
    Open(String),

    /// Schema creation failed or no database handle was available during upgrade
    #[error("upgrade: {0}")]
    Upgrade(String),

    /// Transaction could not be started or did not complete
    #[error("transaction: {0}")]
    Transaction(String),

    /// Write violated a key uniqueness constraint (`ConstraintError`)
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Write issued inside a read-only transaction (`ReadOnlyError`)
    #[error("read-only transaction: {0}")]
    ReadOnly(String),

    /// Value or key was not acceptable to the store (`DataError`)
    #[error("invalid data: {0}")]
    Data(String),

    /// Any other request failure
    #[error("request: {0}")]
    Request(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

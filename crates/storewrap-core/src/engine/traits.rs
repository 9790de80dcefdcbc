//! Engine protocol trait definitions

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::error::EngineResult;
use crate::record::TransactionMode;

/// Schema access handed to the upgrade callback while a database is being
/// created or its version is changing.
///
/// Engines resolve the database handle before invoking the callback; a missing
/// handle is reported as `EngineError::Upgrade` by the engine itself.
pub trait UpgradeTarget {
    /// Check whether an object store with this name exists.
    fn has_store(&self, name: &str) -> bool;

    /// Create an object store whose primary key is read from `key_path`.
    fn create_store(&mut self, name: &str, key_path: &str) -> EngineResult<()>;
}

/// Callback invoked during an upgrade.
///
/// Owned and `'static` because browser engines hand it to an event listener.
pub type UpgradeFn = dyn FnMut(&mut dyn UpgradeTarget) -> EngineResult<()>;

/// Entry point to an embedded key-value document store.
///
/// This is the capability a `StoreWrapper` is constructed with, so callers can
/// substitute any backend (IndexedDB, in-memory) without global state.
#[async_trait(?Send)]
pub trait Engine {
    /// Connection type produced by `open`
    type Connection: Connection;

    /// Open (or create) the named database.
    ///
    /// `version` of `None` opens the current version, creating the database at
    /// version 1 if absent. `on_upgrade` runs when the database is created or
    /// the requested version is newer than the stored one.
    async fn open(
        &self,
        name: &str,
        version: Option<u32>,
        on_upgrade: Box<UpgradeFn>,
    ) -> EngineResult<Self::Connection>;
}

/// An open database connection.
pub trait Connection {
    /// Transaction type produced by `transaction`
    type Transaction: Transaction;

    /// Begin a transaction scoped to a single object store.
    fn transaction(&self, store: &str, mode: TransactionMode) -> EngineResult<Self::Transaction>;

    /// Close the connection. Pending transactions are allowed to finish.
    fn close(&self);
}

/// A transaction over one object store.
///
/// Each method issues exactly one request and resolves when the engine
/// reports success or error for it.
#[async_trait(?Send)]
pub trait Transaction {
    /// Look up a value by key. `None` if absent.
    async fn get(&self, key: &str) -> EngineResult<Option<Value>>;

    /// Key-only lookup. `None` if absent.
    async fn get_key(&self, key: &str) -> EngineResult<Option<String>>;

    /// Insert a value; fails with `EngineError::Constraint` if its key exists.
    async fn add(&self, value: Value) -> EngineResult<()>;

    /// Insert or overwrite a value at its key.
    async fn put(&self, value: Value) -> EngineResult<()>;

    /// Remove the value at `key`. Absent keys are not an error.
    async fn delete(&self, key: &str) -> EngineResult<()>;

    /// Remove every value in the store.
    async fn clear(&self) -> EngineResult<()>;

    /// Wait for the transaction to commit.
    async fn complete(&self) -> EngineResult<()>;
}

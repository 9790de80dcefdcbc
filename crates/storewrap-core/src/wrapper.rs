//! StoreWrapper: async CRUD over a single object store.
//!
//! Every operation opens its own connection, creates the object store on
//! upgrade if it is missing, runs inside one transaction in the configured
//! mode, and closes the connection before returning, on success and on error.

use std::future::Future;
use std::marker::PhantomData;
use std::ops::Deref;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::engine::{Connection, Engine, EngineResult, Transaction, UpgradeTarget};
use crate::error::{Operation, Result, StoreError};
use crate::record::{InitOutcome, Record, TransactionMode, KEY_PATH};

/// Closes the wrapped connection exactly once, when dropped.
struct ConnectionGuard<C: Connection> {
    conn: C,
}

impl<C: Connection> Deref for ConnectionGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.conn
    }
}

impl<C: Connection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        self.conn.close();
    }
}

/// Async CRUD façade over one object store of an injected `Engine`.
///
/// The database and the object store share `store_name`. Records are keyed by
/// their `keyPath` field.
pub struct StoreWrapper<T, E: Engine> {
    engine: E,
    store_name: String,
    mode: TransactionMode,
    version: Option<u32>,
    _record: PhantomData<fn() -> T>,
}

impl<T, E> StoreWrapper<T, E>
where
    T: Serialize + DeserializeOwned,
    E: Engine,
{
    pub fn new(engine: E, store_name: impl Into<String>, mode: TransactionMode) -> Self {
        Self::from_config(engine, StoreConfig::new(store_name, mode))
    }

    pub fn from_config(engine: E, config: StoreConfig) -> Self {
        Self {
            engine,
            store_name: config.store_name,
            mode: config.mode,
            version: config.version,
            _record: PhantomData,
        }
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Write `init` unless a record already exists at its key.
    ///
    /// The existence check and the write share one transaction. An existing
    /// record is left untouched and reported as `InitOutcome::AlreadyExists`.
    pub async fn initialize(&self, init: Record<T>) -> Result<InitOutcome<T>> {
        let operation = Operation::Initialize;
        self.traced(operation, async {
            let conn = self.connect(operation).await?;
            let tx = self.begin(&conn, operation)?;

            if has_key(&tx, init.key())
                .await
                .map_err(|e| StoreError::request(operation, e))?
            {
                return Ok(InitOutcome::AlreadyExists(init));
            }

            let value = to_value(operation, &init)?;
            tx.put(value)
                .await
                .map_err(|e| StoreError::request(operation, e))?;
            tx.complete()
                .await
                .map_err(|e| StoreError::transaction(operation, e))?;
            Ok(InitOutcome::Created(init))
        })
        .await
    }

    /// Look up a record by key. A missing key is `Ok(None)`, not an error.
    pub async fn get(&self, key: &str) -> Result<Option<Record<T>>> {
        let operation = Operation::Get;
        self.traced(operation, async {
            let conn = self.connect(operation).await?;
            let tx = self.begin(&conn, operation)?;

            let value = tx
                .get(key)
                .await
                .map_err(|e| StoreError::request(operation, e))?;
            value
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| StoreError::serialization(operation, e))
        })
        .await
    }

    /// Insert a record. No pre-check: a duplicate key fails with the engine's
    /// constraint error (see `StoreError::is_constraint_violation`).
    pub async fn add(&self, record: Record<T>) -> Result<Record<T>> {
        let operation = Operation::Add;
        self.traced(operation, async {
            let conn = self.connect(operation).await?;
            let tx = self.begin(&conn, operation)?;

            let value = to_value(operation, &record)?;
            tx.add(value)
                .await
                .map_err(|e| StoreError::request(operation, e))?;
            tx.complete()
                .await
                .map_err(|e| StoreError::transaction(operation, e))?;
            Ok(record)
        })
        .await
    }

    /// Insert a record, overwriting any record at the same key.
    pub async fn put(&self, record: Record<T>) -> Result<Record<T>> {
        let operation = Operation::Put;
        self.traced(operation, async {
            let conn = self.connect(operation).await?;
            let tx = self.begin(&conn, operation)?;

            let value = to_value(operation, &record)?;
            tx.put(value)
                .await
                .map_err(|e| StoreError::request(operation, e))?;
            tx.complete()
                .await
                .map_err(|e| StoreError::transaction(operation, e))?;
            Ok(record)
        })
        .await
    }

    /// Check whether a record exists at `key`.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let operation = Operation::Exists;
        self.traced(operation, async {
            let conn = self.connect(operation).await?;
            let tx = self.begin(&conn, operation)?;

            has_key(&tx, key)
                .await
                .map_err(|e| StoreError::request(operation, e))
        })
        .await
    }

    /// Delete the record at `key`.
    /// Returns `true` if a record was deleted, `false` if none existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let operation = Operation::Delete;
        self.traced(operation, async {
            let conn = self.connect(operation).await?;
            let tx = self.begin(&conn, operation)?;

            if !has_key(&tx, key)
                .await
                .map_err(|e| StoreError::request(operation, e))?
            {
                return Ok(false);
            }

            tx.delete(key)
                .await
                .map_err(|e| StoreError::request(operation, e))?;
            tx.complete()
                .await
                .map_err(|e| StoreError::transaction(operation, e))?;
            Ok(true)
        })
        .await
    }

    /// Delete every record in the store.
    pub async fn clear(&self) -> Result<()> {
        let operation = Operation::Clear;
        self.traced(operation, async {
            let conn = self.connect(operation).await?;
            let tx = self.begin(&conn, operation)?;

            tx.clear()
                .await
                .map_err(|e| StoreError::request(operation, e))?;
            tx.complete()
                .await
                .map_err(|e| StoreError::transaction(operation, e))
        })
        .await
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Open a connection, creating the object store on upgrade if missing.
    async fn connect(&self, operation: Operation) -> Result<ConnectionGuard<E::Connection>> {
        let store_name = self.store_name.clone();
        debug!(store = %store_name, %operation, "opening connection");

        let on_upgrade = move |db: &mut dyn UpgradeTarget| -> EngineResult<()> {
            if !db.has_store(&store_name) {
                debug!(store = %store_name, "creating object store");
                db.create_store(&store_name, KEY_PATH)?;
            }
            Ok(())
        };

        let conn = self
            .engine
            .open(&self.store_name, self.version, Box::new(on_upgrade))
            .await
            .map_err(|e| StoreError::open(operation, e))?;
        Ok(ConnectionGuard { conn })
    }

    fn begin(
        &self,
        conn: &ConnectionGuard<E::Connection>,
        operation: Operation,
    ) -> Result<<E::Connection as Connection>::Transaction> {
        conn.transaction(&self.store_name, self.mode)
            .map_err(|e| StoreError::transaction(operation, e))
    }

    async fn traced<R>(
        &self,
        operation: Operation,
        fut: impl Future<Output = Result<R>>,
    ) -> Result<R> {
        let result = fut.await;
        if let Err(e) = &result {
            warn!(store = %self.store_name, %operation, error = %e, "operation failed");
        }
        result
    }
}

/// Key-only lookup: does any record exist at `key`?
async fn has_key<X: Transaction>(tx: &X, key: &str) -> EngineResult<bool> {
    let exists = tx.get_key(key).await?.is_some();
    debug!(key, exists, "existence check");
    Ok(exists)
}

fn to_value<T: Serialize>(operation: Operation, record: &Record<T>) -> Result<Value> {
    serde_json::to_value(record).map_err(|e| StoreError::serialization(operation, e))
}

//! IndexedDB implementation of the storewrap engine protocol.

use async_trait::async_trait;
use serde_json::Value;
use storewrap_core::engine::{
    Connection, Engine, EngineError, EngineResult, Transaction, UpgradeFn,
};
use storewrap_core::TransactionMode;
use wasm_bindgen::JsValue;
use web_sys::{IdbDatabase, IdbObjectStore, IdbTransaction, IdbTransactionMode};

use crate::convert::{js_to_value, value_to_js};
use crate::error::IndexedDbError;
use crate::idb;

/// Engine backed by the browser's global `indexedDB` factory.
///
/// The factory is looked up on every `open`, so a missing `indexedDB`
/// surfaces as `EngineError::NotAvailable` from the operation that needed it.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedDbEngine;

impl IndexedDbEngine {
    pub fn new() -> Self {
        Self
    }

    /// Delete the database (for testing/cleanup).
    pub async fn delete_database(&self, db_name: &str) -> crate::Result<()> {
        idb::delete_database(db_name).await
    }
}

#[async_trait(?Send)]
impl Engine for IndexedDbEngine {
    type Connection = IdbConnection;

    async fn open(
        &self,
        name: &str,
        version: Option<u32>,
        on_upgrade: Box<UpgradeFn>,
    ) -> EngineResult<IdbConnection> {
        let db = idb::open_database(name, version, on_upgrade)
            .await
            .map_err(EngineError::from)?;
        Ok(IdbConnection { db })
    }
}

/// Open IndexedDB connection.
#[derive(Debug)]
pub struct IdbConnection {
    db: IdbDatabase,
}

impl Connection for IdbConnection {
    type Transaction = IdbStoreTransaction;

    fn transaction(&self, store: &str, mode: TransactionMode) -> EngineResult<IdbStoreTransaction> {
        let tx = self
            .db
            .transaction_with_str_and_mode(store, idb_mode(mode))
            .map_err(|e| EngineError::from(IndexedDbError::transaction(e)))?;
        let object_store = tx
            .object_store(store)
            .map_err(|e| EngineError::from(IndexedDbError::transaction(e)))?;
        Ok(IdbStoreTransaction {
            tx,
            store: object_store,
        })
    }

    fn close(&self) {
        self.db.close();
    }
}

fn idb_mode(mode: TransactionMode) -> IdbTransactionMode {
    match mode {
        TransactionMode::ReadOnly => IdbTransactionMode::Readonly,
        TransactionMode::ReadWrite => IdbTransactionMode::Readwrite,
    }
}

/// IndexedDB transaction over a single object store.
#[derive(Debug)]
pub struct IdbStoreTransaction {
    tx: IdbTransaction,
    store: IdbObjectStore,
}

#[async_trait(?Send)]
impl Transaction for IdbStoreTransaction {
    async fn get(&self, key: &str) -> EngineResult<Option<Value>> {
        let req = self
            .store
            .get(&JsValue::from_str(key))
            .map_err(IndexedDbError::request)?;
        let result = idb::await_request(&req).await?;

        if result.is_undefined() || result.is_null() {
            return Ok(None);
        }
        Ok(Some(js_to_value(&result)?))
    }

    async fn get_key(&self, key: &str) -> EngineResult<Option<String>> {
        let req = self
            .store
            .get_key(&JsValue::from_str(key))
            .map_err(IndexedDbError::request)?;
        let result = idb::await_request(&req).await?;
        Ok(result.as_string())
    }

    async fn add(&self, value: Value) -> EngineResult<()> {
        let js_val = value_to_js(&value)?;
        let req = self.store.add(&js_val).map_err(IndexedDbError::request)?;
        idb::await_request(&req).await?;
        Ok(())
    }

    async fn put(&self, value: Value) -> EngineResult<()> {
        let js_val = value_to_js(&value)?;
        let req = self.store.put(&js_val).map_err(IndexedDbError::request)?;
        idb::await_request(&req).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> EngineResult<()> {
        let req = self
            .store
            .delete(&JsValue::from_str(key))
            .map_err(IndexedDbError::request)?;
        idb::await_request(&req).await?;
        Ok(())
    }

    async fn clear(&self) -> EngineResult<()> {
        let req = self.store.clear().map_err(IndexedDbError::request)?;
        idb::await_request(&req).await?;
        Ok(())
    }

    async fn complete(&self) -> EngineResult<()> {
        idb::await_transaction(&self.tx).await?;
        Ok(())
    }
}

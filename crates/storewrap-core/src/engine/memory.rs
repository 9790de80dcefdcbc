//! In-memory engine
//!
//! A HashMap-based implementation of the engine protocol that follows IndexedDB
//! semantics: versioned databases, object stores keyed by a string key path,
//! uniqueness on `add`, and rejection of writes inside read-only transactions.
//!
//! Used as the test double for `StoreWrapper` and for non-browser targets.
//! Not persistent.
//!
//! Transactions lock their database's scope until dropped: read-write
//! transactions and upgrades are exclusive, read-only transactions share.
//! A thread must not hold a read-write transaction while starting another
//! transaction on the same database or opening it at a newer version.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock};
use serde_json::Value;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::{Connection, Engine, Transaction, UpgradeFn, UpgradeTarget};
use crate::record::TransactionMode;

/// One-shot failure to inject into the next matching stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Next `open` fails
    Open,
    /// Next `open` fails at its upgrade stage as if no database handle was
    /// obtained. Spent by that open even when no upgrade runs.
    Upgrade,
    /// Next `transaction` fails
    Transaction,
    /// Next request (get, getKey, add, put, delete, clear) fails
    Request,
}

#[derive(Debug, Clone, Default)]
struct ObjectStore {
    key_path: String,
    records: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default)]
struct Database {
    version: u32,
    stores: HashMap<String, ObjectStore>,
}

impl UpgradeTarget for Database {
    fn has_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    fn create_store(&mut self, name: &str, key_path: &str) -> EngineResult<()> {
        if self.stores.contains_key(name) {
            return Err(EngineError::Constraint(format!(
                "object store '{}' already exists",
                name
            )));
        }
        self.stores.insert(
            name.to_string(),
            ObjectStore {
                key_path: key_path.to_string(),
                records: BTreeMap::new(),
            },
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    databases: HashMap<String, Database>,
    scopes: HashMap<String, Arc<RwLock<()>>>,
    fault: Option<Fault>,
}

impl State {
    fn scope(&mut self, db_name: &str) -> Arc<RwLock<()>> {
        self.scopes.entry(db_name.to_string()).or_default().clone()
    }

    /// Version `db_name` must be upgraded to, `None` if it is current.
    fn pending_upgrade(&self, db_name: &str, version: Option<u32>) -> EngineResult<Option<u32>> {
        let current = self.databases.get(db_name).map(|db| db.version);
        let target = version.or(current).unwrap_or(1);
        match current {
            Some(cur) if target < cur => Err(EngineError::Open(format!(
                "requested version {} is less than existing version {}",
                target, cur
            ))),
            Some(cur) if target == cur => Ok(None),
            _ => Ok(Some(target)),
        }
    }

    fn take_fault(&mut self, stage: Fault) -> bool {
        if self.fault == Some(stage) {
            self.fault = None;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// In-memory engine.
///
/// Clones share the same databases and counters, so a test can keep a handle
/// to inspect what a `StoreWrapper` did with its own clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
}

impl MemoryEngine {
    /// Create an engine with no databases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next operation reaching `stage` fail.
    pub fn inject_fault(&self, stage: Fault) {
        self.state.lock().fault = Some(stage);
    }

    /// Number of connections opened successfully.
    pub fn open_count(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Number of `close` calls across all connections.
    pub fn close_count(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Current version of a database, `None` if it does not exist.
    pub fn version(&self, db_name: &str) -> Option<u32> {
        self.state.lock().databases.get(db_name).map(|db| db.version)
    }

    /// Sorted object store names of a database.
    pub fn store_names(&self, db_name: &str) -> Vec<String> {
        let state = self.state.lock();
        let mut names: Vec<String> = state
            .databases
            .get(db_name)
            .map(|db| db.stores.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Number of records in a store (0 if the database or store is missing).
    pub fn record_count(&self, db_name: &str, store: &str) -> usize {
        self.state
            .lock()
            .databases
            .get(db_name)
            .and_then(|db| db.stores.get(store))
            .map(|s| s.records.len())
            .unwrap_or(0)
    }

    /// Delete a database. Returns `true` if it existed.
    pub fn delete_database(&self, db_name: &str) -> bool {
        self.state.lock().databases.remove(db_name).is_some()
    }
}

#[async_trait(?Send)]
impl Engine for MemoryEngine {
    type Connection = MemoryConnection;

    async fn open(
        &self,
        name: &str,
        version: Option<u32>,
        mut on_upgrade: Box<UpgradeFn>,
    ) -> EngineResult<MemoryConnection> {
        let (scope, upgrade_fault, pending) = {
            let mut state = self.state.lock();
            if state.take_fault(Fault::Open) {
                return Err(EngineError::Open(format!("failed to open '{}'", name)));
            }
            if version == Some(0) {
                return Err(EngineError::Open("version must be greater than 0".into()));
            }
            let upgrade_fault = state.take_fault(Fault::Upgrade);
            let pending = state.pending_upgrade(name, version)?;
            (state.scope(name), upgrade_fault, pending)
        };

        if pending.is_some() {
            // Exclusive scope: no transaction writes between staging the
            // schema and storing it back. The callback runs without the state lock.
            let _exclusive = scope.write();
            let staged = {
                let state = self.state.lock();
                match state.pending_upgrade(name, version)? {
                    Some(target) => {
                        let mut db = state.databases.get(name).cloned().unwrap_or_default();
                        db.version = target;
                        Some(db)
                    }
                    // Another connection finished the same upgrade first
                    None => None,
                }
            };

            if let Some(mut db) = staged {
                if upgrade_fault {
                    return Err(EngineError::Upgrade(format!(
                        "no database handle for '{}'",
                        name
                    )));
                }
                on_upgrade(&mut db).map_err(|e| match e {
                    EngineError::Upgrade(_) => e,
                    other => EngineError::Upgrade(other.to_string()),
                })?;
                self.state.lock().databases.insert(name.to_string(), db);
            }
        }

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            state: self.state.clone(),
            counters: self.counters.clone(),
            db_name: name.to_string(),
            closed: Cell::new(false),
        })
    }
}

/// Connection to a database held by a `MemoryEngine`.
#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
    db_name: String,
    closed: Cell<bool>,
}

impl Connection for MemoryConnection {
    type Transaction = MemoryTransaction;

    fn transaction(&self, store: &str, mode: TransactionMode) -> EngineResult<MemoryTransaction> {
        let scope = self.check_transaction(store)?;
        let scope = match mode {
            TransactionMode::ReadOnly => Scope::Shared(scope.read_arc()),
            TransactionMode::ReadWrite => Scope::Exclusive(scope.write_arc()),
        };

        Ok(MemoryTransaction {
            state: self.state.clone(),
            db_name: self.db_name.clone(),
            store: store.to_string(),
            mode,
            _scope: scope,
        })
    }

    fn close(&self) {
        self.closed.set(true);
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl MemoryConnection {
    /// Validate a new transaction and return its database's scope lock.
    fn check_transaction(&self, store: &str) -> EngineResult<Arc<RwLock<()>>> {
        let mut state = self.state.lock();
        if state.take_fault(Fault::Transaction) {
            return Err(EngineError::Transaction(format!(
                "failed to begin transaction on '{}'",
                store
            )));
        }
        if self.closed.get() {
            return Err(EngineError::Transaction(
                "the database connection is closing".into(),
            ));
        }
        let has_store = state
            .databases
            .get(&self.db_name)
            .is_some_and(|db| db.stores.contains_key(store));
        if !has_store {
            return Err(EngineError::Transaction(format!(
                "object store '{}' not found",
                store
            )));
        }
        Ok(state.scope(&self.db_name))
    }
}

/// Hold on a database's scope for the lifetime of a transaction.
#[allow(dead_code)] // guards are held, never read
enum Scope {
    Shared(ArcRwLockReadGuard<RawRwLock, ()>),
    Exclusive(ArcRwLockWriteGuard<RawRwLock, ()>),
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Shared(_) => f.write_str("Shared"),
            Scope::Exclusive(_) => f.write_str("Exclusive"),
        }
    }
}

/// Transaction over one object store of a `MemoryEngine` database.
///
/// Requests apply immediately; `complete` has nothing left to flush. The
/// database scope is released when the transaction is dropped.
#[derive(Debug)]
pub struct MemoryTransaction {
    state: Arc<Mutex<State>>,
    db_name: String,
    store: String,
    mode: TransactionMode,
    _scope: Scope,
}

impl MemoryTransaction {
    fn with_store<R>(&self, f: impl FnOnce(&mut ObjectStore) -> EngineResult<R>) -> EngineResult<R> {
        let mut state = self.state.lock();
        if state.take_fault(Fault::Request) {
            return Err(EngineError::Request(format!(
                "request on '{}' failed",
                self.store
            )));
        }
        let store = state
            .databases
            .get_mut(&self.db_name)
            .and_then(|db| db.stores.get_mut(&self.store))
            .ok_or_else(|| {
                EngineError::Transaction(format!("object store '{}' was deleted", self.store))
            })?;
        f(store)
    }

    fn ensure_writable(&self) -> EngineResult<()> {
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(EngineError::ReadOnly(format!(
                "transaction on '{}' is read-only",
                self.store
            )))
        }
    }
}

/// Evaluate the store's key path against a value.
fn extract_key(store: &ObjectStore, value: &Value) -> EngineResult<String> {
    value
        .get(&store.key_path)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            EngineError::Data(format!(
                "evaluating the key path '{}' did not yield a string key",
                store.key_path
            ))
        })
}

#[async_trait(?Send)]
impl Transaction for MemoryTransaction {
    async fn get(&self, key: &str) -> EngineResult<Option<Value>> {
        self.with_store(|store| Ok(store.records.get(key).cloned()))
    }

    async fn get_key(&self, key: &str) -> EngineResult<Option<String>> {
        self.with_store(|store| Ok(store.records.contains_key(key).then(|| key.to_string())))
    }

    async fn add(&self, value: Value) -> EngineResult<()> {
        self.ensure_writable()?;
        self.with_store(|store| {
            let key = extract_key(store, &value)?;
            if store.records.contains_key(&key) {
                return Err(EngineError::Constraint(format!(
                    "key '{}' already exists in the object store",
                    key
                )));
            }
            store.records.insert(key, value);
            Ok(())
        })
    }

    async fn put(&self, value: Value) -> EngineResult<()> {
        self.ensure_writable()?;
        self.with_store(|store| {
            let key = extract_key(store, &value)?;
            store.records.insert(key, value);
            Ok(())
        })
    }

    async fn delete(&self, key: &str) -> EngineResult<()> {
        self.ensure_writable()?;
        self.with_store(|store| {
            store.records.remove(key);
            Ok(())
        })
    }

    async fn clear(&self) -> EngineResult<()> {
        self.ensure_writable()?;
        self.with_store(|store| {
            store.records.clear();
            Ok(())
        })
    }

    async fn complete(&self) -> EngineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;
    use std::rc::Rc;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    fn create_store(target: &mut dyn UpgradeTarget) -> EngineResult<()> {
        if !target.has_store("users") {
            target.create_store("users", "keyPath")?;
        }
        Ok(())
    }

    async fn open_users(engine: &MemoryEngine) -> MemoryConnection {
        engine.open("users", None, Box::new(create_store)).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_database_at_version_one() {
        let engine = MemoryEngine::new();
        let conn = open_users(&engine).await;

        assert_eq!(engine.version("users"), Some(1));
        assert_eq!(engine.store_names("users"), vec!["users"]);
        assert_eq!(engine.open_count(), 1);

        conn.close();
        assert_eq!(engine.close_count(), 1);
    }

    #[tokio::test]
    async fn test_upgrade_runs_only_on_version_change() {
        let engine = MemoryEngine::new();
        open_users(&engine).await.close();

        let calls = Rc::new(Cell::new(0));
        let counting = |calls: &Rc<Cell<usize>>| -> Box<UpgradeFn> {
            let calls = calls.clone();
            Box::new(move |_: &mut dyn UpgradeTarget| -> EngineResult<()> {
                calls.set(calls.get() + 1);
                Ok(())
            })
        };
        engine.open("users", None, counting(&calls)).await.unwrap().close();
        engine.open("users", Some(1), counting(&calls)).await.unwrap().close();
        engine.open("users", Some(2), counting(&calls)).await.unwrap().close();

        assert_eq!(calls.get(), 1);
        assert_eq!(engine.version("users"), Some(2));
    }

    #[tokio::test]
    async fn test_open_lower_version_fails() {
        let engine = MemoryEngine::new();
        engine.open("users", Some(3), Box::new(create_store)).await.unwrap().close();

        let result = engine.open("users", Some(2), Box::new(create_store)).await;
        assert!(matches!(result, Err(EngineError::Open(_))));
    }

    #[tokio::test]
    async fn test_failed_upgrade_does_not_create_database() {
        let engine = MemoryEngine::new();
        engine.inject_fault(Fault::Upgrade);

        let result = engine.open("users", None, Box::new(create_store)).await;
        assert!(matches!(result, Err(EngineError::Upgrade(_))));
        assert_eq!(engine.version("users"), None);
        assert_eq!(engine.open_count(), 0);
    }

    #[tokio::test]
    async fn test_add_enforces_uniqueness() {
        let engine = MemoryEngine::new();
        let conn = open_users(&engine).await;
        let tx = conn.transaction("users", TransactionMode::ReadWrite).unwrap();

        tx.add(json!({"keyPath": "a", "data": 1})).await.unwrap();
        let result = tx.add(json!({"keyPath": "a", "data": 2})).await;

        assert!(matches!(result, Err(EngineError::Constraint(_))));
        assert_eq!(tx.get("a").await.unwrap(), Some(json!({"keyPath": "a", "data": 1})));
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let engine = MemoryEngine::new();
        let conn = open_users(&engine).await;
        let tx = conn.transaction("users", TransactionMode::ReadOnly).unwrap();

        let result = tx.put(json!({"keyPath": "a", "data": 1})).await;
        assert!(matches!(result, Err(EngineError::ReadOnly(_))));
        assert_eq!(engine.record_count("users", "users"), 0);
    }

    #[tokio::test]
    async fn test_missing_key_is_data_error() {
        let engine = MemoryEngine::new();
        let conn = open_users(&engine).await;
        let tx = conn.transaction("users", TransactionMode::ReadWrite).unwrap();

        let result = tx.put(json!({"id": "a"})).await;
        assert!(matches!(result, Err(EngineError::Data(_))));

        let result = tx.put(json!({"keyPath": 7})).await;
        assert!(matches!(result, Err(EngineError::Data(_))));
    }

    #[tokio::test]
    async fn test_transaction_on_unknown_store_fails() {
        let engine = MemoryEngine::new();
        let conn = open_users(&engine).await;

        let result = conn.transaction("orders", TransactionMode::ReadOnly);
        assert!(matches!(result, Err(EngineError::Transaction(_))));
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_transactions() {
        let engine = MemoryEngine::new();
        let conn = open_users(&engine).await;
        conn.close();

        let result = conn.transaction("users", TransactionMode::ReadOnly);
        assert!(matches!(result, Err(EngineError::Transaction(_))));
    }

    #[tokio::test]
    async fn test_fault_is_one_shot() {
        let engine = MemoryEngine::new();
        let conn = open_users(&engine).await;
        let tx = conn.transaction("users", TransactionMode::ReadWrite).unwrap();

        engine.inject_fault(Fault::Request);
        assert!(matches!(tx.get_key("a").await, Err(EngineError::Request(_))));
        assert_eq!(tx.get_key("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let engine = MemoryEngine::new();
        let conn = open_users(&engine).await;
        let tx = conn.transaction("users", TransactionMode::ReadWrite).unwrap();

        tx.put(json!({"keyPath": "a"})).await.unwrap();
        tx.put(json!({"keyPath": "b"})).await.unwrap();
        tx.delete("a").await.unwrap();
        tx.delete("missing").await.unwrap();
        assert_eq!(engine.record_count("users", "users"), 1);

        tx.clear().await.unwrap();
        assert_eq!(engine.record_count("users", "users"), 0);
    }

    #[tokio::test]
    async fn test_upgrade_fault_is_spent_without_upgrade() {
        let engine = MemoryEngine::new();
        open_users(&engine).await.close();

        engine.inject_fault(Fault::Upgrade);
        open_users(&engine).await.close();

        // The next database that does need an upgrade is unaffected
        let conn = engine.open("orders", None, Box::new(create_store)).await;
        assert!(conn.is_ok());
        assert_eq!(engine.version("orders"), Some(1));
    }

    #[test]
    fn test_read_write_transaction_is_exclusive() {
        let engine = MemoryEngine::new();
        let conn = block_on(open_users(&engine));
        let tx = conn.transaction("users", TransactionMode::ReadWrite).unwrap();

        let started = Arc::new(AtomicBool::new(false));
        let other = {
            let engine = engine.clone();
            let started = started.clone();
            thread::spawn(move || {
                let conn = block_on(open_users(&engine));
                let tx = conn.transaction("users", TransactionMode::ReadWrite).unwrap();
                started.store(true, Ordering::SeqCst);
                block_on(tx.get_key("a")).unwrap()
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!started.load(Ordering::SeqCst));

        block_on(tx.put(json!({"keyPath": "a"}))).unwrap();
        drop(tx);

        assert_eq!(other.join().unwrap(), Some("a".to_string()));
        assert!(started.load(Ordering::SeqCst));
    }

    #[test]
    fn test_read_only_transactions_share_scope() {
        let engine = MemoryEngine::new();
        let conn = block_on(open_users(&engine));
        let first = conn.transaction("users", TransactionMode::ReadOnly).unwrap();
        let second = conn.transaction("users", TransactionMode::ReadOnly).unwrap();

        assert_eq!(block_on(first.get("a")).unwrap(), None);
        assert_eq!(block_on(second.get("a")).unwrap(), None);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let engine = MemoryEngine::new();
        let other = engine.clone();
        open_users(&other).await.close();

        assert_eq!(engine.version("users"), Some(1));
        assert_eq!(engine.close_count(), 1);
        assert!(engine.delete_database("users"));
        assert_eq!(other.version("users"), None);
    }
}

//! Engine protocol for embedded key-value document stores
//!
//! A `StoreWrapper` never talks to a database directly. It is constructed with
//! an `Engine`, which speaks an open/upgrade/transaction/request protocol:
//!
//! - **Memory**: in-process engine with IndexedDB semantics (`MemoryEngine`)
//! - **IndexedDB**: browser storage via web-sys (separate crate, WASM only)
//!
//! # Example
//!
//! ```rust
//! use storewrap_core::engine::{Connection, Engine, EngineResult, MemoryEngine, Transaction, UpgradeTarget};
//! use storewrap_core::TransactionMode;
//!
//! # futures::executor::block_on(async {
//! let engine = MemoryEngine::new();
//! let on_upgrade = |db: &mut dyn UpgradeTarget| -> EngineResult<()> {
//!     if !db.has_store("notes") {
//!         db.create_store("notes", "keyPath")?;
//!     }
//!     Ok(())
//! };
//!
//! let conn = engine.open("notes", None, Box::new(on_upgrade)).await.unwrap();
//! let tx = conn.transaction("notes", TransactionMode::ReadWrite).unwrap();
//! tx.put(serde_json::json!({"keyPath": "n1", "data": "hello"})).await.unwrap();
//! assert_eq!(tx.get_key("n1").await.unwrap().as_deref(), Some("n1"));
//! conn.close();
//! # });
//! ```

mod error;
mod memory;
mod traits;

pub use error::{EngineError, EngineResult};
pub use memory::{Fault, MemoryConnection, MemoryEngine, MemoryTransaction};
pub use traits::{Connection, Engine, Transaction, UpgradeFn, UpgradeTarget};

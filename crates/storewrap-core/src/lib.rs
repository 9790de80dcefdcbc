//! Async CRUD façade over an embedded key-value document store
//!
//! `StoreWrapper` exposes `initialize`, `get`, `add` and `put` (plus `exists`,
//! `delete` and `clear`) over a single object store whose records are keyed by
//! a `keyPath` string. It does no storage work of its own: every call opens a
//! connection through an injected [`engine::Engine`], creates the object store
//! on first use, issues its request inside one transaction, and closes the
//! connection again.
//!
//! Engines:
//! - [`engine::MemoryEngine`]: in-process, IndexedDB semantics (this crate)
//! - `IndexedDbEngine`: browser IndexedDB (`storewrap-indexeddb`)
//!
//! # Example
//!
//! ```rust
//! use storewrap_core::{engine::MemoryEngine, InitOutcome, Record, StoreWrapper, TransactionMode};
//!
//! # futures::executor::block_on(async {
//! let users: StoreWrapper<serde_json::Value, _> =
//!     StoreWrapper::new(MemoryEngine::new(), "users", TransactionMode::ReadWrite);
//!
//! let init = Record::new("user1", serde_json::json!({"name": "A"}));
//! let outcome = users.initialize(init.clone()).await.unwrap();
//! assert_eq!(outcome, InitOutcome::Created(init.clone()));
//!
//! // A second initialize leaves the stored record alone
//! let outcome = users.initialize(init).await.unwrap();
//! assert!(!outcome.is_created());
//!
//! assert!(users.get("missing").await.unwrap().is_none());
//! # });
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod record;
mod wrapper;

pub use config::{ConfigError, StoreConfig};
pub use error::{Operation, Result, StoreError};
pub use record::{InitOutcome, Record, TransactionMode, KEY_PATH};
pub use wrapper::StoreWrapper;

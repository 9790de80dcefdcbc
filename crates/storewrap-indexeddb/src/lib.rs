//! IndexedDB engine for storewrap (browser WASM)
//!
//! Implements the `storewrap_core::engine` protocol over the browser's
//! IndexedDB so a `StoreWrapper` can persist records in the browser.
//!
//! Because IndexedDB is callback-based, every open, request and transaction
//! completion is turned into a `js_sys::Promise` and awaited as a `JsFuture`.
//!
//! # Schema
//!
//! Each StoreWrapper uses a database and an object store of the same name,
//! with `keyPath` as the store's key path. Records are stored as plain JS
//! objects `{ keyPath, data }`.
//!
//! # Example
//!
//! ```rust,ignore
//! use storewrap_core::{Record, StoreWrapper, TransactionMode};
//! use storewrap_indexeddb::IndexedDbEngine;
//!
//! let users: StoreWrapper<serde_json::Value, _> =
//!     StoreWrapper::new(IndexedDbEngine::new(), "users", TransactionMode::ReadWrite);
//!
//! users.put(Record::new("user1", serde_json::json!({"name": "A"}))).await?;
//! let retrieved = users.get("user1").await?;
//! assert!(retrieved.is_some());
//! ```

pub mod convert;
pub mod engine;
pub mod error;
pub mod idb;

#[cfg(feature = "bindings")]
pub mod bindings;

pub use engine::{IdbConnection, IdbStoreTransaction, IndexedDbEngine};
pub use error::{IndexedDbError, Result};

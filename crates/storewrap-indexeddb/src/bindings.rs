//! JavaScript bindings: `StoreWrapper` as a wasm-bindgen class
//!
//! ```js
//! const users = new StoreWrapper("users", "readwrite");
//! await users.initialize({ keyPath: "user1", data: { name: "A" } });
//! const user = await users.get("user1");   // undefined when missing
//! ```
//!
//! Records cross the boundary as plain JS objects of the form
//! `{ keyPath, data }`. Every method returns a Promise; failures reject with
//! an `Error` carrying the StoreWrapper error message.

use std::rc::Rc;

use js_sys::Promise;
use serde_json::Value;
use storewrap_core::{InitOutcome, Record, StoreError, StoreWrapper, TransactionMode};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::convert::{js_to_value, value_to_js};
use crate::engine::IndexedDbEngine;

type JsonStore = StoreWrapper<Value, IndexedDbEngine>;

/// StoreWrapper over IndexedDB with JSON payloads.
#[wasm_bindgen(js_name = StoreWrapper)]
pub struct JsStoreWrapper {
    inner: Rc<JsonStore>,
}

#[wasm_bindgen(js_class = StoreWrapper)]
impl JsStoreWrapper {
    /// `mode` is `"readonly"` or `"readwrite"`.
    #[wasm_bindgen(constructor)]
    pub fn new(store_name: String, mode: String) -> Result<JsStoreWrapper, JsValue> {
        // Route Rust panics to console.error instead of "RuntimeError: unreachable"
        console_error_panic_hook::set_once();

        let mode: TransactionMode = mode.parse().map_err(|e: String| js_error(&e))?;
        Ok(Self {
            inner: Rc::new(StoreWrapper::new(IndexedDbEngine::new(), store_name, mode)),
        })
    }

    /// Resolves with the record when it was written; rejects when a record
    /// already exists at its key.
    pub fn initialize(&self, record: JsValue) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let record = record_from_js(&record)?;
            match store.initialize(record).await.map_err(store_error)? {
                InitOutcome::Created(record) => record_to_js(&record),
                InitOutcome::AlreadyExists(record) => Err(js_error(&format!(
                    "indexedDB initialize: record '{}' already exists",
                    record.key()
                ))),
            }
        })
    }

    /// Resolves with the record, or `undefined` when the key is missing.
    pub fn get(&self, key: String) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            match store.get(&key).await.map_err(store_error)? {
                Some(record) => record_to_js(&record),
                None => Ok(JsValue::UNDEFINED),
            }
        })
    }

    pub fn add(&self, record: JsValue) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let record = record_from_js(&record)?;
            let written = store.add(record).await.map_err(store_error)?;
            record_to_js(&written)
        })
    }

    pub fn put(&self, record: JsValue) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let record = record_from_js(&record)?;
            let written = store.put(record).await.map_err(store_error)?;
            record_to_js(&written)
        })
    }

    /// Resolves with `true` if a record was deleted.
    pub fn delete(&self, key: String) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let deleted = store.delete(&key).await.map_err(store_error)?;
            Ok(JsValue::from_bool(deleted))
        })
    }

    pub fn clear(&self) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            store.clear().await.map_err(store_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }
}

fn js_error(msg: &str) -> JsValue {
    js_sys::Error::new(msg).into()
}

fn store_error(err: StoreError) -> JsValue {
    js_error(&err.to_string())
}

fn record_from_js(val: &JsValue) -> Result<Record<Value>, JsValue> {
    let value = js_to_value(val).map_err(|e| js_error(&e.to_string()))?;
    serde_json::from_value(value).map_err(|e| js_error(&format!("invalid record: {}", e)))
}

fn record_to_js(record: &Record<Value>) -> Result<JsValue, JsValue> {
    let value = serde_json::to_value(record).map_err(|e| js_error(&e.to_string()))?;
    value_to_js(&value).map_err(|e| js_error(&e.to_string()))
}

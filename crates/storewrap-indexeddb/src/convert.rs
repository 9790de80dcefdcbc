//! serde_json::Value <-> JsValue conversion
//!
//! Values cross the boundary as JSON text through the browser's own `JSON`
//! object, so stored records are plain JS objects readable by other code.

use serde_json::Value;
use wasm_bindgen::JsValue;

use crate::error::{js_message, IndexedDbError, Result};

/// Convert a JSON value into a JS value for IndexedDB storage.
pub fn value_to_js(value: &Value) -> Result<JsValue> {
    let json = serde_json::to_string(value)?;
    js_sys::JSON::parse(&json).map_err(|e| IndexedDbError::JsValue(js_message(&e)))
}

/// Convert a JS value read from IndexedDB back into a JSON value.
pub fn js_to_value(val: &JsValue) -> Result<Value> {
    let json: String = js_sys::JSON::stringify(val)
        .map_err(|e| IndexedDbError::JsValue(js_message(&e)))?
        .into();
    Ok(serde_json::from_str(&json)?)
}

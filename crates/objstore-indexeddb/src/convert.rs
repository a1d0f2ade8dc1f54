//! Conversions between objstore values and JS values.
//!
//! Records go through `JSON.stringify`/`JSON.parse`, so they must be plain
//! JSON on both sides. Integers beyond 2^53 lose precision in JS.

use js_sys::{Array, ArrayBuffer, Date, Uint8Array};
use objstore_core::{DriverError, KeyRange, StoreKey};
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::IdbKeyRange;

use crate::error::{js_error_message, IndexedDbError, Result};

/// Convert a JSON record to a JS object for IndexedDB storage.
pub fn record_to_js(record: &Value) -> Result<JsValue> {
    let json = serde_json::to_string(record)?;
    js_sys::JSON::parse(&json).map_err(|e| IndexedDbError::JsValue(js_error_message(&e)))
}

/// Convert a JS object from IndexedDB back to a JSON record.
pub fn js_to_record(val: &JsValue) -> Result<Value> {
    let json: String = js_sys::JSON::stringify(val)
        .map_err(|e| IndexedDbError::JsValue(js_error_message(&e)))?
        .into();
    Ok(serde_json::from_str(&json)?)
}

/// Convert a JS array of records.
pub fn js_to_records(val: &JsValue) -> Result<Vec<Value>> {
    let array = Array::from(val);
    let mut records = Vec::with_capacity(array.length() as usize);
    for i in 0..array.length() {
        records.push(js_to_record(&array.get(i))?);
    }
    Ok(records)
}

/// Convert a key to its native JS form.
pub fn key_to_js(key: &StoreKey) -> JsValue {
    match key {
        StoreKey::Number(n) => JsValue::from_f64(*n),
        StoreKey::String(s) => JsValue::from_str(s),
        StoreKey::Binary(bytes) => Uint8Array::from(bytes.as_slice()).into(),
        StoreKey::Array(items) => {
            let array = Array::new_with_length(items.len() as u32);
            for (i, item) in items.iter().enumerate() {
                array.set(i as u32, key_to_js(item));
            }
            array.into()
        }
    }
}

/// Convert a JS key (as returned by cursors) to a `StoreKey`.
///
/// Dates become their millisecond timestamps.
pub fn js_to_key(val: &JsValue) -> Result<StoreKey> {
    if let Some(n) = val.as_f64() {
        return Ok(StoreKey::Number(n));
    }
    if let Some(s) = val.as_string() {
        return Ok(StoreKey::String(s));
    }
    if let Some(date) = val.dyn_ref::<Date>() {
        return Ok(StoreKey::Number(date.get_time()));
    }
    if let Some(bytes) = val.dyn_ref::<Uint8Array>() {
        return Ok(StoreKey::Binary(bytes.to_vec()));
    }
    if let Some(buffer) = val.dyn_ref::<ArrayBuffer>() {
        return Ok(StoreKey::Binary(Uint8Array::new(buffer).to_vec()));
    }
    if Array::is_array(val) {
        let array = Array::from(val);
        let mut items = Vec::with_capacity(array.length() as usize);
        for i in 0..array.length() {
            items.push(js_to_key(&array.get(i))?);
        }
        return Ok(StoreKey::Array(items));
    }
    Err(DriverError::InvalidKey(format!("unsupported JS key: {}", js_error_message(val))).into())
}

/// Build the IDBKeyRange for an inclusive range.
pub fn range_to_js(range: &KeyRange) -> Result<IdbKeyRange> {
    let built = if range.is_only() {
        IdbKeyRange::only(&key_to_js(range.lower()))
    } else {
        IdbKeyRange::bound(&key_to_js(range.lower()), &key_to_js(range.upper()))
    };
    built.map_err(|e| IndexedDbError::Request(format!("key range: {}", js_error_message(&e))))
}

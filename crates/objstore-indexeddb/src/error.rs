//! Error types for the IndexedDB driver

use objstore_core::DriverError;
use thiserror::Error;

/// Result type for IndexedDB operations
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Errors that can occur during IndexedDB operations
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// Database open/upgrade error
    #[error("IndexedDB open error: {0}")]
    Open(String),

    /// Transaction error or abort
    #[error("IndexedDB transaction error: {0}")]
    Transaction(String),

    /// Request error from IDB operation
    #[error("IndexedDB request error: {0}")]
    Request(String),

    /// A request violated a key or unique-index constraint
    #[error("IndexedDB constraint error: {0}")]
    Constraint(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JavaScript value conversion error
    #[error("JS conversion error: {0}")]
    JsValue(String),

    /// Driver-level error (schema, keys)
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl From<wasm_bindgen::JsValue> for IndexedDbError {
    fn from(val: wasm_bindgen::JsValue) -> Self {
        IndexedDbError::Request(js_error_message(&val))
    }
}

/// Best-effort human-readable message for a thrown JS value.
pub fn js_error_message(val: &wasm_bindgen::JsValue) -> String {
    use wasm_bindgen::JsCast;

    if let Some(exception) = val.dyn_ref::<web_sys::DomException>() {
        return format!("{}: {}", exception.name(), exception.message());
    }
    if let Some(s) = val.as_string() {
        return s;
    }
    js_sys::JSON::stringify(val)
        .map(String::from)
        .unwrap_or_else(|_| format!("{:?}", val))
}

/// Convert IndexedDbError to DriverError for the driver trait
impl From<IndexedDbError> for DriverError {
    fn from(err: IndexedDbError) -> Self {
        match err {
            IndexedDbError::Driver(e) => e,
            IndexedDbError::Json(e) => DriverError::Serialization(e.to_string()),
            IndexedDbError::NotAvailable(msg) => {
                DriverError::Backend(format!("IndexedDB not available: {}", msg))
            }
            IndexedDbError::Open(msg) => DriverError::Backend(format!("IndexedDB open: {}", msg)),
            IndexedDbError::Transaction(msg) => {
                DriverError::Backend(format!("IndexedDB transaction: {}", msg))
            }
            IndexedDbError::Request(msg) => {
                DriverError::Backend(format!("IndexedDB request: {}", msg))
            }
            IndexedDbError::Constraint(msg) => {
                DriverError::Backend(format!("IndexedDB constraint: {}", msg))
            }
            IndexedDbError::JsValue(msg) => DriverError::Backend(format!("IndexedDB JS: {}", msg)),
        }
    }
}

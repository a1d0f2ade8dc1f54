//! Store keys and key ranges.
//!
//! `StoreKey` models the values an IndexedDB store accepts as primary keys or
//! index keys, ordered the way IndexedDB compares them: by type first
//! (number < string < binary < array), then by value.

use std::cmp::Ordering;
use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{DriverError, DriverResult};

/// Largest magnitude at which an integral `f64` still round-trips through `i64`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// 2^64, the `f64` that `u64::MAX` rounds to.
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

/// A valid primary-key or index-key value.
#[derive(Debug, Clone)]
pub enum StoreKey {
    Number(f64),
    String(String),
    Binary(Vec<u8>),
    Array(Vec<StoreKey>),
}

impl StoreKey {
    /// Convert a JSON value into a key.
    ///
    /// Numbers, strings and arrays of keys are valid. `null`, booleans,
    /// objects and NaN are not.
    pub fn from_json(value: &Value) -> DriverResult<Self> {
        match value {
            Value::Number(n) => {
                let n = n
                    .as_f64()
                    .ok_or_else(|| DriverError::InvalidKey(format!("{} is not a number", n)))?;
                if n.is_nan() {
                    return Err(DriverError::InvalidKey("NaN".into()));
                }
                Ok(StoreKey::Number(n))
            }
            Value::String(s) => Ok(StoreKey::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(StoreKey::from_json)
                .collect::<DriverResult<Vec<_>>>()
                .map(StoreKey::Array),
            other => Err(DriverError::InvalidKey(format!(
                "{} is not a valid key",
                other
            ))),
        }
    }

    /// Convert the key back into JSON.
    ///
    /// Integral numbers become JSON integers so they deserialize into integer
    /// key types. Binary keys become arrays of byte values.
    pub fn to_json(&self) -> Value {
        match self {
            StoreKey::Number(n) => {
                if n.fract() == 0.0 && n.abs() < I64_BOUND {
                    Value::from(*n as i64)
                } else if n.fract() == 0.0 && *n > 0.0 && *n <= U64_BOUND {
                    // Saturates 2^64 to u64::MAX
                    Value::from(*n as u64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            StoreKey::String(s) => Value::String(s.clone()),
            StoreKey::Binary(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
            StoreKey::Array(items) => Value::Array(items.iter().map(StoreKey::to_json).collect()),
        }
    }

    /// Encode a typed key through its serde representation.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> DriverResult<Self> {
        let json = serde_json::to_value(value)?;
        Self::from_json(&json)
    }

    /// Decode the key into a typed value through its serde representation.
    pub fn decode<T: DeserializeOwned>(&self) -> DriverResult<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }

    fn type_rank(&self) -> u8 {
        match self {
            StoreKey::Number(_) => 0,
            StoreKey::String(_) => 1,
            StoreKey::Binary(_) => 2,
            StoreKey::Array(_) => 3,
        }
    }
}

impl PartialEq for StoreKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for StoreKey {}

impl PartialOrd for StoreKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StoreKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (StoreKey::Number(a), StoreKey::Number(b)) => {
                a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b))
            }
            // IndexedDB compares strings by UTF-16 code units
            (StoreKey::String(a), StoreKey::String(b)) => a.encode_utf16().cmp(b.encode_utf16()),
            (StoreKey::Binary(a), StoreKey::Binary(b)) => a.cmp(b),
            (StoreKey::Array(a), StoreKey::Array(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<i64> for StoreKey {
    fn from(n: i64) -> Self {
        StoreKey::Number(n as f64)
    }
}

impl From<i32> for StoreKey {
    fn from(n: i32) -> Self {
        StoreKey::Number(f64::from(n))
    }
}

impl From<u32> for StoreKey {
    fn from(n: u32) -> Self {
        StoreKey::Number(f64::from(n))
    }
}

impl From<&str> for StoreKey {
    fn from(s: &str) -> Self {
        StoreKey::String(s.to_string())
    }
}

impl From<String> for StoreKey {
    fn from(s: String) -> Self {
        StoreKey::String(s)
    }
}

impl From<Vec<u8>> for StoreKey {
    fn from(bytes: Vec<u8>) -> Self {
        StoreKey::Binary(bytes)
    }
}

/// Inclusive key range `[lower, upper]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    lower: StoreKey,
    upper: StoreKey,
}

impl KeyRange {
    /// Range covering every key between `lower` and `upper`, both included.
    ///
    /// Returns `DriverError::InvalidKey` if `lower` sorts after `upper`.
    pub fn bound(lower: StoreKey, upper: StoreKey) -> DriverResult<Self> {
        if lower > upper {
            return Err(DriverError::InvalidKey(format!(
                "lower bound {} is greater than upper bound {}",
                lower, upper
            )));
        }
        Ok(Self { lower, upper })
    }

    /// Range matching exactly one key.
    pub fn only(value: StoreKey) -> Self {
        Self {
            lower: value.clone(),
            upper: value,
        }
    }

    pub fn lower(&self) -> &StoreKey {
        &self.lower
    }

    pub fn upper(&self) -> &StoreKey {
        &self.upper
    }

    pub fn contains(&self, key: &StoreKey) -> bool {
        key >= &self.lower && key <= &self.upper
    }

    /// True if the range matches a single key.
    pub fn is_only(&self) -> bool {
        self.lower == self.upper
    }
}

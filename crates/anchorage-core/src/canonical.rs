//! Canonical JSON encoding
//!
//! Compact JSON with object keys sorted by code point and UTF-8 left
//! unescaped. Structurally equal values always encode to identical bytes,
//! which is what signing and leaf hashing rely on.
//!
//! Key ordering comes from `serde_json::Map` being a `BTreeMap`; the
//! workspace must never enable serde_json's `preserve_order` feature.
//!
//! Numbers are written the way serde_json writes them. Floats use the
//! shortest round-trip form with a bare exponent (`1e20`, never `1e+20`),
//! and integers outside the 64-bit range are read and written as floats.
//! Devices that need bit-exact numbers beyond that should send them as
//! strings.

use serde::Serialize;
use serde_json::Value;

use crate::errors::{AnchorageError, Result};

/// Encode any serializable value canonically
pub fn to_canonical_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    // Round-trip through `Value` so struct field order cannot leak into the bytes.
    let value = serde_json::to_value(value)
        .map_err(|e| AnchorageError::invalid_record(format!("not canonically encodable: {e}")))?;
    encode_value(&value)
}

/// Encode an already-built JSON value canonically
pub fn encode_value(value: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| AnchorageError::invalid_record(format!("not canonically encodable: {e}")))
}

/// Canonical encoding as a UTF-8 string
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let bytes = to_canonical_vec(value)?;
    String::from_utf8(bytes).map_err(|e| AnchorageError::serialization(e.to_string()))
}

//! Canonical JSON serialization for deterministic hashing
//!
//! Model artifacts are written with sorted object keys and no whitespace so
//! the BLAKE3 digest of the file identifies the model on every platform.

use serde::Serialize;

/// Serialize a value to canonical JSON (sorted keys, no whitespace).
///
/// Going through `serde_json::Value` sorts keys: its map is a `BTreeMap`
/// while the `preserve_order` feature stays off. Floats are written with
/// shortest round-trip precision and parsed back exactly (`float_roundtrip`).
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&serde_json::to_value(value)?)
}

/// BLAKE3 hex digest of raw bytes
pub fn hash_bytes_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// BLAKE3 digest of the canonical JSON text, hex encoded
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(hash_bytes_hex(to_canonical_json(value)?.as_bytes()))
}

//! Writing schema documents and hashing their content.

use sha2::{Digest, Sha256};

use formweave_core::Schema;

use crate::deserialize::InterchangeError;

fn serialize_err(e: impl std::fmt::Display) -> InterchangeError {
    InterchangeError::Serialize(e.to_string())
}

/// Compact JSON in field declaration order.
pub fn to_json(schema: &Schema) -> Result<String, InterchangeError> {
    serde_json::to_string(schema).map_err(serialize_err)
}

pub fn to_json_pretty(schema: &Schema) -> Result<String, InterchangeError> {
    serde_json::to_string_pretty(schema).map_err(serialize_err)
}

pub fn to_yaml(schema: &Schema) -> Result<String, InterchangeError> {
    serde_yaml::to_string(schema).map_err(serialize_err)
}

/// Compact JSON with object keys sorted.
///
/// Going through `serde_json::Value` sorts keys, so two schemas that are
/// equal produce identical bytes regardless of how they were built.
pub fn to_canonical_json(schema: &Schema) -> Result<Vec<u8>, InterchangeError> {
    let value = serde_json::to_value(schema).map_err(serialize_err)?;
    serde_json::to_vec(&value).map_err(serialize_err)
}

/// Lowercase hex SHA-256 of the canonical JSON form.
pub fn content_hash(schema: &Schema) -> Result<String, InterchangeError> {
    let bytes = to_canonical_json(schema)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

pub mod data;
pub mod security;

pub use data::*;
pub use security::*;

use serde_json::Value;
use thiserror::Error;

/// Opaque handle for a person, stable for the engine's lifetime.
pub type Identity = i64;

/// A persisted record that could not be turned back into a typed value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{section}[{key}]: {reason}")]
pub struct CorruptRecord {
    pub section: &'static str,
    pub key: String,
    pub reason: String,
}

impl CorruptRecord {
    pub fn new(section: &'static str, key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            section,
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Parses a JSON object key back into an identity.
pub(crate) fn parse_identity_key(section: &'static str, key: &str) -> Result<Identity, CorruptRecord> {
    key.trim()
        .parse::<Identity>()
        .map_err(|_| CorruptRecord::new(section, key, "key is not an integer identity"))
}

/// Fails when any of `fields` is absent from a JSON object.
pub(crate) fn require_fields(
    section: &'static str,
    key: &str,
    value: &Value,
    fields: &[&str],
) -> Result<(), CorruptRecord> {
    let object = value
        .as_object()
        .ok_or_else(|| CorruptRecord::new(section, key, "record is not an object"))?;
    for field in fields {
        if !object.contains_key(*field) {
            return Err(CorruptRecord::new(
                section,
                key,
                format!("missing required field '{field}'"),
            ));
        }
    }
    Ok(())
}

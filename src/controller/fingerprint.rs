//! Content fingerprints for drift detection
//!
//! A DeployChart is re-applied only when the SHA-256 of its canonical spec
//! differs from `status.lastAppliedHash`. The canonical form is JSON with
//! object keys sorted at every level, so two specs that differ only in key
//! insertion order always hash the same.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::crd::DeployChartSpec;
use crate::error::{Error, Result};

/// Hex-encoded SHA-256 of the canonical spec
pub fn fingerprint(spec: &DeployChartSpec) -> Result<String> {
    let value = serde_json::to_value(spec).map_err(Error::Encoding)?;
    let bytes = serde_json::to_vec(&Canonical(&value)).map_err(Error::Encoding)?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Serializes a JSON value with sorted object keys
struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));

                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &Canonical(value))?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&Canonical(item))?;
                }
                out.end()
            }
            scalar => scalar.serialize(serializer),
        }
    }
}

//! Reference-index manifest parsing.
//!
//! A reference manifest maps Zarr store keys (`".zgroup"`, `"2t/.zarray"`,
//! `"2t/0.0.0"`, ...) to either inline values or byte ranges within objects
//! held elsewhere, typically a remote object store. Two layouts exist in the
//! wild: version 0 is a flat JSON object of key to reference, version 1 wraps
//! the same map as `{"version": 1, "templates": {...}, "refs": {...}}` with
//! `{{name}}` placeholders in targets.

use std::collections::BTreeMap;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde_json::Value;

use crate::error::{KerchunkError, Result};

/// A single resolved reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefEntry {
    /// The value is stored inline in the manifest.
    Inline(Bytes),
    /// The value is an entire remote object.
    Whole { target: String },
    /// The value is a byte range within a remote object.
    Range {
        target: String,
        offset: u64,
        length: u64,
    },
}

impl RefEntry {
    /// The size of the referenced value in bytes, if the manifest knows it.
    ///
    /// Whole-object references require a remote lookup, so their size is
    /// unknown here.
    pub fn known_size(&self) -> Option<u64> {
        match self {
            Self::Inline(bytes) => Some(bytes.len() as u64),
            Self::Range { length, .. } => Some(*length),
            Self::Whole { .. } => None,
        }
    }
}

/// A parsed reference manifest.
#[derive(Debug, Clone, Default)]
pub struct ReferenceManifest {
    refs: BTreeMap<String, RefEntry>,
}

impl ReferenceManifest {
    /// Read and parse a manifest file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_slice(&bytes)
    }

    /// Parse a manifest from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(&value)
    }

    /// Parse a manifest from a JSON value.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| KerchunkError::invalid_ref("<root>", "manifest must be an object"))?;

        // Version 1 wraps the refs map; version 0 is the refs map itself.
        let (raw_refs, templates) = if let Some(refs) = object.get("refs") {
            let version = object.get("version").and_then(Value::as_u64).unwrap_or(1);
            if version != 1 {
                return Err(KerchunkError::UnsupportedVersion(version));
            }

            let templates: BTreeMap<String, String> = object
                .get("templates")
                .and_then(Value::as_object)
                .map(|map| {
                    map.iter()
                        .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                        .collect()
                })
                .unwrap_or_default();

            let refs = refs.as_object().ok_or_else(|| {
                KerchunkError::invalid_ref("refs", "refs must be an object")
            })?;

            (refs, templates)
        } else {
            (object, BTreeMap::new())
        };

        let mut refs = BTreeMap::new();
        for (key, raw) in raw_refs {
            refs.insert(key.clone(), parse_entry(key, raw, &templates)?);
        }

        Ok(Self { refs })
    }

    /// Look up a reference by store key.
    pub fn get(&self, key: &str) -> Option<&RefEntry> {
        self.refs.get(key)
    }

    /// Whether the manifest holds a reference for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.refs.contains_key(key)
    }

    /// Number of references.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Whether the manifest is empty.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Iterate over all store keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.refs.keys().map(String::as_str)
    }

    /// Names of the Zarr arrays the manifest describes, in key order.
    ///
    /// An array is identified by its `<name>/.zarray` metadata key.
    pub fn array_names(&self) -> Vec<String> {
        self.refs
            .keys()
            .filter_map(|key| key.strip_suffix("/.zarray"))
            .map(str::to_string)
            .collect()
    }
}

fn parse_entry(
    key: &str,
    raw: &Value,
    templates: &BTreeMap<String, String>,
) -> Result<RefEntry> {
    match raw {
        Value::String(s) => {
            if let Some(encoded) = s.strip_prefix("base64:") {
                let decoded = BASE64
                    .decode(encoded)
                    .map_err(|_| KerchunkError::Base64(key.to_string()))?;
                Ok(RefEntry::Inline(Bytes::from(decoded)))
            } else {
                Ok(RefEntry::Inline(Bytes::from(s.clone().into_bytes())))
            }
        }
        Value::Array(parts) => match parts.as_slice() {
            [Value::String(target)] => Ok(RefEntry::Whole {
                target: expand_template(target, templates),
            }),
            [Value::String(target), offset, length] => {
                let offset = offset.as_u64().ok_or_else(|| {
                    KerchunkError::invalid_ref(key, "offset must be a non-negative integer")
                })?;
                let length = length.as_u64().ok_or_else(|| {
                    KerchunkError::invalid_ref(key, "length must be a non-negative integer")
                })?;
                Ok(RefEntry::Range {
                    target: expand_template(target, templates),
                    offset,
                    length,
                })
            }
            _ => Err(KerchunkError::invalid_ref(
                key,
                format!("expected [target] or [target, offset, length], got {} parts", parts.len()),
            )),
        },
        _ => Err(KerchunkError::invalid_ref(
            key,
            "reference must be a string or an array",
        )),
    }
}

/// Expand `{{name}}` placeholders from the manifest's template table.
fn expand_template(target: &str, templates: &BTreeMap<String, String>) -> String {
    if templates.is_empty() || !target.contains("{{") {
        return target.to_string();
    }

    let mut out = target.to_string();
    for (name, value) in templates {
        out = out.replace(&format!("{{{{{name}}}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_v0_flat_map() {
        let manifest = ReferenceManifest::from_value(&json!({
            ".zgroup": "{\"zarr_format\": 2}",
            "2t/.zarray": "{}",
            "2t/0.0.0": ["gs://bucket/hrrr.grib2", 1024, 512],
        }))
        .unwrap();

        assert_eq!(manifest.len(), 3);
        assert_eq!(
            manifest.get("2t/0.0.0"),
            Some(&RefEntry::Range {
                target: "gs://bucket/hrrr.grib2".to_string(),
                offset: 1024,
                length: 512,
            })
        );
        assert_eq!(
            manifest.get(".zgroup"),
            Some(&RefEntry::Inline(Bytes::from_static(
                b"{\"zarr_format\": 2}"
            )))
        );
    }

    #[test]
    fn test_parse_v1_with_templates() {
        let manifest = ReferenceManifest::from_value(&json!({
            "version": 1,
            "templates": {"u": "gs://bucket/path"},
            "refs": {
                "2t/0.0.0": ["{{u}}/hrrr.grib2", 0, 100],
                "whole": ["{{u}}/other.bin"],
            },
        }))
        .unwrap();

        assert_eq!(
            manifest.get("2t/0.0.0"),
            Some(&RefEntry::Range {
                target: "gs://bucket/path/hrrr.grib2".to_string(),
                offset: 0,
                length: 100,
            })
        );
        assert_eq!(
            manifest.get("whole"),
            Some(&RefEntry::Whole {
                target: "gs://bucket/path/other.bin".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_base64_inline() {
        let manifest = ReferenceManifest::from_value(&json!({
            "x/0": "base64:AAECAw==",
        }))
        .unwrap();

        assert_eq!(
            manifest.get("x/0"),
            Some(&RefEntry::Inline(Bytes::from_static(&[0, 1, 2, 3])))
        );
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = ReferenceManifest::from_value(&json!({
            "version": 2,
            "refs": {},
        }))
        .unwrap_err();
        assert!(matches!(err, KerchunkError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_rejects_malformed_entries() {
        assert!(ReferenceManifest::from_value(&json!({"k": 42})).is_err());
        assert!(ReferenceManifest::from_value(&json!({"k": ["t", "x", "y"]})).is_err());
        assert!(ReferenceManifest::from_value(&json!({"k": ["t", 1]})).is_err());
    }

    #[test]
    fn test_array_names() {
        let manifest = ReferenceManifest::from_value(&json!({
            ".zgroup": "{\"zarr_format\": 2}",
            "2t/.zarray": "{}",
            "2t/.zattrs": "{}",
            "2t/0.0.0": ["gs://b/o", 0, 1],
            "dswrf/.zarray": "{}",
            "valid_time/.zarray": "{}",
        }))
        .unwrap();

        assert_eq!(manifest.array_names(), vec!["2t", "dswrf", "valid_time"]);
    }

    #[test]
    fn test_known_size() {
        let inline = RefEntry::Inline(Bytes::from_static(b"abc"));
        assert_eq!(inline.known_size(), Some(3));

        let range = RefEntry::Range {
            target: "t".into(),
            offset: 5,
            length: 7,
        };
        assert_eq!(range.known_size(), Some(7));

        let whole = RefEntry::Whole { target: "t".into() };
        assert_eq!(whole.known_size(), None);
    }
}

//! Integration test: serve Zarr store reads from a manifest referencing
//! byte ranges of local files.

use std::sync::Arc;

use zarrs_storage::byte_range::ByteRange;
use zarrs_storage::{ReadableStorageTraits, StoreKey};

use kerchunk::{RemoteConfig, RemoteProtocol, ReferenceManifest, ReferenceStore};

fn local_store(dir: &std::path::Path, manifest: serde_json::Value) -> Arc<ReferenceStore> {
    let manifest = ReferenceManifest::from_value(&manifest).unwrap();
    let config = RemoteConfig::new(RemoteProtocol::Local, dir);
    Arc::new(ReferenceStore::new(manifest, config).unwrap())
}

#[test]
fn test_ranged_references_read_exact_window() {
    let dir = tempfile::tempdir().unwrap();
    // One blob holding two logical chunks back to back.
    std::fs::write(dir.path().join("chunks.bin"), b"AAAABBBBCCCCDDDD").unwrap();

    let store = local_store(
        dir.path(),
        serde_json::json!({
            "x/0": ["chunks.bin", 0, 8],
            "x/1": ["chunks.bin", 8, 8],
        }),
    );

    let first = store.get(&StoreKey::new("x/0").unwrap()).unwrap().unwrap();
    assert_eq!(first.as_ref(), b"AAAABBBB");

    let second = store.get(&StoreKey::new("x/1").unwrap()).unwrap().unwrap();
    assert_eq!(second.as_ref(), b"CCCCDDDD");
}

#[test]
fn test_partial_reads_within_a_reference() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("blob.bin"), b"....0123456789....").unwrap();

    let store = local_store(
        dir.path(),
        serde_json::json!({
            "x/0": ["blob.bin", 4, 10],
        }),
    );

    let key = StoreKey::new("x/0").unwrap();
    let parts = store
        .get_partial_values_key(
            &key,
            &[
                ByteRange::FromStart(0, Some(3)),
                ByteRange::FromStart(5, Some(2)),
                ByteRange::Suffix(2),
            ],
        )
        .unwrap()
        .unwrap();

    assert_eq!(parts[0].as_ref(), b"012");
    assert_eq!(parts[1].as_ref(), b"56");
    assert_eq!(parts[2].as_ref(), b"89");

    assert_eq!(store.size_key(&key).unwrap(), Some(10));
}

#[test]
fn test_inline_and_base64_references() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(
        dir.path(),
        serde_json::json!({
            ".zgroup": "{\"zarr_format\": 2}",
            "x/0": "base64:AAECAwQF",
        }),
    );

    let meta = store
        .get(&StoreKey::new(".zgroup").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(meta.as_ref(), b"{\"zarr_format\": 2}");

    let chunk = store.get(&StoreKey::new("x/0").unwrap()).unwrap().unwrap();
    assert_eq!(chunk.as_ref(), &[0u8, 1, 2, 3, 4, 5]);
}

#[test]
fn test_missing_keys_are_absent_not_errors() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(dir.path(), serde_json::json!({"x/0": "data"}));

    let key = StoreKey::new("zarr.json").unwrap();
    assert!(store.get(&key).unwrap().is_none());
    assert!(store.size_key(&key).unwrap().is_none());
}

#[test]
fn test_whole_object_reference() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("whole.bin"), b"whole object body").unwrap();

    let store = local_store(
        dir.path(),
        serde_json::json!({
            "y/0": ["whole.bin"],
        }),
    );

    let key = StoreKey::new("y/0").unwrap();
    let value = store.get(&key).unwrap().unwrap();
    assert_eq!(value.as_ref(), b"whole object body");
    assert_eq!(store.size_key(&key).unwrap(), Some(17));
}

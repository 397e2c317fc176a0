//! Integration test: open a Zarr V3 hierarchy from a filesystem store.
//!
//! Writes a tiny dataset with the array builder (float32 data, descending y
//! axis), then exercises open, nearest and linear sampling, and dtype
//! conversion.

use std::sync::Arc;

use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use hrrr_dataset::{Dataset, ExecBackend, ExecConfig, InterpMethod, OpenOptions};

fn dims_attr(dims: &[&str], units: Option<&str>) -> serde_json::Map<String, serde_json::Value> {
    let mut attrs = serde_json::Map::new();
    attrs.insert("_ARRAY_DIMENSIONS".to_string(), serde_json::json!(dims));
    if let Some(units) = units {
        attrs.insert("units".to_string(), serde_json::json!(units));
    }
    attrs
}

fn write_f64_coord(
    store: &Arc<FilesystemStore>,
    name: &str,
    values: &[f64],
    units: Option<&str>,
) {
    let array = ArrayBuilder::new(
        vec![values.len() as u64],
        DataType::Float64,
        vec![values.len() as u64].try_into().unwrap(),
        FillValue::from(f64::NAN),
    )
    .attributes(dims_attr(&[name], units))
    .build(store.clone(), &format!("/{name}"))
    .unwrap();
    array.store_metadata().unwrap();

    let subset = ArraySubset::new_with_shape(vec![values.len() as u64]);
    array.store_array_subset_elements(&subset, values).unwrap();
}

/// Grid value at (time index, y value, x value).
fn cell(t: usize, y: f64, x: f64) -> f32 {
    (t as f64 * 100.0 + y + x) as f32
}

fn write_dataset(dir: &std::path::Path) -> Arc<FilesystemStore> {
    let store = Arc::new(FilesystemStore::new(dir).unwrap());

    // Descending y, ascending x; three hourly time steps.
    let ys = [30.0, 20.0, 10.0, 0.0];
    let xs = [0.0, 10.0, 20.0, 30.0];

    write_f64_coord(&store, "valid_time", &[0.0, 1.0, 2.0], Some("hours since 2023-09-01"));
    write_f64_coord(&store, "y", &ys, None);
    write_f64_coord(&store, "x", &xs, None);

    let array = ArrayBuilder::new(
        vec![3, 4, 4],
        DataType::Float32,
        vec![1, 4, 4].try_into().unwrap(),
        FillValue::from(f32::NAN),
    )
    .attributes(dims_attr(&["valid_time", "y", "x"], None))
    .build(store.clone(), "/t2m")
    .unwrap();
    array.store_metadata().unwrap();

    let mut data = Vec::with_capacity(3 * 16);
    for t in 0..3 {
        for &y in &ys {
            for &x in &xs {
                data.push(cell(t, y, x));
            }
        }
    }
    let subset = ArraySubset::new_with_shape(vec![3, 4, 4]);
    array.store_array_subset_elements(&subset, &data).unwrap();

    store
}

fn names() -> Vec<String> {
    ["valid_time", "y", "x", "t2m"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[test]
fn test_open_classifies_coords_and_variables() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_dataset(dir.path());

    let ds = Dataset::open(store, &names(), OpenOptions::default()).unwrap();

    assert_eq!(ds.variable_names(), vec!["t2m"]);
    assert_eq!(ds.coord_names(), vec!["valid_time", "x", "y"]);
    assert!(ds.coord("valid_time").unwrap().is_time());
    assert!(!ds.coord("x").unwrap().is_time());
}

#[test]
fn test_linear_interp_on_descending_axis() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_dataset(dir.path());
    let ds = Dataset::open(store, &names(), OpenOptions::default()).unwrap();

    let table = ds
        .query()
        .select(&["t2m"])
        .interp_at(&[5.0], &[25.0])
        .materialize(&ExecConfig::new(ExecBackend::Serial, 1))
        .unwrap();

    assert_eq!(table.num_rows(), 3);
    for (t, value) in table.columns[0].1.iter().enumerate() {
        let expected = t as f64 * 100.0 + 25.0 + 5.0;
        assert!(
            (value - expected).abs() < 1e-4,
            "t={t}: got {value}, expected {expected}"
        );
    }
}

#[test]
fn test_nearest_method_snaps_to_grid() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_dataset(dir.path());
    let ds = Dataset::open(store, &names(), OpenOptions::default()).unwrap();

    // x = 12 is nearest to the x = 10 column; y = 24 nearest to y = 20.
    let table = ds
        .query()
        .select(&["t2m"])
        .method(InterpMethod::Nearest)
        .interp_at(&[12.0], &[24.0])
        .materialize(&ExecConfig::new(ExecBackend::Serial, 1))
        .unwrap();

    let expected = f64::from(cell(0, 20.0, 10.0));
    assert_eq!(table.columns[0].1[0], expected);
}

#[test]
fn test_float32_reads_convert_to_f64() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_dataset(dir.path());

    // Read through the raw array to confirm the on-disk dtype stays f32.
    let array: Array<FilesystemStore> = Array::open(store.clone(), "/t2m").unwrap();
    assert_eq!(array.data_type(), &DataType::Float32);

    let ds = Dataset::open(store, &names(), OpenOptions::default()).unwrap();
    let table = ds
        .query()
        .select(&["t2m"])
        .interp_at(&[0.0], &[30.0])
        .materialize(&ExecConfig::new(ExecBackend::Serial, 1))
        .unwrap();

    // Exact grid point, exactly representable in f32.
    assert_eq!(table.columns[0].1[0], 30.0);
}

//! The dataset handle.
//!
//! A [`Dataset`] is a collection of named Zarr arrays sharing a store,
//! partitioned into coordinate axes and data variables. Opening reads only
//! metadata and the (small) coordinate arrays; data variable chunks are not
//! touched until a query is materialized.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use zarrs::array::{Array, DataType};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::ReadableStorageTraits;

use hrrr_common::time::CfTimeUnits;

use crate::coords::CoordAxis;
use crate::error::{DatasetError, Result};
use crate::query::Query;

/// Attribute carrying dimension names, per the xarray Zarr convention.
const ARRAY_DIMENSIONS_ATTR: &str = "_ARRAY_DIMENSIONS";

/// Options controlling how a dataset is opened.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Variables to exclude. An excluded variable is never opened and never
    /// appears in the handle's variable or coordinate sets.
    pub drop_variables: Vec<String>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the variables to exclude at open.
    pub fn drop_variables(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.drop_variables = names.into_iter().map(Into::into).collect();
        self
    }
}

/// A named data variable backed by a Zarr array.
pub(crate) struct Variable<S: ReadableStorageTraits + Send + Sync + 'static> {
    pub(crate) name: String,
    pub(crate) array: Array<S>,
    pub(crate) dims: Vec<String>,
}

pub(crate) struct Inner<S: ReadableStorageTraits + Send + Sync + 'static> {
    pub(crate) variables: BTreeMap<String, Variable<S>>,
    pub(crate) coords: BTreeMap<String, CoordAxis>,
}

/// A lazily-evaluated, chunked, labelled dataset.
///
/// Query operations ([`Dataset::query`], [`Query::select`], ...) are
/// non-destructive and cheap; each returns a new handle and nothing is read
/// until [`Query::materialize`](crate::query::Query::materialize).
pub struct Dataset<S: ReadableStorageTraits + Send + Sync + 'static> {
    pub(crate) inner: Arc<Inner<S>>,
}

impl<S: ReadableStorageTraits + Send + Sync + 'static> Clone for Dataset<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: ReadableStorageTraits + Send + Sync + 'static> Dataset<S> {
    /// Open the named arrays from a store.
    ///
    /// One-dimensional arrays whose name equals their dimension become
    /// coordinate axes and are loaded eagerly; everything else is a data
    /// variable whose chunks stay on the store.
    pub fn open(storage: Arc<S>, names: &[String], options: OpenOptions) -> Result<Self> {
        let mut variables = BTreeMap::new();
        let mut coords = BTreeMap::new();

        for name in names {
            if options.drop_variables.iter().any(|d| d == name) {
                tracing::debug!(variable = %name, "Dropping variable at open");
                continue;
            }

            let array = Array::open(storage.clone(), &format!("/{name}"))
                .map_err(|e| DatasetError::open_failed(name, e.to_string()))?;
            let dims = dimension_names(&array);

            if dims.len() == 1 && dims[0] == *name {
                let values = read_as_f64(&array, name, &full_subset(&array))?;
                let time_units = array
                    .attributes()
                    .get("units")
                    .and_then(Value::as_str)
                    .and_then(|u| CfTimeUnits::parse(u).ok());
                coords.insert(name.clone(), CoordAxis::new(name.clone(), values, time_units)?);
            } else {
                variables.insert(
                    name.clone(),
                    Variable {
                        name: name.clone(),
                        array,
                        dims,
                    },
                );
            }
        }

        Ok(Self {
            inner: Arc::new(Inner { variables, coords }),
        })
    }

    /// Names of the data variables, in sorted order.
    pub fn variable_names(&self) -> Vec<&str> {
        self.inner.variables.keys().map(String::as_str).collect()
    }

    /// Whether a data variable with this name exists.
    pub fn has_variable(&self, name: &str) -> bool {
        self.inner.variables.contains_key(name)
    }

    /// Names of the coordinate axes, in sorted order.
    pub fn coord_names(&self) -> Vec<&str> {
        self.inner.coords.keys().map(String::as_str).collect()
    }

    /// Look up a coordinate axis.
    pub fn coord(&self, name: &str) -> Option<&CoordAxis> {
        self.inner.coords.get(name)
    }

    /// Start a lazy query over this dataset.
    ///
    /// The initial selection is every data variable; narrow it with
    /// [`Query::select`].
    pub fn query(&self) -> Query<S> {
        Query::all(self.inner.clone())
    }
}

impl<S: ReadableStorageTraits + Send + Sync + 'static> std::fmt::Display for Dataset<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Dataset: {} data variables, {} coordinates",
            self.inner.variables.len(),
            self.inner.coords.len()
        )?;
        for (name, axis) in &self.inner.coords {
            let kind = if axis.is_time() { "time" } else { "numeric" };
            writeln!(f, "  coord {name}: {} values ({kind})", axis.len())?;
        }
        for (name, var) in &self.inner.variables {
            writeln!(
                f,
                "  var {name} [{}] {}",
                var.dims.join(", "),
                dtype_name(var.array.data_type())
            )?;
        }
        Ok(())
    }
}

/// Dimension names for an array.
///
/// The xarray convention stores them in the `_ARRAY_DIMENSIONS` attribute;
/// arrays without it get positional `dim_<i>` names.
fn dimension_names<S: ReadableStorageTraits + Send + Sync + 'static>(
    array: &Array<S>,
) -> Vec<String> {
    if let Some(dims) = array
        .attributes()
        .get(ARRAY_DIMENSIONS_ATTR)
        .and_then(Value::as_array)
    {
        let parsed: Vec<String> = dims
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        if parsed.len() == array.shape().len() {
            return parsed;
        }
    }

    (0..array.shape().len()).map(|i| format!("dim_{i}")).collect()
}

/// The subset covering an entire array.
fn full_subset<S: ReadableStorageTraits + Send + Sync + 'static>(array: &Array<S>) -> ArraySubset {
    ArraySubset::new_with_shape(array.shape().to_vec())
}

/// Read a subset of an array, converting its native data type to `f64`.
pub(crate) fn read_as_f64<S: ReadableStorageTraits + Send + Sync + 'static>(
    array: &Array<S>,
    name: &str,
    subset: &ArraySubset,
) -> Result<Vec<f64>> {
    let read_failed = |e: zarrs::array::ArrayError| DatasetError::read_failed(e.to_string());

    match array.data_type() {
        DataType::Float64 => array
            .retrieve_array_subset_elements::<f64>(subset)
            .map_err(read_failed),
        DataType::Float32 => Ok(array
            .retrieve_array_subset_elements::<f32>(subset)
            .map_err(read_failed)?
            .into_iter()
            .map(f64::from)
            .collect()),
        DataType::Int64 => Ok(array
            .retrieve_array_subset_elements::<i64>(subset)
            .map_err(read_failed)?
            .into_iter()
            .map(|v| v as f64)
            .collect()),
        DataType::Int32 => Ok(array
            .retrieve_array_subset_elements::<i32>(subset)
            .map_err(read_failed)?
            .into_iter()
            .map(f64::from)
            .collect()),
        DataType::Int16 => Ok(array
            .retrieve_array_subset_elements::<i16>(subset)
            .map_err(read_failed)?
            .into_iter()
            .map(f64::from)
            .collect()),
        DataType::Int8 => Ok(array
            .retrieve_array_subset_elements::<i8>(subset)
            .map_err(read_failed)?
            .into_iter()
            .map(f64::from)
            .collect()),
        DataType::UInt64 => Ok(array
            .retrieve_array_subset_elements::<u64>(subset)
            .map_err(read_failed)?
            .into_iter()
            .map(|v| v as f64)
            .collect()),
        DataType::UInt32 => Ok(array
            .retrieve_array_subset_elements::<u32>(subset)
            .map_err(read_failed)?
            .into_iter()
            .map(f64::from)
            .collect()),
        DataType::UInt16 => Ok(array
            .retrieve_array_subset_elements::<u16>(subset)
            .map_err(read_failed)?
            .into_iter()
            .map(f64::from)
            .collect()),
        DataType::UInt8 => Ok(array
            .retrieve_array_subset_elements::<u8>(subset)
            .map_err(read_failed)?
            .into_iter()
            .map(f64::from)
            .collect()),
        other => Err(DatasetError::UnsupportedDataType {
            name: name.to_string(),
            dtype: format!("{other:?}"),
        }),
    }
}

/// Human-readable data type name for dataset summaries.
fn dtype_name(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Bool => "bool",
        DataType::Int8 => "int8",
        DataType::Int16 => "int16",
        DataType::Int32 => "int32",
        DataType::Int64 => "int64",
        DataType::UInt8 => "uint8",
        DataType::UInt16 => "uint16",
        DataType::UInt32 => "uint32",
        DataType::UInt64 => "uint64",
        DataType::Float32 => "float32",
        DataType::Float64 => "float64",
        _ => "other",
    }
}

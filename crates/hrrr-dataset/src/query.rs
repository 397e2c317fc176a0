//! Lazy query construction and materialization.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::ReadableStorageTraits;

use hrrr_common::time::TimeRange;

use crate::dataset::{read_as_f64, Inner, Variable};
use crate::error::{DatasetError, Result};
use crate::exec::ExecConfig;
use crate::frame::MaterializedTable;
use crate::interp::{bilinear_sample, nearest_sample, InterpMethod};

/// Default dimension names for HRRR-style surface datasets.
const DEFAULT_TIME_DIM: &str = "valid_time";
const DEFAULT_Y_DIM: &str = "y";
const DEFAULT_X_DIM: &str = "x";

/// A lazy query over a dataset.
///
/// Built by chaining non-destructive operations; every method returns a new
/// query and leaves its receiver untouched. Nothing is read from the store
/// until [`materialize`](Query::materialize).
pub struct Query<S: ReadableStorageTraits + Send + Sync + 'static> {
    inner: Arc<Inner<S>>,
    vars: Vec<String>,
    time_dim: String,
    time_range: Option<TimeRange>,
    y_dim: String,
    x_dim: String,
    x_targets: Option<Vec<f64>>,
    y_targets: Option<Vec<f64>>,
    method: InterpMethod,
}

impl<S: ReadableStorageTraits + Send + Sync + 'static> Clone for Query<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            vars: self.vars.clone(),
            time_dim: self.time_dim.clone(),
            time_range: self.time_range,
            y_dim: self.y_dim.clone(),
            x_dim: self.x_dim.clone(),
            x_targets: self.x_targets.clone(),
            y_targets: self.y_targets.clone(),
            method: self.method,
        }
    }
}

impl<S: ReadableStorageTraits + Send + Sync + 'static> Query<S> {
    pub(crate) fn all(inner: Arc<Inner<S>>) -> Self {
        let vars = inner.variables.keys().cloned().collect();
        Self {
            inner,
            vars,
            time_dim: DEFAULT_TIME_DIM.to_string(),
            time_range: None,
            y_dim: DEFAULT_Y_DIM.to_string(),
            x_dim: DEFAULT_X_DIM.to_string(),
            x_targets: None,
            y_targets: None,
            method: InterpMethod::default(),
        }
    }

    /// Narrow the selection to the named variables.
    ///
    /// Unknown names surface as [`DatasetError::MissingVariable`] at
    /// materialization, not here.
    pub fn select<T: AsRef<str>>(&self, vars: &[T]) -> Self {
        let mut query = self.clone();
        query.vars = vars.iter().map(|v| v.as_ref().to_string()).collect();
        query
    }

    /// Restrict the time axis to an inclusive range.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let mut query = self.clone();
        query.time_range = Some(TimeRange::new(start, end));
        query
    }

    /// Use a different time dimension name.
    pub fn time_dim(&self, name: impl Into<String>) -> Self {
        let mut query = self.clone();
        query.time_dim = name.into();
        query
    }

    /// Use different spatial dimension names.
    pub fn spatial_dims(&self, y: impl Into<String>, x: impl Into<String>) -> Self {
        let mut query = self.clone();
        query.y_dim = y.into();
        query.x_dim = x.into();
        query
    }

    /// Interpolate at the given coordinate values on the x and y axes.
    ///
    /// The materialized table holds the cartesian product of the targets:
    /// `len(x) * len(y)` points per time step.
    pub fn interp_at(&self, xs: &[f64], ys: &[f64]) -> Self {
        let mut query = self.clone();
        query.x_targets = Some(xs.to_vec());
        query.y_targets = Some(ys.to_vec());
        query
    }

    /// Set the interpolation method.
    pub fn method(&self, method: InterpMethod) -> Self {
        let mut query = self.clone();
        query.method = method;
        query
    }

    /// Evaluate the query under the given execution configuration.
    ///
    /// Reads the minimal index window covering the interpolation targets,
    /// one time step at a time, scheduling time steps on the configured
    /// backend. Row order is time-major, then y, then x.
    pub fn materialize(&self, exec: &ExecConfig) -> Result<MaterializedTable> {
        let variables: Vec<&Variable<S>> = self
            .vars
            .iter()
            .map(|name| {
                self.inner
                    .variables
                    .get(name)
                    .ok_or_else(|| DatasetError::MissingVariable(name.clone()))
            })
            .collect::<Result<_>>()?;

        let time_axis = self
            .inner
            .coords
            .get(&self.time_dim)
            .ok_or_else(|| DatasetError::MissingCoordinate(self.time_dim.clone()))?;
        let y_axis = self
            .inner
            .coords
            .get(&self.y_dim)
            .ok_or_else(|| DatasetError::MissingCoordinate(self.y_dim.clone()))?;
        let x_axis = self
            .inner
            .coords
            .get(&self.x_dim)
            .ok_or_else(|| DatasetError::MissingCoordinate(self.x_dim.clone()))?;

        let time_indices: Vec<usize> = match &self.time_range {
            Some(range) => time_axis.indices_in_time_range(range)?,
            None => (0..time_axis.len()).collect(),
        };
        if time_indices.is_empty() {
            return Err(DatasetError::EmptySelection(format!(
                "no {} values in range",
                self.time_dim
            )));
        }

        let datetimes = time_axis.to_datetimes()?;

        // Interpolation targets default to the full axes, which degenerates
        // to reading every grid point.
        let xs = self
            .x_targets
            .clone()
            .unwrap_or_else(|| x_axis.values().to_vec());
        let ys = self
            .y_targets
            .clone()
            .unwrap_or_else(|| y_axis.values().to_vec());
        if xs.is_empty() || ys.is_empty() {
            return Err(DatasetError::EmptySelection(
                "no interpolation targets".to_string(),
            ));
        }

        // Fractional grid indices; None marks an out-of-range target, which
        // materializes as NaN.
        let fx: Vec<Option<f64>> = xs.iter().map(|&v| x_axis.fractional_index(v)).collect();
        let fy: Vec<Option<f64>> = ys.iter().map(|&v| y_axis.fractional_index(v)).collect();

        let x_window = index_window(&fx, x_axis.len());
        let y_window = index_window(&fy, y_axis.len());

        tracing::debug!(
            times = time_indices.len(),
            points = xs.len() * ys.len(),
            backend = %exec.backend,
            workers = exec.workers,
            "Materializing query"
        );

        let points_per_step = ys.len() * xs.len();
        let rows = time_indices.len() * points_per_step;

        let mut columns = Vec::with_capacity(variables.len());
        for var in &variables {
            check_dims(var, &self.time_dim, &self.y_dim, &self.x_dim)?;

            let per_step = exec.map(&time_indices, |&t| {
                self.sample_time_step(var, t, x_window, y_window, &fx, &fy)
            })?;

            let mut column = Vec::with_capacity(rows);
            for block in per_step {
                column.extend(block?);
            }
            columns.push((var.name.clone(), column));
        }

        // Index columns: the cartesian product in row order.
        let mut valid_time = Vec::with_capacity(rows);
        let mut y_col = Vec::with_capacity(rows);
        let mut x_col = Vec::with_capacity(rows);
        for &t in &time_indices {
            for &y in &ys {
                for &x in &xs {
                    valid_time.push(datetimes[t]);
                    y_col.push(y);
                    x_col.push(x);
                }
            }
        }

        Ok(MaterializedTable {
            valid_time,
            y: y_col,
            x: x_col,
            columns,
        })
    }

    /// Sample one variable at one time step.
    fn sample_time_step(
        &self,
        var: &Variable<S>,
        t: usize,
        x_window: Option<(usize, usize)>,
        y_window: Option<(usize, usize)>,
        fx: &[Option<f64>],
        fy: &[Option<f64>],
    ) -> Result<Vec<f64>> {
        // Every target out of range on either axis: nothing to read.
        let (Some((x_lo, x_hi)), Some((y_lo, y_hi))) = (x_window, y_window) else {
            return Ok(vec![f64::NAN; fy.len() * fx.len()]);
        };

        let width = x_hi - x_lo;
        let height = y_hi - y_lo;

        let subset = ArraySubset::new_with_start_shape(
            vec![t as u64, y_lo as u64, x_lo as u64],
            vec![1, height as u64, width as u64],
        )
        .map_err(|e| DatasetError::read_failed(e.to_string()))?;

        let data = read_as_f64(&var.array, &var.name, &subset)?;

        let mut out = Vec::with_capacity(fy.len() * fx.len());
        for gy in fy {
            for gx in fx {
                let value = match (gy, gx) {
                    (Some(gy), Some(gx)) => {
                        let local_x = gx - x_lo as f64;
                        let local_y = gy - y_lo as f64;
                        match self.method {
                            InterpMethod::Linear => {
                                bilinear_sample(&data, width, height, local_x, local_y)
                            }
                            InterpMethod::Nearest => {
                                nearest_sample(&data, width, height, local_x, local_y)
                            }
                        }
                    }
                    _ => f64::NAN,
                };
                out.push(value);
            }
        }
        Ok(out)
    }
}

/// The smallest index window covering every in-range fractional index.
///
/// `None` when no target falls on the axis at all.
fn index_window(fracs: &[Option<f64>], len: usize) -> Option<(usize, usize)> {
    let mut lo = usize::MAX;
    let mut hi = 0usize;

    for frac in fracs.iter().flatten() {
        lo = lo.min(frac.floor() as usize);
        hi = hi.max(frac.ceil() as usize + 1);
    }

    if lo == usize::MAX {
        return None;
    }
    Some((lo, hi.min(len)))
}

/// Variables must be laid out as (time, y, x) for point sampling.
fn check_dims<S: ReadableStorageTraits + Send + Sync + 'static>(
    var: &Variable<S>,
    time_dim: &str,
    y_dim: &str,
    x_dim: &str,
) -> Result<()> {
    let expected = [time_dim, y_dim, x_dim];
    if var.dims.len() != 3
        || var
            .dims
            .iter()
            .zip(expected)
            .any(|(have, want)| have.as_str() != want)
    {
        return Err(DatasetError::dimension_mismatch(
            &var.name,
            format!(
                "expected dimensions [{}], found [{}]",
                expected.join(", "),
                var.dims.join(", ")
            ),
        ));
    }
    Ok(())
}

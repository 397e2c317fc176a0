//! Coordinate axes.
//!
//! Coordinate variables are one-dimensional and small, so they are loaded
//! eagerly when the dataset is opened. Interpolation and slicing both assume
//! strict monotonicity, which is checked at construction.

use chrono::{DateTime, Utc};

use hrrr_common::time::{CfTimeUnits, TimeRange};

use crate::error::{DatasetError, Result};

/// A one-dimensional coordinate axis.
#[derive(Debug, Clone)]
pub struct CoordAxis {
    name: String,
    values: Vec<f64>,
    ascending: bool,
    time_units: Option<CfTimeUnits>,
}

impl CoordAxis {
    /// Create an axis from raw coordinate values.
    ///
    /// `time_units` carries CF epoch units for axes that encode instants.
    /// Returns an error if the values are empty or not strictly monotonic.
    pub fn new(
        name: impl Into<String>,
        values: Vec<f64>,
        time_units: Option<CfTimeUnits>,
    ) -> Result<Self> {
        let name = name.into();

        let ascending = match monotonic_direction(&values) {
            Some(ascending) => ascending,
            None => return Err(DatasetError::NonMonotonic(name)),
        };

        Ok(Self {
            name,
            values,
            ascending,
            time_units,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Whether the axis encodes instants.
    pub fn is_time(&self) -> bool {
        self.time_units.is_some()
    }

    /// Decode every value on a time axis to UTC instants.
    pub fn to_datetimes(&self) -> Result<Vec<DateTime<Utc>>> {
        let units = self.time_units.ok_or_else(|| {
            DatasetError::dimension_mismatch(&self.name, "axis does not carry time units")
        })?;
        Ok(self.values.iter().map(|&v| units.decode(v)).collect())
    }

    /// Indices of values that fall within an inclusive time range, in axis
    /// order.
    pub fn indices_in_time_range(&self, range: &TimeRange) -> Result<Vec<usize>> {
        let datetimes = self.to_datetimes()?;
        Ok(datetimes
            .iter()
            .enumerate()
            .filter(|(_, dt)| range.contains(dt))
            .map(|(i, _)| i)
            .collect())
    }

    /// Map a coordinate value to a fractional index on this axis.
    ///
    /// Returns [`None`] if the value lies outside the axis range; callers
    /// treat that as a NaN result rather than an error, matching the
    /// default extrapolation behaviour of the array engine this mirrors.
    pub fn fractional_index(&self, target: f64) -> Option<f64> {
        let v = &self.values;
        let n = v.len();

        if n == 1 {
            return (target == v[0]).then_some(0.0);
        }

        for i in 0..n - 1 {
            let (a, b) = (v[i], v[i + 1]);
            let inside = if self.ascending {
                a <= target && target <= b
            } else {
                b <= target && target <= a
            };
            if inside {
                // a == b is impossible on a strictly monotonic axis
                return Some(i as f64 + (target - a) / (b - a));
            }
        }

        None
    }
}

/// Strictly-monotonic direction of a value sequence.
///
/// `Some(true)` for ascending, `Some(false)` for descending, `None` for
/// anything else (including NaNs and empty sequences).
fn monotonic_direction(values: &[f64]) -> Option<bool> {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return None;
    }
    if values.len() == 1 {
        return Some(true);
    }
    if values.windows(2).all(|w| w[0] < w[1]) {
        return Some(true);
    }
    if values.windows(2).all(|w| w[0] > w[1]) {
        return Some(false);
    }
    None
}

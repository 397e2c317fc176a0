//! Tabular materialization and summary statistics.

use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::*;

use crate::error::Result;

/// A fully-evaluated query result in columnar form.
///
/// Rows are the cartesian product of the selected time steps and the
/// interpolation targets, time-major, then y, then x.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedTable {
    /// Valid time per row.
    pub valid_time: Vec<DateTime<Utc>>,
    /// Target y coordinate per row.
    pub y: Vec<f64>,
    /// Target x coordinate per row.
    pub x: Vec<f64>,
    /// One value column per selected variable, in selection order.
    pub columns: Vec<(String, Vec<f64>)>,
}

impl MaterializedTable {
    pub fn num_rows(&self) -> usize {
        self.valid_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valid_time.is_empty()
    }

    /// Convert to a polars DataFrame with columns
    /// `valid_time`, `y`, `x`, then one column per variable.
    pub fn to_polars(&self) -> Result<DataFrame> {
        let naive: Vec<NaiveDateTime> = self.valid_time.iter().map(|dt| dt.naive_utc()).collect();

        let mut df = df!(
            "valid_time" => naive,
            "y" => self.y.clone(),
            "x" => self.x.clone(),
        )?;

        for (name, values) in &self.columns {
            df.with_column(Series::new(name.as_str().into(), values.as_slice()))?;
        }

        Ok(df)
    }

    /// Summary statistics per variable column, as a DataFrame with one row
    /// per variable: NaN-excluded count, mean, sample std, min, max.
    pub fn summarize(&self) -> Result<DataFrame> {
        let mut names = Vec::with_capacity(self.columns.len());
        let mut counts = Vec::with_capacity(self.columns.len());
        let mut means = Vec::with_capacity(self.columns.len());
        let mut stds = Vec::with_capacity(self.columns.len());
        let mut mins = Vec::with_capacity(self.columns.len());
        let mut maxs = Vec::with_capacity(self.columns.len());

        for (name, values) in &self.columns {
            let stats = ColumnStats::compute(values);
            names.push(name.clone());
            counts.push(stats.count as u32);
            means.push(stats.mean);
            stds.push(stats.std);
            mins.push(stats.min);
            maxs.push(stats.max);
        }

        let df = df!(
            "column" => names,
            "count" => counts,
            "mean" => means,
            "std" => stds,
            "min" => mins,
            "max" => maxs,
        )?;

        Ok(df)
    }
}

/// Summary statistics of one value column, NaN-excluded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; 0 for fewer than two values.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl ColumnStats {
    /// Compute statistics over the finite values of a column.
    ///
    /// An all-NaN column yields count 0 and NaN aggregates.
    pub fn compute(values: &[f64]) -> Self {
        let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let count = finite.len();

        if count == 0 {
            return Self {
                count: 0,
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }

        let mean = finite.iter().sum::<f64>() / count as f64;
        let std = if count < 2 {
            0.0
        } else {
            let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        };
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            count,
            mean,
            std,
            min,
            max,
        }
    }
}

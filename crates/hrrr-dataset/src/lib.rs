//! Lazily-evaluated chunked weather datasets.
//!
//! This crate turns a Zarr store — local, remote, or virtual — into a
//! labelled dataset handle with xarray-flavoured query operations:
//!
//! - **Open**: read metadata and coordinate axes, optionally excluding
//!   variables ([`Dataset::open`]).
//! - **Query**: chain non-destructive, lazy operations — variable selection,
//!   an inclusive time slice, interpolation targets
//!   ([`Dataset::query`], [`Query`]).
//! - **Materialize**: evaluate under a scoped execution backend and get a
//!   columnar table convertible to a polars DataFrame
//!   ([`Query::materialize`], [`MaterializedTable`]).
//!
//! # Example
//!
//! ```ignore
//! use hrrr_dataset::{Dataset, ExecConfig, OpenOptions};
//!
//! let options = OpenOptions::new().drop_variables(["heightAboveGround"]);
//! let ds = Dataset::open(storage, &names, options)?;
//!
//! let table = ds
//!     .query()
//!     .select(&["2t", "dswrf", "2r"])
//!     .between(start, end)
//!     .interp_at(&[600.0, 800.0], &[700.0, 400.0])
//!     .materialize(&ExecConfig::default())?;
//!
//! let df = table.to_polars()?;
//! ```

pub mod coords;
pub mod dataset;
pub mod error;
pub mod exec;
pub mod frame;
pub mod interp;
pub mod query;

pub use coords::CoordAxis;
pub use dataset::{Dataset, OpenOptions};
pub use error::{DatasetError, Result};
pub use exec::{default_workers, ExecBackend, ExecConfig};
pub use frame::{ColumnStats, MaterializedTable};
pub use interp::InterpMethod;
pub use query::Query;

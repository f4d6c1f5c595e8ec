//! # gridband
//!
//! Row-partitioned analytics over a square binary image, built on an
//! in-process, MPI-style collective runtime.
//!
//! The image is scattered one row per worker. Every worker scans its row, and
//! a sequence of rank-ordered collectives combines the per-row results at the
//! coordinator (rank 0):
//! - total number of non-zero cells (sum-reduce)
//! - horizontal and vertical side of the minimal bounding rectangle
//!   (min/max-reduce, rank gather)
//! - rectangular bands obtained by stitching per-row spans vertically
//!   (record gather + sequential merge)
//!
//! ## Quick Start
//!
//! ```
//! use gridband::{analyze, AnalysisOptions, Grid};
//!
//! fn main() -> Result<(), gridband::Error> {
//!     let report = analyze(Grid::sample(), &AnalysisOptions::default())?;
//!     assert_eq!(report.total, 53);
//!     print!("{report}");
//!     Ok(())
//! }
//! ```
//!
//! ## Runtime
//!
//! A [`World`] launches one worker thread per rank and hands each a
//! [`Communicator`] with blocking collectives: barrier, broadcast, scatter,
//! gather, allgather, reduce and allreduce, generic over [`Datatype`].
//! Results are always ordered by rank, never by arrival.

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow certain pedantic lints for existing code
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::similar_names)]

mod aggregate;
mod band;
mod comm;
mod config;
mod datatype;
mod error;
mod exchange;
mod grid;
mod pipeline;
mod report;
mod scan;
mod world;

pub use aggregate::{horizontal_length, total_count, vertical_length, NonEmptyRows};
pub use band::{gather_spans, merge_bands, Band, Corner};
pub use comm::Communicator;
pub use config::{AnalysisOptions, GroupConfig, MergeMode, FLUSH_ENV, WORKERS_ENV};
pub use datatype::{Datatype, DatatypeTag, Field, Record, Reducible, StructType};
pub use error::{Error, Result};
pub use grid::Grid;
pub use pipeline::{analyze, distribute, run_rank, COORDINATOR};
pub use report::Report;
pub use scan::{scan_row, Extrema, RowScan, SpanDescriptor};
pub use world::World;

/// Reduction operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Sum of values
    Sum,
    /// Maximum value
    Max,
    /// Minimum value
    Min,
    /// Product of values
    Prod,
}

//! The per-worker analysis pipeline.
//!
//! Every rank runs [`run_rank`]: it receives its row, scans it, then takes
//! part in the reductions and the span gather. Only the coordinator
//! assembles a [`Report`].

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::aggregate::{horizontal_length, total_count, vertical_length};
use crate::band::{gather_spans, merge_bands};
use crate::comm::Communicator;
use crate::config::{AnalysisOptions, GroupConfig, MergeMode};
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::report::Report;
use crate::scan::scan_row;
use crate::world::World;

/// Rank that owns the grid and receives every result.
pub const COORDINATOR: usize = 0;

/// Scatter the coordinator's grid, one row per rank.
///
/// The coordinator must pass `Some(grid)` with `rows` rows; other ranks pass
/// `None`. The grid is consumed and dropped once the rows are delivered.
pub fn distribute(comm: &Communicator, grid: Option<Grid>, rows: usize) -> Result<Vec<i32>> {
    let send = if comm.rank() == COORDINATOR {
        let grid = grid.ok_or_else(|| Error::InvalidGrid("coordinator holds no grid".into()))?;
        if grid.size() != rows {
            return Err(Error::InvalidGrid(format!(
                "grid has {} rows, group expects {rows}",
                grid.size()
            )));
        }
        grid.into_cells()
    } else {
        Vec::new()
    };

    let mut row = vec![0; rows];
    comm.scatter(&send, &mut row, COORDINATOR)?;
    Ok(row)
}

/// Run the whole pipeline on one rank.
///
/// Returns `Some(report)` on the coordinator and `None` elsewhere. A group
/// whose size differs from `rows` is aborted on every rank.
pub fn run_rank(
    comm: &Communicator,
    grid: Option<Grid>,
    rows: usize,
    merge: MergeMode,
) -> Result<Option<Report>> {
    let rank = comm.rank();
    let group = GroupConfig {
        rows,
        workers: comm.size(),
    };
    if let Err(err) = group.validate() {
        comm.abort(err.exit_code());
        return Err(err);
    }

    let row = distribute(comm, grid, rows)?;
    let scan = scan_row(&row, rank);
    debug!(rank, count = scan.count, extrema = ?scan.extrema, span = ?scan.span, "row scanned");

    let total = total_count(comm, scan.count)?;
    let width = horizontal_length(comm, scan.extrema)?;
    let height = vertical_length(comm, scan.extrema, rows as i32)?;
    let spans = gather_spans(comm, scan.span)?;

    let report = match (total, width, height, spans) {
        (Some(total), Some(width), Some(height), Some(spans)) => Some(Report {
            total,
            width,
            height,
            bands: merge_bands(&spans, merge),
        }),
        _ => None,
    };

    comm.barrier()?;
    Ok(report)
}

/// Analyze `grid` with one worker per row and return the coordinator's report.
///
/// # Errors
///
/// Returns [`Error::GroupSizeMismatch`] when `opts.workers` differs from the
/// grid's row count. The group is checked before any worker starts.
pub fn analyze(grid: Grid, opts: &AnalysisOptions) -> Result<Report> {
    let group = opts.group(grid.size());
    info!(rows = group.rows, workers = group.workers, merge = ?opts.merge, "starting analysis");
    group.validate()?;

    let world = World::new(group.workers)?;
    let grid = Mutex::new(Some(grid));
    let reports = world.run(|comm| {
        let owned = if comm.rank() == COORDINATOR {
            grid.lock().take()
        } else {
            None
        };
        run_rank(&comm, owned, group.rows, opts.merge)
    })?;

    reports
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| Error::Internal("coordinator produced no report".into()))
}

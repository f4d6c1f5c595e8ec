//! Reductions combining per-row scan results at the coordinator.
//!
//! Each function is a collective: every rank must call it, and only the
//! coordinator receives `Some` result. Empty inputs are not special-cased;
//! the sentinels flow through the arithmetic unchanged.

use tracing::debug;

use crate::comm::Communicator;
use crate::error::Result;
use crate::pipeline::COORDINATOR;
use crate::scan::Extrema;
use crate::ReduceOp;

/// Sum of every rank's non-zero count.
pub fn total_count(comm: &Communicator, count: i32) -> Result<Option<i32>> {
    let total = comm.reduce_scalar(count, ReduceOp::Sum, COORDINATOR)?;
    debug!(rank = comm.rank(), count, "count reduced");
    Ok(total)
}

/// Horizontal side of the bounding rectangle, `max(right) - min(left) + 1`.
///
/// With no non-zero cell anywhere this is `-1 - N + 1`.
pub fn horizontal_length(comm: &Communicator, extrema: Extrema) -> Result<Option<i32>> {
    let left = comm.reduce_scalar(extrema.left, ReduceOp::Min, COORDINATOR)?;
    let right = comm.reduce_scalar(extrema.right, ReduceOp::Max, COORDINATOR)?;
    Ok(left.zip(right).map(|(left, right)| right - left + 1))
}

/// Vertical side of the bounding rectangle, from the spread of the ranks
/// whose row is occupied.
///
/// `n` is the row width; it doubles as the "no occupied row" sentinel.
pub fn vertical_length(comm: &Communicator, extrema: Extrema, n: i32) -> Result<Option<i32>> {
    let flag = if extrema.is_occupied(n) {
        comm.rank() as i32
    } else {
        -1
    };
    let gathered = comm.gather_scalar(flag, COORDINATOR)?;
    Ok(gathered.map(|flags| NonEmptyRows::from_gathered(flags, n).length()))
}

/// Ranks of occupied rows, as gathered at the coordinator.
///
/// Each entry is a rank, or `-1` for an empty row. Entries are sorted on
/// construction, so the input order does not matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyRows {
    flags: Vec<i32>,
    first: i32,
    last: i32,
}

impl NonEmptyRows {
    /// Sort `flags` and find the lowest and highest occupied rank.
    ///
    /// Without occupied rows `first` stays at `n` and `last` at `-1`.
    pub fn from_gathered(mut flags: Vec<i32>, n: i32) -> Self {
        flags.sort_unstable();
        let mut first = n;
        let mut last = -1;
        for &rank in flags.iter().filter(|&&r| r >= 0) {
            first = first.min(rank);
            last = last.max(rank);
        }
        NonEmptyRows { flags, first, last }
    }

    /// Lowest occupied rank, or `n`.
    pub fn first(&self) -> i32 {
        self.first
    }

    /// Highest occupied rank, or `-1`.
    pub fn last(&self) -> i32 {
        self.last
    }

    /// `last - first + 1`.
    pub fn length(&self) -> i32 {
        self.last - self.first + 1
    }

    /// The sorted flags.
    pub fn flags(&self) -> &[i32] {
        &self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::World;

    #[test]
    fn rows_order_independent() {
        let a = NonEmptyRows::from_gathered(vec![-1, 3, -1, 7, 5], 9);
        let b = NonEmptyRows::from_gathered(vec![7, -1, 5, 3, -1], 9);
        assert_eq!(a, b);
        assert_eq!((a.first(), a.last(), a.length()), (3, 7, 5));
        assert_eq!(a.flags(), &[-1, -1, 3, 5, 7]);
    }

    #[test]
    fn no_occupied_rows_is_degenerate() {
        let rows = NonEmptyRows::from_gathered(vec![-1; 31], 31);
        assert_eq!(rows.first(), 31);
        assert_eq!(rows.last(), -1);
        assert_eq!(rows.length(), -31);
    }

    #[test]
    fn reductions_across_group() {
        let world = World::new(4).unwrap();
        let out = world
            .run(|comm| {
                let n = 4;
                let extrema = match comm.rank() {
                    1 => Extrema { left: 2, right: 3 },
                    2 => Extrema { left: 1, right: 1 },
                    _ => Extrema::empty(n),
                };
                let total = total_count(&comm, comm.rank() as i32)?;
                let width = horizontal_length(&comm, extrema)?;
                let height = vertical_length(&comm, extrema, n)?;
                Ok((total, width, height))
            })
            .unwrap();
        assert_eq!(out[0], (Some(6), Some(3), Some(2)));
        assert_eq!(out[3], (None, None, None));
    }

    #[test]
    fn empty_group_lengths_are_negative() {
        let world = World::new(5).unwrap();
        let out = world
            .run(|comm| {
                let extrema = Extrema::empty(5);
                Ok((
                    horizontal_length(&comm, extrema)?,
                    vertical_length(&comm, extrema, 5)?,
                ))
            })
            .unwrap();
        assert_eq!(out[0], (Some(-5), Some(-5)));
    }
}

//! Local row scanner.
//!
//! Pure per-worker step: no communication happens here. Column 0 of every
//! row is outside the scanned range.

use serde::Serialize;

use crate::datatype::{Datatype, DatatypeTag, Field, Record};

/// Leftmost and rightmost non-zero column of a row.
///
/// An empty row holds the sentinels `left = N` and `right = -1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Extrema {
    /// First non-zero column, or `N`
    pub left: i32,
    /// Last non-zero column, or `-1`
    pub right: i32,
}

impl Extrema {
    /// Sentinel extrema for a row of width `n`.
    pub fn empty(n: i32) -> Self {
        Extrema { left: n, right: -1 }
    }

    /// Whether the row of width `n` held any non-zero scanned cell.
    pub fn is_occupied(&self, n: i32) -> bool {
        self.left != n && self.right != -1
    }
}

/// Boundary of the horizontally adjacent non-zero run of one row.
///
/// `start` is the first column of the first adjacent non-zero pair and
/// `finish` the column just past the last such pair, so a row with two
/// separate runs yields one span covering both. `start = finish = -1` when
/// the row has no adjacent pair.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpanDescriptor {
    /// First column of the span, or `-1`
    pub start: i32,
    /// Column after the span, or `-1`
    pub finish: i32,
    /// Rank of the worker owning the row
    pub rank: i32,
}

impl SpanDescriptor {
    /// Descriptor with no span for `rank`.
    pub fn unset(rank: i32) -> Self {
        SpanDescriptor {
            start: -1,
            finish: -1,
            rank,
        }
    }

    /// Whether an adjacent non-zero pair was found.
    pub fn is_set(&self) -> bool {
        self.start >= 0
    }
}

impl Datatype for SpanDescriptor {
    const TAG: DatatypeTag = DatatypeTag::Record("SpanDescriptor");
}

impl Record for SpanDescriptor {
    const NAME: &'static str = "SpanDescriptor";

    fn fields() -> Vec<Field> {
        vec![
            Field::of::<i32>("start", std::mem::offset_of!(SpanDescriptor, start)),
            Field::of::<i32>("finish", std::mem::offset_of!(SpanDescriptor, finish)),
            Field::of::<i32>("rank", std::mem::offset_of!(SpanDescriptor, rank)),
        ]
    }
}

/// Result of scanning one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowScan {
    /// Non-zero cells in columns `1..N`
    pub count: i32,
    /// Column extrema
    pub extrema: Extrema,
    /// Adjacent-run span
    pub span: SpanDescriptor,
}

/// Scan `row` owned by `rank` in a single forward pass.
pub fn scan_row(row: &[i32], rank: usize) -> RowScan {
    let n = row.len() as i32;
    let mut count = 0;
    let mut extrema = Extrema::empty(n);
    let mut span = SpanDescriptor::unset(rank as i32);

    for (j, &cell) in row.iter().enumerate().skip(1) {
        if cell == 0 {
            continue;
        }
        let col = j as i32;
        count += 1;
        extrema.left = extrema.left.min(col);
        extrema.right = extrema.right.max(col);
        if row.get(j + 1).is_some_and(|&next| next != 0) {
            if span.start < 0 {
                span.start = col;
            }
            span.finish = col + 1;
        }
    }

    RowScan {
        count,
        extrema,
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn column_zero_is_never_scanned() {
        let scan = scan_row(&[1, 0, 0, 0, 0], 2);
        assert_eq!(scan.count, 0);
        assert_eq!(scan.extrema, Extrema::empty(5));
        assert!(!scan.extrema.is_occupied(5));
        assert_eq!(scan.span, SpanDescriptor::unset(2));
    }

    #[test]
    fn pair_starting_at_column_zero_is_missed() {
        let scan = scan_row(&[1, 1, 0, 0], 0);
        assert_eq!(scan.count, 1);
        assert_eq!(scan.extrema, Extrema { left: 1, right: 1 });
        assert!(!scan.span.is_set());
    }

    #[test]
    fn isolated_cell_has_no_span() {
        let scan = scan_row(&[0, 0, 1, 0, 0], 1);
        assert_eq!(scan.count, 1);
        assert_eq!(scan.extrema, Extrema { left: 2, right: 2 });
        assert!(scan.extrema.is_occupied(5));
        assert_eq!(scan.span.start, -1);
        assert_eq!(scan.span.finish, -1);
        assert_eq!(scan.span.rank, 1);
    }

    #[test]
    fn run_touching_last_column() {
        let scan = scan_row(&[0, 0, 0, 1, 1], 4);
        assert_eq!(scan.count, 2);
        assert_eq!(scan.extrema, Extrema { left: 3, right: 4 });
        assert_eq!(
            scan.span,
            SpanDescriptor {
                start: 3,
                finish: 4,
                rank: 4
            }
        );
    }

    #[test]
    fn separate_runs_merge_into_one_span() {
        // Same shape as row 19 of the sample image.
        let mut row = vec![0; 31];
        for c in [14, 15, 16, 18, 19, 20] {
            row[c] = 1;
        }
        let scan = scan_row(&row, 19);
        assert_eq!(scan.count, 6);
        assert_eq!(scan.extrema, Extrema { left: 14, right: 20 });
        assert_eq!((scan.span.start, scan.span.finish), (14, 20));
    }

    #[test]
    fn non_binary_values_count_as_set() {
        let scan = scan_row(&[0, 5, -3, 0], 0);
        assert_eq!(scan.count, 2);
        assert_eq!((scan.span.start, scan.span.finish), (1, 2));
    }

    #[test]
    fn span_layout_commits() {
        let layout = SpanDescriptor::struct_type().unwrap();
        assert_eq!(layout.size(), 12);
        let offsets: Vec<usize> = layout.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
    }

    proptest! {
        #[test]
        fn count_matches_nonzero_cells_after_column_zero(row in prop::collection::vec(0i32..3, 1..40)) {
            let scan = scan_row(&row, 0);
            let expected = row.iter().skip(1).filter(|&&v| v != 0).count() as i32;
            prop_assert_eq!(scan.count, expected);
            if scan.count > 0 {
                prop_assert!(scan.extrema.left <= scan.extrema.right);
                prop_assert!(scan.extrema.left >= 1);
            } else {
                prop_assert_eq!(scan.extrema, Extrema::empty(row.len() as i32));
            }
            if scan.span.is_set() {
                prop_assert!(scan.span.start < scan.span.finish);
                prop_assert!(scan.span.start >= scan.extrema.left);
                prop_assert!(scan.span.finish <= scan.extrema.right);
            }
        }
    }
}

//! Band merge: stitch per-row spans into vertical rectangles.

use serde::Serialize;
use tracing::debug;

use crate::comm::Communicator;
use crate::config::MergeMode;
use crate::error::Result;
use crate::pipeline::COORDINATOR;
use crate::scan::SpanDescriptor;

/// A cell coordinate, `(row, column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Corner {
    /// Row index
    pub row: i32,
    /// Column index
    pub col: i32,
}

/// A rectangle reported by the band merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Band {
    /// Top-left corner
    pub top_left: Corner,
    /// Bottom-right corner; the column is the span's `finish`
    pub bottom_right: Corner,
}

impl Band {
    /// Band of `height` rows ending at `bottom`, spanning `left..right`.
    pub fn ending_at(bottom: i32, height: i32, left: i32, right: i32) -> Self {
        Band {
            top_left: Corner {
                row: bottom - height + 1,
                col: left,
            },
            bottom_right: Corner {
                row: bottom,
                col: right,
            },
        }
    }
}

/// Gather every rank's span descriptor at the coordinator.
pub fn gather_spans(
    comm: &Communicator,
    span: SpanDescriptor,
) -> Result<Option<Vec<SpanDescriptor>>> {
    comm.gather_records(span, COORDINATOR)
}

/// Merge rank-keyed spans into bands, in discovery order.
///
/// The spans are sorted by `rank` first. The running band is seeded from
/// rank 1 and compared against each following row up to the last one; when
/// the next row's span does not overlap the band, the band closes and is
/// reported if it is taller than one row. An overlapping row extends the
/// band to the overlap of the current and next row's spans.
///
/// In [`MergeMode::Faithful`] the band still open after the last row is
/// dropped; [`MergeMode::FlushOnExit`] reports it.
pub fn merge_bands(spans: &[SpanDescriptor], mode: MergeMode) -> Vec<Band> {
    let mut sides = spans.to_vec();
    sides.sort_by_key(|s| s.rank);

    let mut bands = Vec::new();
    let Some(seed) = sides.get(1) else {
        return bands;
    };
    let (mut left, mut right, mut height) = (seed.start, seed.finish, 1);

    for (i, pair) in sides.windows(2).enumerate().skip(1) {
        let (current, next) = (&pair[0], &pair[1]);
        if left >= next.finish || right <= next.start {
            if height > 1 {
                let band = Band::ending_at(i as i32, height, left, right);
                debug!(?band, "band closed");
                bands.push(band);
            }
            left = next.start;
            right = next.finish;
            height = 1;
        } else {
            left = current.start.max(next.start);
            right = current.finish.min(next.finish);
            height += 1;
        }
    }

    if mode == MergeMode::FlushOnExit && height > 1 {
        let last = sides.len() as i32 - 1;
        bands.push(Band::ending_at(last, height, left, right));
    }
    bands
}

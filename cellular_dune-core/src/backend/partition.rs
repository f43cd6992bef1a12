use core::num::NonZeroUsize;
use core::ops::Range;

use cellular_dune_concepts::{CellState, Grid, PartitionError, TransitionRule, BORDER_SENTINEL};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Contiguous block of stored rows assigned to one worker or peer.
///
/// Rows are counted in the stored buffer of the [Grid] such that row `0` is the top border row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowBand {
    /// Index of the worker or peer owning this band
    pub owner: usize,
    /// Stored rows of the band
    pub rows: Range<usize>,
}

impl RowBand {
    /// Number of stored rows in this band
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the band holds no rows at all.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The rows of this band which are subject to the transition rule.
    ///
    /// Border rows which belong to the band are excluded.
    pub fn interior(&self, interior_rows: usize) -> Range<usize> {
        let start = self.rows.start.max(1);
        let end = self.rows.end.min(interior_rows + 1).max(start);
        start..end
    }
}

/// Splits the interior rows `1..=rows` into `n_workers` equal bands.
///
/// ```
/// # use cellular_dune_core::backend::partition_interior_rows;
/// let bands = partition_interior_rows(6, 3.try_into().unwrap()).unwrap();
/// assert_eq!(bands[0].rows, 1..3);
/// assert_eq!(bands[2].rows, 5..7);
/// assert!(partition_interior_rows(7, 3.try_into().unwrap()).is_err());
/// ```
#[cfg_attr(feature = "tracing", instrument)]
pub fn partition_interior_rows(
    rows: usize,
    n_workers: NonZeroUsize,
) -> Result<Vec<RowBand>, PartitionError> {
    let n = n_workers.get();
    if rows % n != 0 {
        return Err(PartitionError(format!(
            "number of rows ({rows}) must be evenly divisible by the number of threads ({n})"
        )));
    }
    let height = rows / n;
    Ok((0..n)
        .map(|owner| RowBand {
            owner,
            rows: 1 + owner * height..1 + (owner + 1) * height,
        })
        .collect())
}

/// Splits all stored rows `0..rows+2` (including both border rows) into `n_peers` equal bands.
///
/// The first band starts with the top border row and the last band ends with the bottom border
/// row.
/// ```
/// # use cellular_dune_core::backend::partition_global_rows;
/// let bands = partition_global_rows(6, 4.try_into().unwrap()).unwrap();
/// assert_eq!(bands[0].rows, 0..2);
/// assert_eq!(bands[0].interior(6), 1..2);
/// assert_eq!(bands[3].interior(6), 6..7);
/// assert!(partition_global_rows(6, 3.try_into().unwrap()).is_err());
/// ```
#[cfg_attr(feature = "tracing", instrument)]
pub fn partition_global_rows(
    rows: usize,
    n_peers: NonZeroUsize,
) -> Result<Vec<RowBand>, PartitionError> {
    let n = n_peers.get();
    let height = rows + 2;
    if height % n != 0 {
        return Err(PartitionError(format!(
            "number of rows plus the two border rows ({height}) must be evenly divisible by \
            the number of processes ({n})"
        )));
    }
    let band = height / n;
    Ok((0..n)
        .map(|owner| RowBand {
            owner,
            rows: owner * band..(owner + 1) * band,
        })
        .collect())
}

/// Computes the next state of every interior cell of stored row `row` into `out_row`.
///
/// `out_row` has to be a full stored row of length [Grid::stride]; its two border cells are set
/// to [BORDER_SENTINEL].
/// Only `current` is read such that the result is independent of the order in which rows are
/// processed.
#[inline]
pub fn sweep_row<R: TransitionRule + ?Sized>(
    rule: &R,
    current: &Grid,
    row: usize,
    out_row: &mut [CellState],
) {
    let stride = current.stride();
    debug_assert_eq!(out_row.len(), stride);
    out_row[0] = BORDER_SENTINEL;
    out_row[stride - 1] = BORDER_SENTINEL;
    for col in 1..stride - 1 {
        out_row[col] = rule.next_state(current, row, col);
    }
}

/// Applies [sweep_row] to consecutive stored rows starting at `first_row`.
///
/// `out` is interpreted as a block of full stored rows.
pub fn sweep_rows<R: TransitionRule + ?Sized>(
    rule: &R,
    current: &Grid,
    first_row: usize,
    out: &mut [CellState],
) {
    let stride = current.stride();
    for (offset, out_row) in out.chunks_exact_mut(stride).enumerate() {
        sweep_row(rule, current, first_row + offset, out_row);
    }
}

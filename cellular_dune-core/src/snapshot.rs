//! Informational text dumps of the cell space.
//!
//! This is not a persistence format: snapshots are only meant to be read by humans while
//! debugging a run.
//! A snapshot consists of a `TIMESTEP # <n>` header, one line per row where every cell is
//! written as ` <value> ` and a terminating blank line.
//! ```
//! # use cellular_dune_concepts::Grid;
//! # use cellular_dune_core::snapshot::write_snapshot;
//! let grid = Grid::from_interior(2, 2, &[1, 0, 0, 1]).unwrap();
//! let mut out = Vec::new();
//! write_snapshot(&mut out, &grid, 3, false).unwrap();
//! assert_eq!(String::from_utf8(out).unwrap(), "TIMESTEP # 3\n 1  0 \n 0  1 \n\n");
//! ```

use std::io::Write;

use cellular_dune_concepts::Grid;

/// Writes one snapshot of `grid` labelled with `generation`.
///
/// When `include_border` is set, the ghost border ring is printed as well.
pub fn write_snapshot<W: Write>(
    out: &mut W,
    grid: &Grid,
    generation: u64,
    include_border: bool,
) -> std::io::Result<()> {
    let (rows, cols) = match include_border {
        true => (0..grid.height(), 0..grid.stride()),
        false => (1..grid.rows() + 1, 1..grid.cols() + 1),
    };
    writeln!(out, "TIMESTEP # {generation}")?;
    for row in rows {
        for value in &grid.row(row)[cols.clone()] {
            write!(out, " {value} ")?;
        }
        writeln!(out)?;
    }
    writeln!(out)?;
    Ok(())
}

/// Prints a snapshot whenever a [GenerationEvent::Snapshot](crate::time::GenerationEvent)
/// occurs.
pub struct SnapshotPrinter<W> {
    out: W,
    include_border: bool,
}

impl<W: Write> SnapshotPrinter<W> {
    /// Prints snapshots into `out`.
    pub fn new(out: W, include_border: bool) -> Self {
        SnapshotPrinter {
            out,
            include_border,
        }
    }

    /// Writes and flushes a single snapshot.
    pub fn print(&mut self, grid: &Grid, generation: u64) -> std::io::Result<()> {
        write_snapshot(&mut self.out, grid, generation, self.include_border)?;
        self.out.flush()
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

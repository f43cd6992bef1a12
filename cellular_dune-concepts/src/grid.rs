use crate::errors::{ConfigError, OutOfBounds};

use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// State of a single cell.
///
/// Interior cells are either [DEAD] or [ALIVE].
/// Cells of the ghost border hold [BORDER_SENTINEL].
pub type CellState = u8;

/// A dead interior cell
pub const DEAD: CellState = 0;

/// A living interior cell
pub const ALIVE: CellState = 1;

/// Value of every cell of the ghost border.
///
/// The border always counts as alive during neighbor counting and never transitions.
pub const BORDER_SENTINEL: CellState = ALIVE;

/// Two-dimensional cell space surrounded by a one-cell wide ghost border.
///
/// The interior spans rows `1..=rows` and columns `1..=cols`.
/// Rows `0` and `rows+1` as well as columns `0` and `cols+1` form the ghost border which is
/// pinned to [BORDER_SENTINEL] such that counting the 3x3 neighborhood of any interior cell never
/// leaves the buffer.
///
/// ```
/// # use cellular_dune_concepts::{Grid, ALIVE, BORDER_SENTINEL};
/// let mut grid = Grid::new(3, 4);
/// assert_eq!(grid.stride(), 6);
/// grid.set(2, 2, ALIVE).unwrap();
/// assert_eq!(grid.get(2, 2).unwrap(), ALIVE);
/// assert_eq!(grid.get(0, 5).unwrap(), BORDER_SENTINEL);
/// assert!(grid.get(5, 0).is_err());
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<CellState>,
}

impl Grid {
    /// Allocates a grid with a dead interior and a pinned ghost border.
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut grid = Grid {
            rows,
            cols,
            cells: vec![DEAD; (rows + 2) * (cols + 2)],
        };
        grid.pin_border();
        grid
    }

    /// Constructs a grid from its interior values given in row-major order.
    ///
    /// ```
    /// # use cellular_dune_concepts::Grid;
    /// let grid = Grid::from_interior(2, 2, &[1, 0, 0, 1]).unwrap();
    /// assert_eq!(grid.population(), 2);
    /// assert!(Grid::from_interior(2, 2, &[1, 0, 0]).is_err());
    /// ```
    pub fn from_interior(
        rows: usize,
        cols: usize,
        interior: &[CellState],
    ) -> Result<Self, ConfigError> {
        if interior.len() != rows * cols {
            return Err(ConfigError(format!(
                "interior of a {rows}x{cols} grid needs {} values but {} were given",
                rows * cols,
                interior.len()
            )));
        }
        let mut grid = Grid::new(rows, cols);
        for (row, values) in (1..=rows).zip(interior.chunks(cols.max(1))) {
            grid.row_mut(row)[1..=cols].copy_from_slice(values);
        }
        Ok(grid)
    }

    /// Reassembles a grid from its full stored buffer including the ghost border.
    ///
    /// The border is pinned again regardless of the values in `cells`.
    /// ```
    /// # use cellular_dune_concepts::Grid;
    /// let mut grid = Grid::new(2, 3);
    /// grid.randomize_interior(0);
    /// let copy = Grid::from_stored(2, 3, grid.as_slice().to_vec()).unwrap();
    /// assert_eq!(copy, grid);
    /// assert!(Grid::from_stored(2, 3, vec![1; 12]).is_err());
    /// ```
    pub fn from_stored(
        rows: usize,
        cols: usize,
        cells: Vec<CellState>,
    ) -> Result<Self, ConfigError> {
        let expected = (rows + 2) * (cols + 2);
        if cells.len() != expected {
            return Err(ConfigError(format!(
                "stored buffer of a {rows}x{cols} grid needs {expected} values but {} were given",
                cells.len()
            )));
        }
        let mut grid = Grid { rows, cols, cells };
        grid.pin_border();
        Ok(grid)
    }

    /// Number of interior rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of interior columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Length of one stored row including both border columns.
    pub fn stride(&self) -> usize {
        self.cols + 2
    }

    /// Number of stored rows including both border rows.
    pub fn height(&self) -> usize {
        self.rows + 2
    }

    /// Returns true if the coordinate belongs to the ghost border.
    pub fn is_border(&self, row: usize, col: usize) -> bool {
        row == 0 || row == self.rows + 1 || col == 0 || col == self.cols + 1
    }

    fn check_bounds(&self, row: usize, col: usize) -> Result<usize, OutOfBounds> {
        if row > self.rows + 1 || col > self.cols + 1 {
            return Err(OutOfBounds::at(row, col, self.rows, self.cols));
        }
        Ok(row * self.stride() + col)
    }

    /// Reads the state at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Result<CellState, OutOfBounds> {
        let index = self.check_bounds(row, col)?;
        Ok(self.cells[index])
    }

    /// Overwrites the state at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: CellState) -> Result<(), OutOfBounds> {
        let index = self.check_bounds(row, col)?;
        self.cells[index] = value;
        Ok(())
    }

    /// Unchecked read used in the hot loops of the schedulers.
    ///
    /// # Panics
    /// Panics if the coordinate lies outside of the stored buffer.
    #[inline]
    pub fn cell(&self, row: usize, col: usize) -> CellState {
        self.cells[row * self.stride() + col]
    }

    /// One full stored row including its two border cells.
    #[inline]
    pub fn row(&self, row: usize) -> &[CellState] {
        let stride = self.stride();
        &self.cells[row * stride..(row + 1) * stride]
    }

    /// Mutable access to one stored row including its two border cells.
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [CellState] {
        let stride = self.stride();
        &mut self.cells[row * stride..(row + 1) * stride]
    }

    /// Contiguous block of stored rows `range.start..range.end`.
    pub fn rows_slice(&self, range: core::ops::Range<usize>) -> &[CellState] {
        let stride = self.stride();
        &self.cells[range.start * stride..range.end * stride]
    }

    /// Mutable contiguous block of stored rows `range.start..range.end`.
    pub fn rows_slice_mut(&mut self, range: core::ops::Range<usize>) -> &mut [CellState] {
        let stride = self.stride();
        &mut self.cells[range.start * stride..range.end * stride]
    }

    /// The whole stored buffer in row-major order.
    pub fn as_slice(&self) -> &[CellState] {
        &self.cells
    }

    /// Fills every interior cell independently and uniformly with [DEAD] or [ALIVE].
    ///
    /// ```
    /// # use cellular_dune_concepts::Grid;
    /// let mut g1 = Grid::new(16, 16);
    /// let mut g2 = Grid::new(16, 16);
    /// g1.randomize_interior(42);
    /// g2.randomize_interior(42);
    /// assert_eq!(g1, g2);
    /// assert!(g1.border_intact());
    /// ```
    pub fn randomize_interior(&mut self, rng_seed: u64) {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(rng_seed);
        self.randomize_interior_with(&mut rng);
    }

    /// Same as [Grid::randomize_interior] but draws from a supplied generator.
    pub fn randomize_interior_with<R: Rng>(&mut self, rng: &mut R) {
        let cols = self.cols;
        for row in 1..=self.rows {
            self.row_mut(row)[1..=cols]
                .iter_mut()
                .for_each(|cell| *cell = rng.gen_range(DEAD..=ALIVE));
        }
    }

    /// Sets every cell of the ghost border to [BORDER_SENTINEL].
    pub fn pin_border(&mut self) {
        let (height, stride) = (self.height(), self.stride());
        self.row_mut(0).fill(BORDER_SENTINEL);
        self.row_mut(height - 1).fill(BORDER_SENTINEL);
        for row in 1..height - 1 {
            let row = self.row_mut(row);
            row[0] = BORDER_SENTINEL;
            row[stride - 1] = BORDER_SENTINEL;
        }
    }

    /// Checks that every border cell still holds [BORDER_SENTINEL].
    pub fn border_intact(&self) -> bool {
        let (height, stride) = (self.height(), self.stride());
        self.row(0).iter().all(|&c| c == BORDER_SENTINEL)
            && self.row(height - 1).iter().all(|&c| c == BORDER_SENTINEL)
            && (1..height - 1).all(|row| {
                self.cell(row, 0) == BORDER_SENTINEL
                    && self.cell(row, stride - 1) == BORDER_SENTINEL
            })
    }

    /// Number of living interior cells.
    pub fn population(&self) -> usize {
        (1..=self.rows)
            .map(|row| {
                self.row(row)[1..=self.cols]
                    .iter()
                    .filter(|&&c| c == ALIVE)
                    .count()
            })
            .sum()
    }
}

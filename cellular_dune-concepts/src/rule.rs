use crate::grid::{CellState, Grid, ALIVE};

use serde::{Deserialize, Serialize};

/// Decides the next state of a single interior cell.
///
/// Implementors must be pure: the decision may only depend on the values currently stored in
/// `grid`.
/// Schedulers rely on this in order to reason about which generation a read observes.
pub trait TransitionRule: Send + Sync {
    /// Returns true if the cell at `(row, col)` is alive in the next generation.
    ///
    /// Only interior coordinates are valid; implementors may panic for any other.
    fn alive_next(&self, grid: &Grid, row: usize, col: usize) -> bool;

    /// Numeric version of [TransitionRule::alive_next].
    #[inline]
    fn next_state(&self, grid: &Grid, row: usize, col: usize) -> CellState {
        self.alive_next(grid, row, col) as CellState
    }
}

/// Counts living cells in the 3x3 neighborhood of `(row, col)` without the cell itself.
///
/// Border cells count as alive since they hold
/// [BORDER_SENTINEL](crate::grid::BORDER_SENTINEL).
///
/// ```
/// # use cellular_dune_concepts::{Grid, living_neighbors};
/// // A corner cell of an otherwise dead interior touches five border cells
/// let grid = Grid::new(3, 3);
/// assert_eq!(living_neighbors(&grid, 1, 1), 5);
/// assert_eq!(living_neighbors(&grid, 2, 2), 0);
/// ```
///
/// # Panics
/// Panics if `(row, col)` is not an interior cell of `grid`.
#[inline]
pub fn living_neighbors(grid: &Grid, row: usize, col: usize) -> u8 {
    debug_assert!(
        (1..=grid.rows()).contains(&row) && (1..=grid.cols()).contains(&col),
        "({row}, {col}) is not an interior cell"
    );
    let neighborhood: u8 = (row - 1..=row + 1)
        .map(|r| {
            grid.row(r)[col - 1..=col + 1]
                .iter()
                .filter(|&&c| c == ALIVE)
                .count() as u8
        })
        .sum();
    neighborhood - (grid.cell(row, col) == ALIVE) as u8
}

/// Game-of-Life style rule with two thresholds.
///
/// A living cell survives if its number of living neighbors lies within
/// `survive_min..=survive_max`.
/// A dead cell comes alive if exactly `birth` neighbors are alive.
/// The [Default] implementation yields the classic `B3/S23` rule.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct ThresholdRule {
    /// Lower survival threshold
    pub survive_min: u8,
    /// Upper survival threshold
    pub survive_max: u8,
    /// Exact count which lets a dead cell come alive
    pub birth: u8,
}

impl Default for ThresholdRule {
    fn default() -> Self {
        ThresholdRule {
            survive_min: 2,
            survive_max: 3,
            birth: 3,
        }
    }
}

impl TransitionRule for ThresholdRule {
    #[inline]
    fn alive_next(&self, grid: &Grid, row: usize, col: usize) -> bool {
        let neighbors = living_neighbors(grid, row, col);
        match grid.cell(row, col) == ALIVE {
            true => (self.survive_min..=self.survive_max).contains(&neighbors),
            false => neighbors == self.birth,
        }
    }
}

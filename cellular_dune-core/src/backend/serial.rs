use cellular_dune_concepts::{Grid, ThresholdRule, TransitionRule};

use super::errors::SimulationError;
use super::partition::sweep_rows;
use super::scheduler::UpdateScheduler;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Serial double-buffered sweep.
///
/// Every interior cell of generation `g+1` is computed from generation `g` only.
/// The next generation is written into a scratch buffer which is then swapped with the grid.
/// This is the reference semantics all other schedulers approximate.
///
/// ```
/// # use cellular_dune_concepts::Grid;
/// # use cellular_dune_core::backend::{SynchronousSweep, UpdateScheduler};
/// // An isolated living cell dies
/// let mut grid = Grid::from_interior(3, 3, &[0, 0, 0, 0, 1, 0, 0, 0, 0]).unwrap();
/// let mut scheduler = SynchronousSweep::default();
/// scheduler.advance(&mut grid).unwrap();
/// assert_eq!(grid.get(2, 2).unwrap(), 0);
/// assert_eq!(grid, Grid::new(3, 3));
/// ```
#[derive(Clone, Debug)]
pub struct SynchronousSweep<R = ThresholdRule> {
    rule: R,
    next: Option<Grid>,
}

impl Default for SynchronousSweep {
    fn default() -> Self {
        Self::new(ThresholdRule::default())
    }
}

impl<R: TransitionRule> SynchronousSweep<R> {
    /// Sweeps with the given rule.
    pub fn new(rule: R) -> Self {
        SynchronousSweep { rule, next: None }
    }

    /// Hands out the scratch buffer, allocating it when the shape changed.
    fn scratch(&mut self, grid: &Grid) -> Grid {
        match self.next.take() {
            Some(next) if next.rows() == grid.rows() && next.cols() == grid.cols() => next,
            _ => grid.clone(),
        }
    }
}

impl<R: TransitionRule> UpdateScheduler for SynchronousSweep<R> {
    fn description(&self) -> &'static str {
        "synchronous serial"
    }

    #[cfg_attr(feature = "tracing", instrument(skip_all))]
    fn advance(&mut self, grid: &mut Grid) -> Result<(), SimulationError> {
        let mut next = self.scratch(grid);
        let interior = 1..grid.rows() + 1;
        sweep_rows(&self.rule, grid, 1, next.rows_slice_mut(interior));
        std::mem::swap(grid, &mut next);
        self.next = Some(next);
        Ok(())
    }
}

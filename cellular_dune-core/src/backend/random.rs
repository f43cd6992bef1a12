use cellular_dune_concepts::{Grid, ThresholdRule, TransitionRule};
use itertools::iproduct;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::errors::SimulationError;
use super::scheduler::UpdateScheduler;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Picks one interior cell uniformly at random per step and updates it in place.
///
/// There is no generation boundary: a single call to [UpdateScheduler::advance] updates exactly
/// one cell which reads whatever values are currently stored, including those written by
/// earlier steps.
/// Consequently the generation count of a run is the number of single-cell updates.
///
/// ```
/// # use cellular_dune_concepts::Grid;
/// # use cellular_dune_core::backend::{RandomIndependent, UpdateScheduler};
/// let mut grid = Grid::new(4, 4);
/// let mut scheduler = RandomIndependent::from_seed(7);
/// scheduler.advance(&mut grid).unwrap();
/// // At most one cell changed
/// assert!(grid.population() <= 1);
/// ```
#[derive(Clone, Debug)]
pub struct RandomIndependent<R = ThresholdRule> {
    rule: R,
    rng: ChaCha8Rng,
}

impl RandomIndependent {
    /// Uses the default rule and a generator seeded with `rng_seed`.
    pub fn from_seed(rng_seed: u64) -> Self {
        Self::new(ThresholdRule::default(), rng_seed)
    }
}

impl<R: TransitionRule> RandomIndependent<R> {
    /// Updates cells with `rule` in an order drawn from a generator seeded with `rng_seed`.
    pub fn new(rule: R, rng_seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(rng_seed);
        // Keep the visiting order independent of the stream used for initialization
        rng.set_stream(1);
        RandomIndependent { rule, rng }
    }

    /// Draws the coordinate of the next cell to update.
    fn draw(&mut self, grid: &Grid) -> Option<(usize, usize)> {
        if grid.rows() == 0 || grid.cols() == 0 {
            return None;
        }
        let row = self.rng.gen_range(1..=grid.rows());
        let col = self.rng.gen_range(1..=grid.cols());
        Some((row, col))
    }
}

impl<R: TransitionRule> UpdateScheduler for RandomIndependent<R> {
    fn description(&self) -> &'static str {
        "asynchronous random independent"
    }

    fn advance(&mut self, grid: &mut Grid) -> Result<(), SimulationError> {
        if let Some((row, col)) = self.draw(grid) {
            let value = self.rule.next_state(grid, row, col);
            grid.set(row, col, value)?;
        }
        Ok(())
    }
}

/// How [RandomFullSweep] draws its visiting order.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub enum SweepSampling {
    /// Shuffles all interior coordinates once per generation and visits them in that order.
    #[default]
    ShuffledPermutation,
    /// Draws uniformly random coordinates and discards those already visited in this
    /// generation.
    ///
    /// The expected number of draws grows like `n log n`.
    RejectAndRetry,
}

/// Marks which interior cells were already updated in the current generation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisitedSet {
    cols: usize,
    marks: Vec<bool>,
    n_visited: usize,
}

impl VisitedSet {
    /// Empty set for an interior of `rows x cols` cells.
    pub fn new(rows: usize, cols: usize) -> Self {
        VisitedSet {
            cols,
            marks: vec![false; rows * cols],
            n_visited: 0,
        }
    }

    fn index(&self, row: usize, col: usize) -> usize {
        (row - 1) * self.cols + col - 1
    }

    /// Marks the interior cell `(row, col)` and returns true if it was not visited before.
    pub fn insert(&mut self, row: usize, col: usize) -> bool {
        let index = self.index(row, col);
        let fresh = !self.marks[index];
        if fresh {
            self.marks[index] = true;
            self.n_visited += 1;
        }
        fresh
    }

    /// Returns true if the interior cell `(row, col)` was visited.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.marks[self.index(row, col)]
    }

    /// Number of distinct cells visited
    pub fn len(&self) -> usize {
        self.n_visited
    }

    /// Returns true if no cell was visited yet.
    pub fn is_empty(&self) -> bool {
        self.n_visited == 0
    }

    /// Returns true once every interior cell has been visited.
    pub fn is_complete(&self) -> bool {
        self.n_visited == self.marks.len()
    }

    /// Forgets all visits.
    pub fn clear(&mut self) {
        self.marks.fill(false);
        self.n_visited = 0;
    }
}

/// Visits every interior cell exactly once per generation in random order and updates it in
/// place.
///
/// Cells visited later in a sweep read neighbors which were already updated in the same sweep.
/// A generation ends only when every interior cell was visited.
///
/// ```
/// # use cellular_dune_concepts::Grid;
/// # use cellular_dune_core::backend::{RandomFullSweep, UpdateScheduler};
/// let mut grid = Grid::new(5, 3);
/// grid.randomize_interior(1);
/// let mut scheduler = RandomFullSweep::from_seed(1);
/// scheduler.advance(&mut grid).unwrap();
/// assert_eq!(scheduler.visited().len(), 15);
/// assert!(scheduler.visited().is_complete());
/// ```
#[derive(Clone, Debug)]
pub struct RandomFullSweep<R = ThresholdRule> {
    rule: R,
    rng: ChaCha8Rng,
    sampling: SweepSampling,
    visited: VisitedSet,
    order: Vec<(usize, usize)>,
}

impl RandomFullSweep {
    /// Uses the default rule, shuffled permutations and a generator seeded with `rng_seed`.
    pub fn from_seed(rng_seed: u64) -> Self {
        Self::new(ThresholdRule::default(), rng_seed, SweepSampling::default())
    }
}

impl<R: TransitionRule> RandomFullSweep<R> {
    /// Sweeps with `rule` using the given sampling method.
    pub fn new(rule: R, rng_seed: u64, sampling: SweepSampling) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(rng_seed);
        rng.set_stream(1);
        RandomFullSweep {
            rule,
            rng,
            sampling,
            visited: VisitedSet::default(),
            order: Vec::new(),
        }
    }

    /// Cells visited in the most recent generation.
    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    /// Visiting order of the most recent generation.
    pub fn last_order(&self) -> &[(usize, usize)] {
        &self.order
    }

    fn reset(&mut self, grid: &Grid) {
        if self.visited.marks.len() != grid.rows() * grid.cols() || self.visited.cols != grid.cols()
        {
            self.visited = VisitedSet::new(grid.rows(), grid.cols());
        } else {
            self.visited.clear();
        }
        self.order.clear();
    }

    fn update(&mut self, grid: &mut Grid, row: usize, col: usize) -> Result<(), SimulationError> {
        let value = self.rule.next_state(grid, row, col);
        grid.set(row, col, value)?;
        self.order.push((row, col));
        Ok(())
    }

    fn sweep_shuffled(&mut self, grid: &mut Grid) -> Result<(), SimulationError> {
        let mut coordinates: Vec<_> = iproduct!(1..=grid.rows(), 1..=grid.cols()).collect();
        coordinates.shuffle(&mut self.rng);
        for (row, col) in coordinates {
            self.visited.insert(row, col);
            self.update(grid, row, col)?;
        }
        Ok(())
    }

    fn sweep_rejecting(&mut self, grid: &mut Grid) -> Result<(), SimulationError> {
        while !self.visited.is_complete() {
            let row = self.rng.gen_range(1..=grid.rows());
            let col = self.rng.gen_range(1..=grid.cols());
            if self.visited.insert(row, col) {
                self.update(grid, row, col)?;
            }
        }
        Ok(())
    }
}

impl<R: TransitionRule> UpdateScheduler for RandomFullSweep<R> {
    fn description(&self) -> &'static str {
        "asynchronous random order"
    }

    #[cfg_attr(feature = "tracing", instrument(skip_all))]
    fn advance(&mut self, grid: &mut Grid) -> Result<(), SimulationError> {
        self.reset(grid);
        debug_assert!(self.visited.is_empty());
        if grid.rows() == 0 || grid.cols() == 0 {
            return Ok(());
        }
        match self.sampling {
            SweepSampling::ShuffledPermutation => self.sweep_shuffled(grid)?,
            SweepSampling::RejectAndRetry => self.sweep_rejecting(grid)?,
        }
        debug_assert!(self.visited.is_complete());
        Ok(())
    }
}

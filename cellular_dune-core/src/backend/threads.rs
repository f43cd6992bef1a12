use core::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use cellular_dune_concepts::{
    CellState, Grid, SyncPrimitiveError, ThresholdRule, TransitionRule, DEAD,
};

use super::errors::SimulationError;
use super::partition::{partition_interior_rows, sweep_rows, RowBand};
use super::scheduler::{catch_panic, GenerationObserver, UpdateScheduler};
use super::sync::{BarrierSync, BuildGroup, SyncWorkers};
use crate::time::GenerationCounter;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Synchronous sweep executed by a fixed set of worker threads.
///
/// The interior rows are split into equally sized bands, one per worker.
/// Every generation consists of two phases separated by barriers:
/// 1. every worker computes the next state of its band into its own slot of the next buffer
///    while only reading the current grid,
/// 2. the designated worker `0` takes the exclusive lock on the current grid, commits all bands
///    and notifies the [GenerationObserver].
///
/// A second barrier ensures that no worker starts reading the next generation before the commit
/// is complete.
/// The number of interior rows has to be divisible by the number of workers.
///
/// ```
/// # use cellular_dune_concepts::Grid;
/// # use cellular_dune_core::backend::{BarrierThreaded, SynchronousSweep, UpdateScheduler};
/// let mut grid = Grid::new(8, 5);
/// grid.randomize_interior(3);
/// let mut reference = grid.clone();
///
/// let mut threaded = BarrierThreaded::new(4.try_into().unwrap());
/// let mut serial = SynchronousSweep::default();
/// for _ in 0..3 {
///     threaded.advance(&mut grid).unwrap();
///     serial.advance(&mut reference).unwrap();
/// }
/// assert_eq!(grid, reference);
/// ```
#[derive(Clone, Debug)]
pub struct BarrierThreaded<R = ThresholdRule> {
    rule: R,
    n_workers: NonZeroUsize,
}

impl BarrierThreaded {
    /// Runs the default rule on `n_workers` threads.
    pub fn new(n_workers: NonZeroUsize) -> Self {
        Self::with_rule(ThresholdRule::default(), n_workers)
    }
}

impl<R: TransitionRule> BarrierThreaded<R> {
    /// Runs `rule` on `n_workers` threads.
    pub fn with_rule(rule: R, n_workers: NonZeroUsize) -> Self {
        BarrierThreaded { rule, n_workers }
    }

    /// Number of worker threads
    pub fn n_workers(&self) -> NonZeroUsize {
        self.n_workers
    }
}

/// State shared by all workers during one run.
struct Shared<'a, R> {
    rule: &'a R,
    current: RwLock<&'a mut Grid>,
    bands: Vec<RowBand>,
    slots: Vec<Mutex<Vec<CellState>>>,
    stop_now: AtomicBool,
    error: Mutex<Option<SimulationError>>,
}

impl<R: TransitionRule> Shared<'_, R> {
    /// Makes every worker stop after the current generation.
    ///
    /// Only the first error is kept.
    fn abort(&self, error: SimulationError) {
        #[cfg(feature = "tracing")]
        tracing::error!("worker failed, stopping simulation: {error}");
        self.stop_now.store(true, Ordering::SeqCst);
        if let Ok(mut slot) = self.error.lock() {
            if slot.is_none() {
                *slot = Some(error);
            }
        }
    }

    fn compute_band(&self, owner: usize) -> Result<(), SimulationError> {
        let band = &self.bands[owner];
        let current = self.current.read()?;
        let mut slot = self.slots[owner].lock()?;
        sweep_rows(self.rule, &current, band.rows.start, &mut slot);
        Ok(())
    }
}

/// Duties of the designated worker.
struct Leader<'a> {
    counter: GenerationCounter,
    observer: &'a mut dyn GenerationObserver,
}

impl Leader<'_> {
    /// Writes all bands into the current grid while holding the exclusive lock.
    fn commit<R: TransitionRule>(&mut self, shared: &Shared<'_, R>) -> Result<(), SimulationError> {
        let mut current = shared.current.write()?;
        for (band, slot) in shared.bands.iter().zip(shared.slots.iter()) {
            let slot = slot.lock()?;
            current
                .rows_slice_mut(band.rows.clone())
                .copy_from_slice(&slot);
        }
        let done = self.counter.complete();
        #[cfg(feature = "tracing")]
        tracing::trace!(generation = done.index, "committed next generation");
        self.observer.observe(&done, &current)
    }
}

fn work<R: TransitionRule>(
    shared: &Shared<'_, R>,
    owner: usize,
    n_generations: u64,
    mut syncer: BarrierSync,
    mut leader: Option<Leader<'_>>,
    start: crossbeam_channel::Receiver<bool>,
) -> Option<GenerationCounter> {
    // The supervisor signals false if not all workers could be spawned
    if !matches!(start.recv(), Ok(true)) {
        return None;
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(owner, rows = ?shared.bands[owner].rows, "worker starts");

    for _ in 0..n_generations {
        if !shared.stop_now.load(Ordering::SeqCst) {
            if let Err(error) = catch_panic("worker", || shared.compute_band(owner)) {
                shared.abort(error);
            }
        }
        syncer.sync();

        if let Some(leader) = leader.as_mut() {
            if !shared.stop_now.load(Ordering::SeqCst) {
                if let Err(error) = catch_panic("designated worker", || leader.commit(shared)) {
                    shared.abort(error);
                }
            }
        }
        syncer.sync();

        // Check if we are stopping the simulation now
        if shared.stop_now.load(Ordering::SeqCst) {
            break;
        }
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(owner, "worker finished");
    leader.map(|leader| leader.counter)
}

impl<R: TransitionRule> UpdateScheduler for BarrierThreaded<R> {
    fn description(&self) -> &'static str {
        "synchronous threaded"
    }

    fn advance(&mut self, grid: &mut Grid) -> Result<(), SimulationError> {
        self.run(grid, GenerationCounter::new(1, None), &mut ())?;
        Ok(())
    }

    #[cfg_attr(feature = "tracing", instrument(skip_all, fields(n_workers = self.n_workers.get())))]
    fn run(
        &mut self,
        grid: &mut Grid,
        counter: GenerationCounter,
        observer: &mut dyn GenerationObserver,
    ) -> Result<GenerationCounter, SimulationError> {
        let bands = partition_interior_rows(grid.rows(), self.n_workers)?;
        let stride = grid.stride();
        let n_generations = counter.remaining();
        let slots = bands
            .iter()
            .map(|band| Mutex::new(vec![DEAD; band.len() * stride]))
            .collect();
        let shared = Shared {
            rule: &self.rule,
            current: RwLock::new(grid),
            bands,
            slots,
            stop_now: AtomicBool::new(false),
            error: Mutex::new(None),
        };
        let mut leader = Some(Leader { counter, observer });
        let syncers = BarrierSync::build_group(self.n_workers);
        let (start_sender, start_receiver) = crossbeam_channel::unbounded();

        let finished = std::thread::scope(|s| -> Result<_, SimulationError> {
            let mut handles = Vec::with_capacity(syncers.len());
            let mut spawn_error = None;
            for (band, syncer) in shared.bands.iter().zip(syncers) {
                let l = band.owner;
                let shared = &shared;
                let leader = match l {
                    0 => leader.take(),
                    _ => None,
                };
                let start = start_receiver.clone();
                let spawned = std::thread::Builder::new()
                    .name(format!("worker_thread_{:03.0}", l))
                    .spawn_scoped(s, move || {
                        work(shared, l, n_generations, syncer, leader, start)
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(error) => {
                        spawn_error = Some(SyncPrimitiveError(format!(
                            "could not spawn worker thread {l}: {error}"
                        )));
                        break;
                    }
                }
            }

            // This starts all threads simultaneously
            let go = spawn_error.is_none();
            for _ in 0..handles.len() {
                start_sender.send(go)?;
            }

            let mut finished = None;
            for handle in handles.into_iter() {
                let result = handle.join().map_err(|_| {
                    SyncPrimitiveError("a worker thread panicked".to_owned())
                })?;
                finished = finished.or(result);
            }
            match spawn_error {
                Some(error) => Err(error.into()),
                None => Ok(finished),
            }
        })?;

        if let Some(error) = shared.error.into_inner()? {
            return Err(error);
        }
        finished.ok_or_else(|| {
            SyncPrimitiveError("designated worker did not report back".to_owned()).into()
        })
    }
}

#[cfg(test)]
mod test_barrier_threaded {
    use super::*;
    use crate::backend::SynchronousSweep;
    use crate::time::CompletedGeneration;

    fn run_both(
        rows: usize,
        cols: usize,
        n_workers: usize,
        generations: u64,
        seed: u64,
    ) -> Result<(Grid, Grid), Box<dyn std::error::Error>> {
        let mut grid = Grid::new(rows, cols);
        grid.randomize_interior(seed);
        let mut reference = grid.clone();
        BarrierThreaded::new(n_workers.try_into()?).run(
            &mut grid,
            GenerationCounter::new(generations, None),
            &mut (),
        )?;
        SynchronousSweep::default().run(
            &mut reference,
            GenerationCounter::new(generations, None),
            &mut (),
        )?;
        Ok((grid, reference))
    }

    #[test]
    fn single_worker_matches_serial() -> Result<(), Box<dyn std::error::Error>> {
        let (grid, reference) = run_both(10, 12, 1, 25, 8)?;
        assert_eq!(grid, reference);
        Ok(())
    }

    #[test]
    fn many_workers_match_serial() -> Result<(), Box<dyn std::error::Error>> {
        for n_workers in [2, 3, 4, 6, 12] {
            let (grid, reference) = run_both(12, 9, n_workers, 15, n_workers as u64)?;
            assert_eq!(grid, reference, "n_workers={n_workers}");
            assert!(grid.border_intact());
        }
        Ok(())
    }

    #[test]
    fn uneven_rows_are_rejected() {
        let mut grid = Grid::new(10, 4);
        let result = BarrierThreaded::new(3.try_into().unwrap()).advance(&mut grid);
        assert!(matches!(result, Err(SimulationError::PartitionError(_))));
    }

    /// Remembers every generation it observed.
    struct Collect(Vec<(u64, Grid)>);

    impl GenerationObserver for Collect {
        fn observe(
            &mut self,
            done: &CompletedGeneration,
            grid: &Grid,
        ) -> Result<(), SimulationError> {
            self.0.push((done.index, grid.clone()));
            Ok(())
        }
    }

    #[test]
    fn observer_sees_every_generation() -> Result<(), Box<dyn std::error::Error>> {
        let mut grid = Grid::new(6, 6);
        grid.randomize_interior(21);
        let mut reference = grid.clone();
        let mut collect = Collect(Vec::new());
        let counter = BarrierThreaded::new(3.try_into()?).run(
            &mut grid,
            GenerationCounter::new(4, None),
            &mut collect,
        )?;
        assert_eq!(counter.completed(), 4);
        let mut serial = SynchronousSweep::default();
        for (expected_index, (index, observed)) in collect.0.into_iter().enumerate() {
            serial.advance(&mut reference)?;
            assert_eq!(index, expected_index as u64);
            assert_eq!(observed, reference);
        }
        Ok(())
    }

    /// Fails after a fixed number of generations.
    struct FailAt(u64);

    impl GenerationObserver for FailAt {
        fn observe(
            &mut self,
            done: &CompletedGeneration,
            _grid: &Grid,
        ) -> Result<(), SimulationError> {
            match done.index == self.0 {
                true => Err(std::io::Error::other("observer failed").into()),
                false => Ok(()),
            }
        }
    }

    #[test]
    fn observer_error_stops_all_workers() {
        let mut grid = Grid::new(8, 8);
        let result = BarrierThreaded::new(4.try_into().unwrap()).run(
            &mut grid,
            GenerationCounter::new(1_000, None),
            &mut FailAt(2),
        );
        assert!(matches!(result, Err(SimulationError::IoError(_))));
    }

    /// Panics in the middle of the run.
    struct PanicAt(u64);

    impl GenerationObserver for PanicAt {
        fn observe(
            &mut self,
            done: &CompletedGeneration,
            _grid: &Grid,
        ) -> Result<(), SimulationError> {
            assert!(done.index != self.0, "observer gave up at {}", done.index);
            Ok(())
        }
    }

    #[test]
    fn observer_panic_stops_all_workers() {
        let mut grid = Grid::new(8, 8);
        let result = BarrierThreaded::new(4.try_into().unwrap()).run(
            &mut grid,
            GenerationCounter::new(1_000, None),
            &mut PanicAt(3),
        );
        assert!(matches!(result, Err(SimulationError::SyncPrimitiveError(_))));
    }

    #[test]
    fn zero_generations_leave_grid_untouched() -> Result<(), Box<dyn std::error::Error>> {
        let mut grid = Grid::new(4, 4);
        grid.randomize_interior(1);
        let before = grid.clone();
        BarrierThreaded::new(2.try_into()?).run(
            &mut grid,
            GenerationCounter::new(0, None),
            &mut (),
        )?;
        assert_eq!(grid, before);
        Ok(())
    }
}

use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};

use cellular_dune_concepts::{Grid, SyncPrimitiveError};
use kdam::BarExt;

use super::errors::SimulationError;
use crate::snapshot::SnapshotPrinter;
use crate::time::{CompletedGeneration, GenerationCounter, GenerationEvent};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Receives the grid after every completed generation.
///
/// Schedulers call the observer exactly once per generation, after the generation has been
/// fully committed and before the next one starts.
/// Multi-threaded schedulers call it from a single designated worker.
pub trait GenerationObserver: Send {
    /// Inspects the grid after generation `done.index` was completed.
    fn observe(&mut self, done: &CompletedGeneration, grid: &Grid) -> Result<(), SimulationError>;
}

impl GenerationObserver for () {
    fn observe(
        &mut self,
        _done: &CompletedGeneration,
        _grid: &Grid,
    ) -> Result<(), SimulationError> {
        Ok(())
    }
}

/// Prints debug snapshots and advances a progress bar.
///
/// ```
/// # use cellular_dune_concepts::Grid;
/// # use cellular_dune_core::backend::{GenerationObserver, Monitor};
/// # use cellular_dune_core::time::GenerationCounter;
/// let mut counter = GenerationCounter::new(3, Some(2.try_into().unwrap()));
/// let mut monitor = Monitor::new().with_snapshots(Vec::new(), false);
/// let grid = Grid::new(1, 1);
/// while !counter.is_finished() {
///     monitor.observe(&counter.complete(), &grid).unwrap();
/// }
/// let text = String::from_utf8(monitor.into_snapshot_writer().unwrap()).unwrap();
/// assert_eq!(text, "TIMESTEP # 0\n 0 \n\nTIMESTEP # 2\n 0 \n\n");
/// ```
pub struct Monitor<W = Box<dyn Write + Send>> {
    printer: Option<SnapshotPrinter<W>>,
    bar: Option<kdam::Bar>,
}

impl<W> Default for Monitor<W> {
    fn default() -> Self {
        Monitor {
            printer: None,
            bar: None,
        }
    }
}

impl<W: Write + Send> Monitor<W> {
    /// A monitor which does nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prints a snapshot into `out` whenever the counter schedules one.
    pub fn with_snapshots(mut self, out: W, include_border: bool) -> Self {
        self.printer = Some(SnapshotPrinter::new(out, include_border));
        self
    }

    /// Shows a progress bar sized to the total number of generations of `counter`.
    pub fn with_progressbar(
        mut self,
        counter: &GenerationCounter,
    ) -> Result<Self, SimulationError> {
        self.bar = Some(counter.initialize_bar()?);
        Ok(self)
    }

    /// Returns the writer which received the snapshots.
    pub fn into_snapshot_writer(self) -> Option<W> {
        self.printer.map(SnapshotPrinter::into_inner)
    }
}

impl<W: Write + Send> GenerationObserver for Monitor<W> {
    fn observe(&mut self, done: &CompletedGeneration, grid: &Grid) -> Result<(), SimulationError> {
        if let (Some(GenerationEvent::Snapshot), Some(printer)) = (done.event, &mut self.printer) {
            printer.print(grid, done.index)?;
        }
        if let Some(bar) = &mut self.bar {
            bar.update(1)?;
        }
        Ok(())
    }
}

/// Runs `f` and turns a panic into an error.
///
/// Workers which share barriers use this so that a single panicking worker stops the whole
/// group at the next synchronization point instead of leaving the others waiting.
pub(crate) fn catch_panic<T>(
    what: &str,
    f: impl FnOnce() -> Result<T, SimulationError>,
) -> Result<T, SimulationError> {
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|_| Err(SyncPrimitiveError(format!("{what} panicked")).into()))
}

/// Advances a [Grid] generation by generation.
///
/// This is the central abstraction of the engine.
/// Every implementor decides in which order cells are visited and how concurrent workers
/// agree on the next generation.
/// All implementors terminate after exactly the number of generations given by the
/// [GenerationCounter] and never modify the ghost border.
pub trait UpdateScheduler {
    /// Short description used when reporting timings
    fn description(&self) -> &'static str;

    /// Performs one generation.
    fn advance(&mut self, grid: &mut Grid) -> Result<(), SimulationError>;

    /// Performs all remaining generations of `counter` and hands every completed generation to
    /// `observer`.
    ///
    /// Returns the finished counter.
    #[cfg_attr(feature = "tracing", instrument(skip_all))]
    fn run(
        &mut self,
        grid: &mut Grid,
        mut counter: GenerationCounter,
        observer: &mut dyn GenerationObserver,
    ) -> Result<GenerationCounter, SimulationError> {
        while !counter.is_finished() {
            self.advance(grid)?;
            let done = counter.complete();
            observer.observe(&done, grid)?;
        }
        Ok(counter)
    }
}

#[cfg(test)]
mod test_monitor {
    use super::*;
    use core::num::NonZeroU64;

    /// Counts how often it was called and remembers the indices.
    #[derive(Default)]
    struct Recorder(Vec<u64>);

    impl GenerationObserver for Recorder {
        fn observe(
            &mut self,
            done: &CompletedGeneration,
            _grid: &Grid,
        ) -> Result<(), SimulationError> {
            self.0.push(done.index);
            Ok(())
        }
    }

    /// Flips a single cell every generation.
    struct Toggle;

    impl UpdateScheduler for Toggle {
        fn description(&self) -> &'static str {
            "toggle"
        }

        fn advance(&mut self, grid: &mut Grid) -> Result<(), SimulationError> {
            let value = grid.get(1, 1)?;
            grid.set(1, 1, 1 - value)?;
            Ok(())
        }
    }

    #[test]
    fn default_run_calls_observer_once_per_generation() -> Result<(), Box<dyn std::error::Error>> {
        let mut grid = Grid::new(2, 2);
        let mut recorder = Recorder::default();
        let counter = Toggle.run(&mut grid, GenerationCounter::new(5, None), &mut recorder)?;
        assert!(counter.is_finished());
        assert_eq!(recorder.0, vec![0, 1, 2, 3, 4]);
        assert_eq!(grid.get(1, 1)?, 1);
        Ok(())
    }

    #[test]
    fn snapshots_follow_interval() -> Result<(), Box<dyn std::error::Error>> {
        let mut grid = Grid::new(1, 1);
        let mut monitor = Monitor::new().with_snapshots(Vec::new(), true);
        let counter = GenerationCounter::new(21, NonZeroU64::new(10));
        Toggle.run(&mut grid, counter, &mut monitor)?;
        let text = String::from_utf8(monitor.into_snapshot_writer().unwrap_or_default())?;
        let headers: Vec<_> = text.lines().filter(|l| l.starts_with("TIMESTEP")).collect();
        assert_eq!(headers, vec!["TIMESTEP # 0", "TIMESTEP # 10", "TIMESTEP # 20"]);
        // Generation 0 flipped the center cell on
        assert!(text.starts_with("TIMESTEP # 0\n 1  1  1 \n 1  1  1 \n 1  1  1 \n\n"));
        Ok(())
    }

    #[test]
    fn progressbar_runs_alongside_snapshots() -> Result<(), Box<dyn std::error::Error>> {
        let mut grid = Grid::new(1, 1);
        let counter = GenerationCounter::new(12, NonZeroU64::new(5));
        let mut monitor = Monitor::new()
            .with_snapshots(Vec::new(), false)
            .with_progressbar(&counter)?;
        let counter = Toggle.run(&mut grid, counter, &mut monitor)?;
        assert_eq!(counter.completed(), 12);
        let text = String::from_utf8(monitor.into_snapshot_writer().unwrap_or_default())?;
        assert_eq!(text.matches("TIMESTEP").count(), 3);
        Ok(())
    }

    #[test]
    fn panics_become_errors() {
        let result: Result<(), _> = catch_panic("observer", || panic!("sink closed"));
        assert!(matches!(result, Err(SimulationError::SyncPrimitiveError(_))));
        assert_eq!(catch_panic("observer", || Ok(3)).ok(), Some(3));
    }

    #[test]
    fn zero_generations_never_observe() -> Result<(), Box<dyn std::error::Error>> {
        let mut grid = Grid::new(2, 2);
        let mut recorder = Recorder::default();
        Toggle.run(&mut grid, GenerationCounter::new(0, None), &mut recorder)?;
        assert!(recorder.0.is_empty());
        assert_eq!(grid, Grid::new(2, 2));
        Ok(())
    }
}

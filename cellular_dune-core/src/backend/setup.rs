use core::num::{NonZeroU64, NonZeroUsize};

use cellular_dune_concepts::{ConfigError, Grid, ThresholdRule};
use serde::{Deserialize, Serialize};

use super::errors::SimulationError;
use super::hybrid::DistributedHybrid;
use super::partition::{partition_global_rows, partition_interior_rows};
use super::random::{RandomFullSweep, RandomIndependent, SweepSampling};
use super::scheduler::{GenerationObserver, Monitor, UpdateScheduler};
use super::serial::SynchronousSweep;
use super::threads::BarrierThreaded;
use crate::time::GenerationCounter;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Selects the [UpdateScheduler] driving the simulation.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum Strategy {
    /// [SynchronousSweep]
    SynchronousSweep,
    /// [RandomIndependent]
    RandomIndependent,
    /// [RandomFullSweep]
    RandomFullSweep,
    /// [BarrierThreaded]
    BarrierThreaded,
    /// [DistributedHybrid]
    DistributedHybrid,
}

impl Strategy {
    /// Constructs the scheduler described by `settings`.
    pub fn build(&self, settings: &Settings) -> Box<dyn UpdateScheduler> {
        match self {
            Strategy::SynchronousSweep => Box::new(SynchronousSweep::default()),
            Strategy::RandomIndependent => {
                Box::new(RandomIndependent::from_seed(settings.rng_seed))
            }
            Strategy::RandomFullSweep => Box::new(RandomFullSweep::new(
                ThresholdRule::default(),
                settings.rng_seed,
                settings.sampling,
            )),
            Strategy::BarrierThreaded => Box::new(BarrierThreaded::new(settings.workers)),
            Strategy::DistributedHybrid => Box::new(DistributedHybrid::new(
                settings.workers,
                settings.threads_per_peer,
            )),
        }
    }
}

/// Specify the grid, the strategy and everything surrounding execution
///
/// ```
/// # use cellular_dune_core::backend::{Settings, Strategy};
/// let mut settings = Settings::new(6, 6, 10, Strategy::DistributedHybrid);
/// settings.workers = 4.try_into().unwrap();
/// assert!(settings.validate().is_ok());
/// settings.workers = 3.try_into().unwrap();
/// assert!(settings.validate().is_err());
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Number of interior rows
    pub rows: usize,
    /// Number of interior columns
    pub cols: usize,
    /// Number of generations to compute
    pub generations: u64,
    /// Which scheduler advances the grid
    pub strategy: Strategy,
    /// Worker threads for [Strategy::BarrierThreaded] or peers for
    /// [Strategy::DistributedHybrid]
    pub workers: NonZeroUsize,
    /// Size of the thread pool of every peer of [Strategy::DistributedHybrid]
    pub threads_per_peer: NonZeroUsize,
    /// Seeds the initial grid and the random visiting orders
    pub rng_seed: u64,
    /// Visiting order of [Strategy::RandomFullSweep]
    #[serde(default)]
    pub sampling: SweepSampling,
    /// Print a debug snapshot every this many generations
    pub snapshot_interval: Option<NonZeroU64>,
    /// Include the ghost border in debug snapshots
    pub snapshot_border: bool,
    /// Determines if progress bar should be shown during execution
    pub show_progressbar: bool,
}

impl Settings {
    /// Settings with a single worker, seed `0` and neither snapshots nor progress bar.
    pub fn new(rows: usize, cols: usize, generations: u64, strategy: Strategy) -> Self {
        Settings {
            rows,
            cols,
            generations,
            strategy,
            workers: NonZeroUsize::MIN,
            threads_per_peer: NonZeroUsize::MIN,
            rng_seed: 0,
            sampling: SweepSampling::default(),
            snapshot_interval: None,
            snapshot_border: false,
            show_progressbar: false,
        }
    }

    /// Performs all checks which can be done before the simulation starts.
    pub fn validate(&self) -> Result<(), SimulationError> {
        match self.strategy {
            Strategy::BarrierThreaded => {
                partition_interior_rows(self.rows, self.workers)?;
            }
            Strategy::DistributedHybrid => {
                partition_global_rows(self.rows, self.workers)?;
            }
            _ => (),
        }
        Ok(())
    }

    /// Allocates the grid and fills its interior from [Settings::rng_seed].
    pub fn initial_grid(&self) -> Grid {
        let mut grid = Grid::new(self.rows, self.cols);
        grid.randomize_interior(self.rng_seed);
        grid
    }

    /// Counter over [Settings::generations] with the configured snapshot interval.
    pub fn counter(&self) -> GenerationCounter {
        GenerationCounter::new(self.generations, self.snapshot_interval)
    }

    /// Prints snapshots to standard output and shows the progress bar if configured.
    pub fn monitor(&self) -> Result<Monitor, SimulationError> {
        let mut monitor = Monitor::new();
        if self.snapshot_interval.is_some() {
            let out: Box<dyn std::io::Write + Send> = Box::new(std::io::stdout());
            monitor = monitor.with_snapshots(out, self.snapshot_border);
        }
        if self.show_progressbar {
            monitor = monitor.with_progressbar(&self.counter())?;
        }
        Ok(monitor)
    }
}

/// Converts signed command-line dimensions.
///
/// ```
/// # use cellular_dune_core::backend::parse_dimensions;
/// assert_eq!(parse_dimensions(3, 4).unwrap(), (3, 4));
/// assert!(parse_dimensions(-1, 4).is_err());
/// ```
pub fn parse_dimensions(rows: i64, cols: i64) -> Result<(usize, usize), ConfigError> {
    match (usize::try_from(rows), usize::try_from(cols)) {
        (Ok(rows), Ok(cols)) => Ok((rows, cols)),
        _ => Err(ConfigError(
            "please enter a positive number for rows and cols.".to_owned(),
        )),
    }
}

/// Converts a signed command-line thread or process count.
pub fn parse_count(count: i64) -> Result<NonZeroUsize, ConfigError> {
    usize::try_from(count)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            ConfigError(format!(
                "please enter a positive number of threads or processes, got {count}"
            ))
        })
}

/// Runs the simulation described by `settings` on `grid`.
///
/// Returns the finished [GenerationCounter].
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(strategy = ?settings.strategy)))]
pub fn run_on_grid(
    settings: &Settings,
    grid: &mut Grid,
    observer: &mut dyn GenerationObserver,
) -> Result<GenerationCounter, SimulationError> {
    settings.validate()?;
    if grid.rows() != settings.rows || grid.cols() != settings.cols {
        return Err(ConfigError(format!(
            "grid of size {}x{} does not match the configured size {}x{}",
            grid.rows(),
            grid.cols(),
            settings.rows,
            settings.cols
        ))
        .into());
    }
    let mut scheduler = settings.strategy.build(settings);
    #[cfg(feature = "tracing")]
    tracing::info!(
        "running {} generations of the {} scheduler",
        settings.generations,
        scheduler.description()
    );
    scheduler.run(grid, settings.counter(), observer)
}

/// Initializes the grid from `settings`, runs all generations and returns the final grid.
///
/// Snapshots are printed to standard output.
/// ```
/// # use cellular_dune_core::backend::{run_simulation, Settings, Strategy};
/// let mut settings = Settings::new(8, 8, 5, Strategy::BarrierThreaded);
/// settings.workers = 2.try_into().unwrap();
/// settings.rng_seed = 4;
/// let threaded = run_simulation(&settings).unwrap();
///
/// settings.strategy = Strategy::SynchronousSweep;
/// let serial = run_simulation(&settings).unwrap();
/// assert_eq!(threaded, serial);
/// ```
pub fn run_simulation(settings: &Settings) -> Result<Grid, SimulationError> {
    settings.validate()?;
    let mut grid = settings.initial_grid();
    let mut monitor = settings.monitor()?;
    run_on_grid(settings, &mut grid, &mut monitor)?;
    Ok(grid)
}

#[cfg(test)]
mod test_setup {
    use super::*;

    #[test]
    fn validation_per_strategy() {
        let mut settings = Settings::new(10, 5, 1, Strategy::BarrierThreaded);
        settings.workers = 3.try_into().unwrap();
        assert!(matches!(
            settings.validate(),
            Err(SimulationError::PartitionError(_))
        ));
        settings.workers = 5.try_into().unwrap();
        assert!(settings.validate().is_ok());

        // 12 stored rows can be split into 3 or 4 bands
        settings.strategy = Strategy::DistributedHybrid;
        assert!(settings.validate().is_err());
        settings.workers = 4.try_into().unwrap();
        assert!(settings.validate().is_ok());

        // Sequential strategies ignore the worker count
        settings.workers = 7.try_into().unwrap();
        settings.strategy = Strategy::RandomFullSweep;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn negative_dimensions() {
        let error = parse_dimensions(5, -2).unwrap_err();
        assert_eq!(
            error.to_string(),
            "please enter a positive number for rows and cols."
        );
        assert_eq!(parse_dimensions(0, 0), Ok((0, 0)));
    }

    #[test]
    fn counts_must_be_positive() {
        assert!(parse_count(0).is_err());
        assert!(parse_count(-4).is_err());
        assert_eq!(parse_count(4), Ok(4.try_into().unwrap()));
    }

    #[test]
    fn mismatching_grid_is_rejected() {
        let settings = Settings::new(4, 4, 1, Strategy::SynchronousSweep);
        let mut grid = Grid::new(4, 5);
        let result = run_on_grid(&settings, &mut grid, &mut ());
        assert!(matches!(result, Err(SimulationError::ConfigError(_))));
    }

    #[test]
    fn every_strategy_runs() -> Result<(), Box<dyn std::error::Error>> {
        for strategy in [
            Strategy::SynchronousSweep,
            Strategy::RandomIndependent,
            Strategy::RandomFullSweep,
            Strategy::BarrierThreaded,
            Strategy::DistributedHybrid,
        ] {
            let mut settings = Settings::new(6, 7, 3, strategy);
            settings.workers = 2.try_into()?;
            settings.rng_seed = 12;
            let grid = run_simulation(&settings)?;
            assert!(grid.border_intact(), "{strategy:?}");
            assert_eq!((grid.rows(), grid.cols()), (6, 7));
        }
        Ok(())
    }

    #[test]
    fn descriptions_name_the_update_semantics() {
        let descriptions: Vec<_> = [
            Strategy::SynchronousSweep,
            Strategy::RandomIndependent,
            Strategy::RandomFullSweep,
            Strategy::BarrierThreaded,
            Strategy::DistributedHybrid,
        ]
        .iter()
        .map(|strategy| strategy.build(&Settings::new(2, 2, 1, *strategy)).description())
        .collect();
        assert_eq!(
            descriptions,
            vec![
                "synchronous serial",
                "asynchronous random independent",
                "asynchronous random order",
                "synchronous threaded",
                "synchronous distributed hybrid",
            ]
        );
    }

    #[test]
    fn settings_are_serializable() {
        fn assert_serde<T: Serialize + for<'a> Deserialize<'a>>() {}
        assert_serde::<Settings>();
        assert_serde::<Strategy>();
    }
}

use std::process::ExitCode;
use std::time::Instant;

use cellular_dune::prelude::*;
use clap::{Args, Parser, Subcommand};

#[derive(Args, Debug)]
struct GridArgs {
    /// Number of interior rows
    #[arg(allow_negative_numbers = true)]
    rows: i64,

    /// Number of interior columns
    #[arg(allow_negative_numbers = true)]
    cols: i64,

    /// Number of generations (single cell updates for random-independent)
    #[arg(default_value_t = 50)]
    timesteps: u64,
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    /// Serial double-buffered sweep
    Sync {
        #[command(flatten)]
        grid: GridArgs,
    },
    /// Update one randomly chosen cell in place per timestep
    RandomIndependent {
        #[command(flatten)]
        grid: GridArgs,
    },
    /// Visit every cell once per generation in random order and update it in place
    RandomSweep {
        #[command(flatten)]
        grid: GridArgs,

        /// Draw random cells and skip visited ones instead of shuffling all coordinates
        #[arg(long, default_value_t = false)]
        reject_and_retry: bool,
    },
    /// Synchronous sweep on a fixed set of barrier synchronized threads
    Threads {
        #[command(flatten)]
        grid: GridArgs,

        /// Number of worker threads, has to divide rows
        #[arg(default_value_t = 1, allow_negative_numbers = true)]
        count: i64,
    },
    /// Synchronous sweep over communicating peers with a thread pool each
    Hybrid {
        #[command(flatten)]
        grid: GridArgs,

        /// Number of peers, has to divide rows + 2
        #[arg(default_value_t = 1, allow_negative_numbers = true)]
        count: i64,

        /// Threads used by every peer
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        threads_per_peer: i64,
    },
}

/// Run the sand dune cellular automaton with one of its update schedulers
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CLIArgs {
    #[command(subcommand)]
    command: SubCommand,

    /// Seed of the initial grid and of the random visiting orders; drawn at random if omitted
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Print the grid periodically
    #[arg(long, default_value_t = false, global = true)]
    debug: bool,

    /// Generations between two debug prints
    #[arg(long, default_value_t = 10, global = true)]
    debug_interval: u64,

    /// Include the ghost border in debug prints
    #[arg(long, default_value_t = false, global = true)]
    full_border: bool,

    /// Show a progress bar
    #[arg(long, default_value_t = false, global = true)]
    progress: bool,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

impl CLIArgs {
    fn grid(&self) -> &GridArgs {
        match &self.command {
            SubCommand::Sync { grid }
            | SubCommand::RandomIndependent { grid }
            | SubCommand::RandomSweep { grid, .. }
            | SubCommand::Threads { grid, .. }
            | SubCommand::Hybrid { grid, .. } => grid,
        }
    }

    fn settings(&self) -> Result<Settings, SimulationError> {
        let grid = self.grid();
        let (rows, cols) = parse_dimensions(grid.rows, grid.cols)?;
        let strategy = match &self.command {
            SubCommand::Sync { .. } => Strategy::SynchronousSweep,
            SubCommand::RandomIndependent { .. } => Strategy::RandomIndependent,
            SubCommand::RandomSweep { .. } => Strategy::RandomFullSweep,
            SubCommand::Threads { .. } => Strategy::BarrierThreaded,
            SubCommand::Hybrid { .. } => Strategy::DistributedHybrid,
        };
        let mut settings = Settings::new(rows, cols, grid.timesteps, strategy);
        settings.rng_seed = self.seed.unwrap_or_else(rand::random);
        settings.snapshot_border = self.full_border;
        settings.show_progressbar = self.progress;
        if self.debug {
            let interval = std::num::NonZeroU64::new(self.debug_interval)
                .ok_or_else(|| ConfigError("the debug interval has to be positive".to_owned()))?;
            settings.snapshot_interval = Some(interval);
        }
        match &self.command {
            SubCommand::RandomSweep {
                reject_and_retry: true,
                ..
            } => settings.sampling = SweepSampling::RejectAndRetry,
            SubCommand::Threads { count, .. } => settings.workers = parse_count(*count)?,
            SubCommand::Hybrid {
                count,
                threads_per_peer,
                ..
            } => {
                settings.workers = parse_count(*count)?;
                settings.threads_per_peer = parse_count(*threads_per_peer)?;
            }
            _ => (),
        }
        Ok(settings)
    }
}

#[cfg(feature = "tracing")]
fn init_logging(verbosity: u8) {
    use tracing_subscriber::{filter, prelude::*};

    let level = match verbosity {
        0 => filter::LevelFilter::INFO,
        1 => filter::LevelFilter::DEBUG,
        _ => filter::LevelFilter::TRACE,
    };
    // Snapshots go to stdout, so logs are written to stderr
    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_line_number(true)
        .with_level(true);
    tracing_subscriber::registry()
        .with(stderr_log.with_filter(level))
        .init();
}

fn run(settings: &Settings) -> Result<(), SimulationError> {
    settings.validate()?;
    #[cfg(feature = "tracing")]
    tracing::info!(seed = settings.rng_seed, "initializing grid");
    let mut grid = settings.initial_grid();
    #[cfg(feature = "tracing")]
    tracing::info!(population = grid.population(), "initial population");

    let mut scheduler = settings.strategy.build(settings);
    let mut monitor = settings.monitor()?;
    let start = Instant::now();
    scheduler.run(&mut grid, settings.counter(), &mut monitor)?;
    let elapsed = start.elapsed();

    println!(
        "time for {} program: {:4.4}s",
        scheduler.description(),
        elapsed.as_secs_f64()
    );
    #[cfg(feature = "tracing")]
    tracing::info!(population = grid.population(), "final population");
    Ok(())
}

fn main() -> ExitCode {
    let args = CLIArgs::parse();
    #[cfg(feature = "tracing")]
    init_logging(args.verbose);

    let result = args.settings().and_then(|settings| {
        run(&settings).inspect_err(|error| {
            if let (SimulationError::PartitionError(_), Strategy::DistributedHybrid) =
                (error, settings.strategy)
            {
                println!(
                    "The number of rows plus the two border rows is split between all \
                    processes. For a power of two number of processes choose rows = 2^k - 2."
                );
            }
        })
    });
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            println!("ERROR: {error}");
            ExitCode::FAILURE
        }
    }
}

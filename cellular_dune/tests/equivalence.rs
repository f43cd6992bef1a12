use cellular_dune::prelude::*;
use rand::SeedableRng;

fn random_grid(rows: usize, cols: usize, seed: u64) -> Grid {
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    let mut grid = Grid::new(rows, cols);
    grid.randomize_interior_with(&mut rng);
    grid
}

fn advance_with(
    scheduler: &mut dyn UpdateScheduler,
    mut grid: Grid,
    generations: u64,
) -> Result<Grid, SimulationError> {
    scheduler.run(&mut grid, GenerationCounter::new(generations, None), &mut ())?;
    Ok(grid)
}

#[test]
fn synchronous_sweep_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
    let initial = random_grid(24, 31, 0);
    let results = (0..5)
        .map(|_| advance_with(&mut SynchronousSweep::default(), initial.clone(), 40))
        .collect::<Result<Vec<_>, _>>()?;
    for result in results.iter() {
        assert_eq!(result, &results[0]);
    }
    Ok(())
}

#[test]
fn single_thread_equals_serial() -> Result<(), Box<dyn std::error::Error>> {
    let initial = random_grid(17, 23, 1);
    let serial = advance_with(&mut SynchronousSweep::default(), initial.clone(), 30)?;
    let threaded = advance_with(
        &mut BarrierThreaded::new(std::num::NonZeroUsize::MIN),
        initial,
        30,
    )?;
    assert_eq!(serial, threaded);
    Ok(())
}

#[test]
fn threads_equal_serial_for_all_divisors() -> Result<(), Box<dyn std::error::Error>> {
    let initial = random_grid(24, 16, 2);
    let serial = advance_with(&mut SynchronousSweep::default(), initial.clone(), 20)?;
    for n_threads in [2usize, 3, 4, 6, 8, 12, 24] {
        let threaded = advance_with(
            &mut BarrierThreaded::new(n_threads.try_into()?),
            initial.clone(),
            20,
        )?;
        assert_eq!(serial, threaded, "n_threads={n_threads}");
    }
    Ok(())
}

#[test]
fn hybrid_equals_serial() -> Result<(), Box<dyn std::error::Error>> {
    // rows = 2^k - 2 splits evenly between any power of two number of peers
    let initial = random_grid(30, 20, 3);
    let serial = advance_with(&mut SynchronousSweep::default(), initial.clone(), 20)?;
    for (n_peers, threads_per_peer) in [(1usize, 4usize), (2, 2), (4, 1), (8, 2), (16, 1)] {
        let hybrid = advance_with(
            &mut DistributedHybrid::new(n_peers.try_into()?, threads_per_peer.try_into()?),
            initial.clone(),
            20,
        )?;
        assert_eq!(serial, hybrid, "n_peers={n_peers} threads={threads_per_peer}");
    }
    Ok(())
}

#[test]
fn run_simulation_agrees_across_synchronous_strategies() -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::new(14, 9, 12, Strategy::SynchronousSweep);
    settings.rng_seed = 77;
    let serial = run_simulation(&settings)?;

    settings.strategy = Strategy::BarrierThreaded;
    settings.workers = 7.try_into()?;
    assert_eq!(run_simulation(&settings)?, serial);

    settings.strategy = Strategy::DistributedHybrid;
    settings.workers = 4.try_into()?;
    settings.threads_per_peer = 3.try_into()?;
    assert_eq!(run_simulation(&settings)?, serial);
    Ok(())
}

#[test]
fn randomized_strategies_are_reproducible() -> Result<(), Box<dyn std::error::Error>> {
    for strategy in [Strategy::RandomIndependent, Strategy::RandomFullSweep] {
        let mut settings = Settings::new(11, 13, 25, strategy);
        settings.rng_seed = 5;
        assert_eq!(run_simulation(&settings)?, run_simulation(&settings)?);
    }
    Ok(())
}

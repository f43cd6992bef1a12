use cellular_dune::prelude::*;

/// Fails as soon as the ghost border was modified.
struct BorderGuard {
    observed: u64,
}

impl GenerationObserver for BorderGuard {
    fn observe(&mut self, done: &CompletedGeneration, grid: &Grid) -> Result<(), SimulationError> {
        if !grid.border_intact() {
            return Err(ConfigError(format!("border changed in generation {}", done.index)).into());
        }
        self.observed += 1;
        Ok(())
    }
}

fn schedulers() -> Vec<Box<dyn UpdateScheduler>> {
    vec![
        Box::new(SynchronousSweep::default()),
        Box::new(RandomIndependent::from_seed(1)),
        Box::new(RandomFullSweep::from_seed(1)),
        Box::new(RandomFullSweep::new(
            ThresholdRule::default(),
            1,
            SweepSampling::RejectAndRetry,
        )),
        Box::new(BarrierThreaded::new(3.try_into().unwrap())),
        Box::new(DistributedHybrid::new(4.try_into().unwrap(), 2.try_into().unwrap())),
    ]
}

#[test]
fn border_is_invariant_for_every_scheduler() -> Result<(), Box<dyn std::error::Error>> {
    for mut scheduler in schedulers() {
        let mut grid = Grid::new(18, 11);
        grid.randomize_interior(8);
        let mut guard = BorderGuard { observed: 0 };
        let counter = scheduler.run(&mut grid, GenerationCounter::new(15, None), &mut guard)?;
        assert_eq!(guard.observed, 15, "{}", scheduler.description());
        assert_eq!(counter.completed(), 15);
        assert!(grid.border_intact());
    }
    Ok(())
}

#[test]
fn interior_stays_binary() -> Result<(), Box<dyn std::error::Error>> {
    for mut scheduler in schedulers() {
        let mut grid = Grid::new(6, 10);
        grid.randomize_interior(9);
        scheduler.run(&mut grid, GenerationCounter::new(10, None), &mut ())?;
        assert!(grid.as_slice().iter().all(|&c| c == DEAD || c == ALIVE));
    }
    Ok(())
}

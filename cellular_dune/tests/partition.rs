use cellular_dune::prelude::*;

#[test]
fn threads_reject_uneven_rows() {
    for (rows, n_threads) in [(10usize, 3usize), (7, 2), (5, 4)] {
        let mut grid = Grid::new(rows, 4);
        let result = BarrierThreaded::new(n_threads.try_into().unwrap()).run(
            &mut grid,
            GenerationCounter::new(3, None),
            &mut (),
        );
        assert!(
            matches!(result, Err(SimulationError::PartitionError(_))),
            "rows={rows} n_threads={n_threads}"
        );
    }
}

#[test]
fn hybrid_rejects_uneven_rows() {
    // rows + 2 has to be divisible, rows alone is not enough
    for (rows, n_peers) in [(8usize, 4usize), (6, 3), (4, 4)] {
        let mut grid = Grid::new(rows, 4);
        let result = DistributedHybrid::new(n_peers.try_into().unwrap(), 1.try_into().unwrap())
            .run(&mut grid, GenerationCounter::new(3, None), &mut ());
        assert!(
            matches!(result, Err(SimulationError::PartitionError(_))),
            "rows={rows} n_peers={n_peers}"
        );
    }
}

#[test]
fn settings_validation_happens_before_running() {
    let mut settings = Settings::new(9, 9, 1_000_000, Strategy::BarrierThreaded);
    settings.workers = 2.try_into().unwrap();
    assert!(matches!(
        run_simulation(&settings),
        Err(SimulationError::PartitionError(_))
    ));

    settings.strategy = Strategy::DistributedHybrid;
    settings.workers = 4.try_into().unwrap();
    assert!(run_simulation(&settings).is_err());
}

#[test]
fn bands_are_contiguous_and_disjoint() -> Result<(), Box<dyn std::error::Error>> {
    let bands = partition_interior_rows(30, 5.try_into()?)?;
    for (band, next) in bands.iter().zip(bands.iter().skip(1)) {
        assert_eq!(band.rows.end, next.rows.start);
        assert_eq!(band.len(), next.len());
    }
    let bands = partition_global_rows(30, 8.try_into()?)?;
    assert_eq!(bands.first().map(|b| b.rows.start), Some(0));
    assert_eq!(bands.last().map(|b| b.rows.end), Some(32));
    Ok(())
}

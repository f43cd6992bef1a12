use cellular_dune::prelude::*;
use itertools::iproduct;

fn check_sweep(sampling: SweepSampling) -> Result<(), Box<dyn std::error::Error>> {
    let (rows, cols) = (13, 8);
    let mut grid = Grid::new(rows, cols);
    grid.randomize_interior(21);
    let mut scheduler = RandomFullSweep::new(ThresholdRule::default(), 21, sampling);
    for _ in 0..10 {
        scheduler.advance(&mut grid)?;
        let mut order = scheduler.last_order().to_vec();
        order.sort();
        let expected: Vec<_> = iproduct!(1..=rows, 1..=cols).collect();
        assert_eq!(order, expected);
        assert_eq!(scheduler.visited().len(), rows * cols);
    }
    Ok(())
}

#[test]
fn shuffled_sweep_visits_each_cell_once() -> Result<(), Box<dyn std::error::Error>> {
    check_sweep(SweepSampling::ShuffledPermutation)
}

#[test]
fn rejecting_sweep_visits_each_cell_once() -> Result<(), Box<dyn std::error::Error>> {
    check_sweep(SweepSampling::RejectAndRetry)
}

#[test]
fn independent_counts_single_updates() -> Result<(), Box<dyn std::error::Error>> {
    let mut grid = Grid::new(20, 20);
    grid.randomize_interior(2);
    let before = grid.clone();
    RandomIndependent::from_seed(2).run(&mut grid, GenerationCounter::new(5, None), &mut ())?;
    let n_changed = before
        .as_slice()
        .iter()
        .zip(grid.as_slice())
        .filter(|(a, b)| a != b)
        .count();
    assert!(n_changed <= 5);
    Ok(())
}

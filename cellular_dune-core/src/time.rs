//! Controls how generations are counted and when snapshots are due

use core::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use cellular_dune_concepts::TimeError;

/// A [GenerationEvent] describes that a certain action is to be executed after the generation
/// which was just completed.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum GenerationEvent {
    /// Print a debug snapshot of the grid.
    Snapshot,
}

/// Returned by [GenerationCounter::complete] for every finished update cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedGeneration {
    /// Zero-based index of the generation which was just completed
    pub index: u64,
    /// Event at this generation, or None
    pub event: Option<GenerationEvent>,
}

/// Monotonic generation counter with a fixed upper bound.
///
/// The counter starts at zero and is incremented once per completed update cycle.
/// The simulation terminates when it reaches `total`; there is no early exit.
/// ```
/// # use cellular_dune_core::time::{GenerationCounter, GenerationEvent};
/// let mut counter = GenerationCounter::new(25, Some(10.try_into().unwrap()));
/// let mut snapshots = vec![];
/// while !counter.is_finished() {
///     let done = counter.complete();
///     if done.event == Some(GenerationEvent::Snapshot) {
///         snapshots.push(done.index);
///     }
/// }
/// assert_eq!(snapshots, vec![0, 10, 20]);
/// assert_eq!(counter.completed(), 25);
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct GenerationCounter {
    completed: u64,
    total: u64,
    snapshot_interval: Option<NonZeroU64>,
}

impl GenerationCounter {
    /// Counts up to `total` generations and schedules a snapshot every `snapshot_interval`
    /// generations if given.
    pub fn new(total: u64, snapshot_interval: Option<NonZeroU64>) -> Self {
        Self {
            completed: 0,
            total,
            snapshot_interval,
        }
    }

    /// Number of generations completed so far
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Configured number of generations
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Generations which are still to be done
    pub fn remaining(&self) -> u64 {
        self.total - self.completed
    }

    /// Returns true once `total` generations have been completed.
    pub fn is_finished(&self) -> bool {
        self.completed >= self.total
    }

    /// Marks the current generation as completed.
    ///
    /// Returns the index of the completed generation and whether a snapshot is due.
    pub fn complete(&mut self) -> CompletedGeneration {
        let index = self.completed;
        self.completed += 1;
        let event = self
            .snapshot_interval
            .filter(|interval| index % interval.get() == 0)
            .map(|_| GenerationEvent::Snapshot);
        CompletedGeneration { index, event }
    }

    /// Creates a bar that tracks the simulation progress
    ///
    /// ```
    /// # use cellular_dune_core::time::GenerationCounter;
    /// let counter = GenerationCounter::new(40, None);
    /// let bar = counter.initialize_bar().unwrap();
    /// assert_eq!(bar.total, 40);
    /// ```
    pub fn initialize_bar(&self) -> Result<kdam::Bar, TimeError> {
        let bar_format = "\
        {desc}{percentage:3.0}%|{animation}| \
        {count}/{total} \
        [{elapsed}, \
        {rate:.2}{unit}/s{postfix}]";
        Ok(kdam::BarBuilder::default()
            .total(self.total as usize)
            .bar_format(bar_format)
            .dynamic_ncols(true)
            .build()?)
    }
}

#[cfg(test)]
mod test_generation_counter {
    use super::*;

    #[test]
    fn initialization() {
        let counter = GenerationCounter::new(7, None);
        assert_eq!(counter.completed(), 0);
        assert_eq!(counter.total(), 7);
        assert_eq!(counter.remaining(), 7);
        assert!(!counter.is_finished());
    }

    #[test]
    fn zero_generations_finish_immediately() {
        let counter = GenerationCounter::new(0, Some(NonZeroU64::MIN));
        assert!(counter.is_finished());
    }

    #[test]
    fn no_events_without_interval() {
        let mut counter = GenerationCounter::new(30, None);
        let events = std::iter::from_fn(|| match counter.is_finished() {
            true => None,
            false => Some(counter.complete()),
        })
        .filter_map(|done| done.event)
        .count();
        assert_eq!(events, 0);
    }

    #[test]
    fn bar_is_sized_to_total() -> Result<(), Box<dyn std::error::Error>> {
        for total in [0, 1, 250] {
            let counter = GenerationCounter::new(total, NonZeroU64::new(10));
            let bar = counter.initialize_bar()?;
            assert_eq!(bar.total as u64, counter.total());
        }
        Ok(())
    }

    #[test]
    fn indices_are_monotonic() {
        let mut counter = GenerationCounter::new(12, NonZeroU64::new(1));
        for i in 0..12 {
            let done = counter.complete();
            assert_eq!(done.index, i);
            assert_eq!(done.event, Some(GenerationEvent::Snapshot));
            assert_eq!(counter.completed(), i + 1);
        }
        assert!(counter.is_finished());
    }
}

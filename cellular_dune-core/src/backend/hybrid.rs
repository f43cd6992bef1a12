use core::num::NonZeroUsize;

use cellular_dune_concepts::{
    CellState, CollectiveError, Grid, SyncPrimitiveError, ThresholdRule, TransitionRule,
};
use rayon::prelude::*;

use super::errors::SimulationError;
use super::partition::{partition_global_rows, sweep_row, RowBand};
use super::scheduler::{catch_panic, GenerationObserver, UpdateScheduler};
use super::sync::{BuildGroup, ChannelCollective, Collective};
use crate::time::GenerationCounter;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Domain-decomposed synchronous sweep over a set of peers with a thread pool each.
///
/// All stored rows of the grid, including both border rows, are split into equal bands, one per
/// peer; this requires `rows + 2` to be divisible by the number of peers.
/// Peer `0` scatters the initial grid.
/// Afterwards every peer holds a full copy of the current generation which it uses to look up
/// the neighbors at its band boundaries.
///
/// Every generation
/// 1. each peer computes the interior rows of its band with a fork-join over its own
///    [rayon::ThreadPool],
/// 2. all peers meet at a barrier and exchange their bands with an all-gather,
/// 3. peer `0` notifies the [GenerationObserver],
/// 4. all peers meet at a second barrier.
///
/// Peers are threads of the current process which only communicate through their
/// [ChannelCollective] endpoints.
///
/// ```
/// # use cellular_dune_concepts::Grid;
/// # use cellular_dune_core::backend::{DistributedHybrid, SynchronousSweep, UpdateScheduler};
/// let mut grid = Grid::new(6, 6);
/// grid.randomize_interior(0);
/// let mut reference = grid.clone();
///
/// let mut hybrid = DistributedHybrid::new(4.try_into().unwrap(), 2.try_into().unwrap());
/// hybrid.advance(&mut grid).unwrap();
/// SynchronousSweep::default().advance(&mut reference).unwrap();
/// assert_eq!(grid, reference);
/// ```
#[derive(Clone, Debug)]
pub struct DistributedHybrid<R = ThresholdRule> {
    rule: R,
    n_peers: NonZeroUsize,
    threads_per_peer: NonZeroUsize,
}

impl DistributedHybrid {
    /// Runs the default rule on `n_peers` peers with `threads_per_peer` threads each.
    pub fn new(n_peers: NonZeroUsize, threads_per_peer: NonZeroUsize) -> Self {
        Self::with_rule(ThresholdRule::default(), n_peers, threads_per_peer)
    }
}

impl<R: TransitionRule> DistributedHybrid<R> {
    /// Runs `rule` on `n_peers` peers with `threads_per_peer` threads each.
    pub fn with_rule(rule: R, n_peers: NonZeroUsize, threads_per_peer: NonZeroUsize) -> Self {
        DistributedHybrid {
            rule,
            n_peers,
            threads_per_peer,
        }
    }

    /// Number of peers
    pub fn n_peers(&self) -> NonZeroUsize {
        self.n_peers
    }
}

/// Duties of peer `0` besides its own band.
struct Root<'a> {
    initial: &'a [CellState],
    counter: GenerationCounter,
    observer: &'a mut dyn GenerationObserver,
}

/// Everything a single peer needs to take part in a run.
struct Peer<'a, R, C> {
    rule: &'a R,
    comm: C,
    band: RowBand,
    rows: usize,
    cols: usize,
    n_generations: u64,
    pool: rayon::ThreadPool,
}

/// What a peer hands back after the last generation.
enum PeerOutcome {
    /// Peer `0` returns the final grid
    Root(Grid, GenerationCounter),
    /// All other peers only report that they finished
    Done,
    /// The peer failed while computing its band or notifying the observer
    Failed(SimulationError),
}

const HEALTHY: CellState = 0;
const STOPPING: CellState = 1;

impl<R: TransitionRule, C: Collective> Peer<'_, R, C> {
    fn run(mut self, mut root: Option<Root<'_>>) -> Result<PeerOutcome, SimulationError> {
        let rank = self.comm.rank();
        let stride = self.cols + 2;

        let mut local = self
            .comm
            .scatter(0, root.as_ref().map(|root| root.initial))?;
        if local.len() != self.band.len() * stride {
            return Err(CollectiveError(format!(
                "peer {rank} received {} values but its band holds {}",
                local.len(),
                self.band.len() * stride
            ))
            .into());
        }
        let mut view = Grid::from_stored(self.rows, self.cols, self.comm.all_gather(&local)?)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(rank, rows = ?self.band.rows, "peer starts");

        let interior = self.band.interior(self.rows);
        let offset = (interior.start - self.band.rows.start) * stride;
        let mut failure = None;
        for _ in 0..self.n_generations {
            let mut status = HEALTHY;
            let out = &mut local[offset..offset + interior.len() * stride];
            let (rule, pool) = (self.rule, &self.pool);
            let computed = catch_panic("peer", || {
                pool.install(|| {
                    out.par_chunks_mut(stride)
                        .enumerate()
                        .for_each(|(i, out_row)| {
                            sweep_row(rule, &view, interior.start + i, out_row)
                        })
                });
                Ok(())
            });
            if let Err(error) = computed {
                #[cfg(feature = "tracing")]
                tracing::error!(rank, "peer failed, stopping simulation: {error}");
                failure = Some(error);
                status = STOPPING;
            }
            self.comm.barrier();

            let gathered = self.comm.all_gather(&local)?;
            view = Grid::from_stored(self.rows, self.cols, gathered)?;
            #[cfg(feature = "tracing")]
            tracing::trace!(rank, "exchanged bands");

            if let Some(root) = root.as_mut().filter(|_| failure.is_none()) {
                let done = root.counter.complete();
                let observed = catch_panic("observer", || root.observer.observe(&done, &view));
                if let Err(error) = observed {
                    #[cfg(feature = "tracing")]
                    tracing::error!("observer failed, stopping simulation: {error}");
                    failure = Some(error);
                    status = STOPPING;
                }
            }
            let statuses = self.comm.all_gather(&[status])?;
            self.comm.barrier();

            // Check if we are stopping the simulation now
            if statuses.contains(&STOPPING) {
                break;
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(rank, "peer finished");

        Ok(match (failure, root) {
            (Some(error), _) => PeerOutcome::Failed(error),
            (None, Some(root)) => PeerOutcome::Root(view, root.counter),
            (None, None) => PeerOutcome::Done,
        })
    }
}

impl<R: TransitionRule> UpdateScheduler for DistributedHybrid<R> {
    fn description(&self) -> &'static str {
        "synchronous distributed hybrid"
    }

    fn advance(&mut self, grid: &mut Grid) -> Result<(), SimulationError> {
        self.run(grid, GenerationCounter::new(1, None), &mut ())?;
        Ok(())
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(skip_all, fields(
            n_peers = self.n_peers.get(),
            threads_per_peer = self.threads_per_peer.get()
        ))
    )]
    fn run(
        &mut self,
        grid: &mut Grid,
        counter: GenerationCounter,
        observer: &mut dyn GenerationObserver,
    ) -> Result<GenerationCounter, SimulationError> {
        let (rows, cols) = (grid.rows(), grid.cols());
        let bands = partition_global_rows(rows, self.n_peers)?;
        let n_generations = counter.remaining();
        let comms = ChannelCollective::build_group(self.n_peers);
        let threads_per_peer = self.threads_per_peer.get();
        let pools = (0..self.n_peers.get())
            .map(|rank| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads_per_peer)
                    .thread_name(move |i| format!("peer_{:03.0}_thread_{:03.0}", rank, i))
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut root = Some(Root {
            initial: grid.as_slice(),
            counter,
            observer,
        });
        let (start_sender, start_receiver) = crossbeam_channel::unbounded();

        let outcomes = std::thread::scope(|s| -> Result<Vec<_>, SimulationError> {
            let mut handles = Vec::with_capacity(bands.len());
            let mut spawn_error = None;
            for ((comm, band), pool) in comms.into_iter().zip(bands).zip(pools) {
                let rank = comm.rank();
                if band.owner != rank {
                    spawn_error = Some(SyncPrimitiveError(format!(
                        "band of peer {} was handed to rank {rank}",
                        band.owner
                    )));
                    break;
                }
                let peer = Peer {
                    rule: &self.rule,
                    comm,
                    band,
                    rows,
                    cols,
                    n_generations,
                    pool,
                };
                let root = match rank {
                    0 => root.take(),
                    _ => None,
                };
                let start = start_receiver.clone();
                let spawned = std::thread::Builder::new()
                    .name(format!("peer_{:03.0}", rank))
                    .spawn_scoped(s, move || match start.recv() {
                        Ok(true) => peer.run(root).map(Some),
                        _ => Ok(None),
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(error) => {
                        spawn_error = Some(SyncPrimitiveError(format!(
                            "could not spawn peer {rank}: {error}"
                        )));
                        break;
                    }
                }
            }

            // This starts all peers simultaneously
            let go = spawn_error.is_none();
            for _ in 0..handles.len() {
                start_sender.send(go)?;
            }

            let mut outcomes = Vec::with_capacity(handles.len());
            for handle in handles.into_iter() {
                let outcome = handle
                    .join()
                    .map_err(|_| SyncPrimitiveError("a peer thread panicked".to_owned()))??;
                outcomes.extend(outcome);
            }
            match spawn_error {
                Some(error) => Err(error.into()),
                None => Ok(outcomes),
            }
        })?;

        let mut finished = None;
        for outcome in outcomes.into_iter() {
            match outcome {
                PeerOutcome::Failed(error) => return Err(error),
                PeerOutcome::Root(view, counter) => finished = Some((view, counter)),
                PeerOutcome::Done => (),
            }
        }
        let (view, counter) = finished.ok_or_else(|| {
            SimulationError::from(CollectiveError("peer 0 did not report back".to_owned()))
        })?;
        *grid = view;
        Ok(counter)
    }
}

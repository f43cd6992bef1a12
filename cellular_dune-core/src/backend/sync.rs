use core::num::NonZeroUsize;
use std::collections::BTreeMap;

use cellular_dune_concepts::{CellState, CollectiveError};

use super::errors::SimulationError;

/// Construct a fully connected group of members which can be handed to individual threads.
///
/// Every member of the group is identified by its rank `0..n_members`.
/// The returned vector is ordered by rank.
pub trait BuildGroup
where
    Self: Sized,
{
    /// Builds all members of the group.
    fn build_group(n_members: NonZeroUsize) -> Vec<Self>;
}

/// Responsible for syncing workers between different threads.
pub trait SyncWorkers {
    /// Function which forces all members of a group to wait for each other.
    fn sync(&mut self);
}

/// Group-wide barrier.
///
/// This very simple implementation uses the [hurdles::Barrier] struct which should
/// in theory perform faster than the [std::sync::Barrier] struct from the standard library.
/// ```
/// # use cellular_dune_core::backend::{BarrierSync, BuildGroup, SyncWorkers};
/// let mut syncers = BarrierSync::build_group(2.try_into().unwrap());
/// let mut syncer_1 = syncers.pop().unwrap();
/// let mut syncer_0 = syncers.pop().unwrap();
///
/// let n_iterations = 10;
/// let shared_counter = std::sync::Arc::new(std::sync::Mutex::new(0_i64));
///
/// let shared_counter_0 = std::sync::Arc::clone(&shared_counter);
/// let handle_0 = std::thread::spawn(move || {
///     for _ in 0..n_iterations {
///         syncer_0.sync();
///         *shared_counter_0.lock().unwrap() += 1;
///         syncer_0.sync();
///     }
/// });
///
/// for i in 0..n_iterations {
///     syncer_1.sync();
///     syncer_1.sync();
///     assert_eq!(*shared_counter.lock().unwrap(), i+1);
/// }
/// handle_0.join().unwrap();
/// ```
#[derive(Clone)]
pub struct BarrierSync {
    barrier: hurdles::Barrier,
}

impl BuildGroup for BarrierSync {
    fn build_group(n_members: NonZeroUsize) -> Vec<Self> {
        let barrier = hurdles::Barrier::new(n_members.get());
        (0..n_members.get())
            .map(|_| Self {
                barrier: barrier.clone(),
            })
            .collect()
    }
}

impl SyncWorkers for BarrierSync {
    fn sync(&mut self) {
        self.barrier.wait();
    }
}

/// Handles point-to-point messages between members of a group.
///
/// The receiver is referenced by the index `I` and will obtain the message `T`.
/// Between the [Communicator::send] and [Communicator::receive] method, a synchronization step
/// needs to happen if the receiver should observe all messages of the current round.
pub trait Communicator<I, T> {
    /// Sends information to a particular receiver.
    fn send(&mut self, receiver: &I, message: T) -> Result<(), SimulationError>;
    /// Receives every message which is currently queued without blocking.
    fn receive(&mut self) -> Vec<T>;
    /// Blocks until the next message arrives.
    fn receive_blocking(&mut self) -> Result<T, SimulationError>;
}

/// Sender-Receiver [Communicator] based on [crossbeam_channel].
///
/// This struct contains one receiver and one sender for every member of the group including
/// itself.
/// ```
/// # use cellular_dune_core::backend::{BuildGroup, ChannelComm, Communicator};
/// let mut comms = ChannelComm::<bool>::build_group(3.try_into().unwrap());
///
/// comms[0].send(&1, true).unwrap();
/// comms[2].send(&1, false).unwrap();
/// let elements = comms[1].receive();
///
/// assert_eq!(elements, vec![true, false]);
/// ```
#[derive(Clone)]
pub struct ChannelComm<T> {
    senders: BTreeMap<usize, crossbeam_channel::Sender<T>>,
    receiver: crossbeam_channel::Receiver<T>,
}

impl<T> BuildGroup for ChannelComm<T> {
    fn build_group(n_members: NonZeroUsize) -> Vec<Self> {
        let channels: Vec<_> = (0..n_members.get())
            .map(|_| crossbeam_channel::unbounded::<T>())
            .collect();
        let senders: BTreeMap<_, _> = channels
            .iter()
            .enumerate()
            .map(|(rank, (s, _))| (rank, s.clone()))
            .collect();
        channels
            .into_iter()
            .map(|(_, receiver)| ChannelComm {
                senders: senders.clone(),
                receiver,
            })
            .collect()
    }
}

impl<T> Communicator<usize, T> for ChannelComm<T> {
    fn send(&mut self, receiver: &usize, message: T) -> Result<(), SimulationError> {
        let sender = self.senders.get(receiver).ok_or_else(|| {
            CollectiveError(format!(
                "rank {receiver} is not a member of this group of size {}",
                self.senders.len()
            ))
        })?;
        sender.send(message)?;
        Ok(())
    }

    fn receive(&mut self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    fn receive_blocking(&mut self) -> Result<T, SimulationError> {
        Ok(self.receiver.recv()?)
    }
}

/// Collective operations between a fixed set of peers.
///
/// Every peer of the group has to call the same collective operations in the same order.
/// A collective blocks until every peer has contributed; a missing peer stalls the others
/// indefinitely.
pub trait Collective {
    /// Rank of this peer
    fn rank(&self) -> usize;
    /// Number of peers in the group
    fn size(&self) -> usize;
    /// Blocks until all peers have reached the barrier.
    fn barrier(&mut self);
    /// Splits `data` of the `root` peer into equally sized contiguous chunks and hands chunk `i`
    /// to peer `i`.
    ///
    /// Only the root has to provide data; all other peers pass [None].
    fn scatter(
        &mut self,
        root: usize,
        data: Option<&[CellState]>,
    ) -> Result<Vec<CellState>, SimulationError>;
    /// Every peer contributes its local chunk and receives the concatenation of all chunks
    /// ordered by rank.
    fn all_gather(&mut self, local: &[CellState]) -> Result<Vec<CellState>, SimulationError>;
}

/// Message exchanged by [ChannelCollective].
struct Envelope {
    epoch: u64,
    source: usize,
    payload: Vec<CellState>,
}

/// [Collective] built from a [ChannelComm] and a [BarrierSync].
///
/// Messages carry the number of the collective operation they belong to such that a fast peer
/// which already entered the next operation can not confuse a slow one.
/// ```
/// # use cellular_dune_core::backend::{BuildGroup, ChannelCollective, Collective};
/// let peers = ChannelCollective::build_group(2.try_into().unwrap());
/// let handles: Vec<_> = peers
///     .into_iter()
///     .map(|mut peer| {
///         std::thread::spawn(move || {
///             let local = vec![peer.rank() as u8; 2];
///             peer.all_gather(&local).unwrap()
///         })
///     })
///     .collect();
/// for handle in handles {
///     assert_eq!(handle.join().unwrap(), vec![0, 0, 1, 1]);
/// }
/// ```
pub struct ChannelCollective {
    rank: usize,
    size: usize,
    epoch: u64,
    comm: ChannelComm<Envelope>,
    syncer: BarrierSync,
    pending: Vec<Envelope>,
}

impl BuildGroup for ChannelCollective {
    fn build_group(n_members: NonZeroUsize) -> Vec<Self> {
        ChannelComm::build_group(n_members)
            .into_iter()
            .zip(BarrierSync::build_group(n_members))
            .enumerate()
            .map(|(rank, (comm, syncer))| ChannelCollective {
                rank,
                size: n_members.get(),
                epoch: 0,
                comm,
                syncer,
                pending: Vec::new(),
            })
            .collect()
    }
}

impl ChannelCollective {
    /// Collects `n` messages of the current epoch ordered by source rank.
    fn collect_epoch(&mut self, n: usize) -> Result<Vec<Envelope>, SimulationError> {
        let epoch = self.epoch;
        let queued = self.comm.receive();
        self.pending.extend(queued);
        let (mut current, later): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|envelope| envelope.epoch == epoch);
        self.pending = later;
        while current.len() < n {
            let envelope = self.comm.receive_blocking()?;
            match envelope.epoch == epoch {
                true => current.push(envelope),
                false => self.pending.push(envelope),
            }
        }
        current.sort_by_key(|envelope| envelope.source);
        self.epoch += 1;
        Ok(current)
    }

    fn post(&mut self, receiver: usize, payload: Vec<CellState>) -> Result<(), SimulationError> {
        let envelope = Envelope {
            epoch: self.epoch,
            source: self.rank,
            payload,
        };
        self.comm.send(&receiver, envelope)
    }
}

impl Collective for ChannelCollective {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&mut self) {
        self.syncer.sync();
    }

    fn scatter(
        &mut self,
        root: usize,
        data: Option<&[CellState]>,
    ) -> Result<Vec<CellState>, SimulationError> {
        if self.rank == root {
            let data = data.ok_or_else(|| {
                CollectiveError(format!("root rank {root} did not provide data to scatter"))
            })?;
            if data.len() % self.size != 0 {
                return Err(CollectiveError(format!(
                    "can not scatter {} values evenly between {} peers",
                    data.len(),
                    self.size
                ))
                .into());
            }
            let chunk_len = data.len() / self.size;
            for receiver in 0..self.size {
                let chunk = data[receiver * chunk_len..(receiver + 1) * chunk_len].to_vec();
                self.post(receiver, chunk)?;
            }
        }
        let mut received = self.collect_epoch(1)?;
        match received.pop() {
            Some(envelope) if envelope.source == root => Ok(envelope.payload),
            Some(envelope) => Err(CollectiveError(format!(
                "rank {} expected scatter data from root {root} but got it from {}",
                self.rank, envelope.source
            ))
            .into()),
            None => Err(CollectiveError(format!(
                "rank {} did not receive any scatter data",
                self.rank
            ))
            .into()),
        }
    }

    fn all_gather(&mut self, local: &[CellState]) -> Result<Vec<CellState>, SimulationError> {
        for receiver in 0..self.size {
            self.post(receiver, local.to_vec())?;
        }
        let received = self.collect_epoch(self.size)?;
        let mut gathered = Vec::with_capacity(local.len() * self.size);
        for envelope in received.into_iter() {
            if envelope.payload.len() != local.len() {
                return Err(CollectiveError(format!(
                    "rank {} contributed {} values to all_gather but rank {} expected {}",
                    envelope.source,
                    envelope.payload.len(),
                    self.rank,
                    local.len()
                ))
                .into());
            }
            gathered.extend(envelope.payload);
        }
        Ok(gathered)
    }
}


#[cfg(test)]
mod test_sync {
    use super::*;
    use std::sync::*;

    fn test_group_size(n_threads: usize) {
        let n_iterations = 1_000;

        // Individual threads will increment their counter by +1 each time they are executed
        let iteration_counter = Arc::new(Mutex::new(vec![0_usize; n_threads]));

        let syncers = BarrierSync::build_group(n_threads.try_into().unwrap());
        let handles = syncers
            .into_iter()
            .enumerate()
            .map(|(n_thread, mut syncer)| {
                let iteration_counter_thread = Arc::clone(&iteration_counter);
                std::thread::spawn(move || {
                    for n_iteration in 0..n_iterations {
                        syncer.sync();
                        iteration_counter_thread.lock().unwrap()[n_thread] += 1;
                        syncer.sync();
                        let current_value = iteration_counter_thread.lock().unwrap().clone();
                        assert_eq!(current_value, vec![n_iteration + 1; n_threads]);
                        syncer.sync();
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles.into_iter() {
            handle.join().unwrap();
        }
    }

    #[test]
    fn barrier_sync() {
        for n_threads in 1..6 {
            test_group_size(n_threads);
        }
    }
}

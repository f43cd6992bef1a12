//! Update schedulers and the synchronization primitives they are built on.
//!
//! Every scheduler implements [UpdateScheduler] and can be swapped for any other one.
//! The sequential schedulers ([SynchronousSweep], [RandomIndependent], [RandomFullSweep]) run on
//! the calling thread.
//! [BarrierThreaded] spawns a fixed set of worker threads which are synchronized by a
//! [hurdles::Barrier] through [BarrierSync].
//! [DistributedHybrid] spawns peers which only communicate through [crossbeam_channel] based
//! [ChannelCollective] endpoints and parallelize their own rows with [rayon].

mod errors;
mod hybrid;
mod partition;
mod random;
mod scheduler;
mod serial;
mod setup;
mod sync;
mod threads;

pub use errors::*;
pub use hybrid::*;
pub use partition::*;
pub use random::*;
pub use scheduler::*;
pub use serial::*;
pub use setup::*;
pub use sync::*;
pub use threads::*;

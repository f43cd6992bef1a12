#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! This crate collects the engine which advances a [Grid](cellular_dune_concepts::Grid) of
//! the sand dune automaton generation by generation.
//!
//! ## Schedulers
//! The [backend] module holds five interchangeable update schedulers.
//! They differ in the order in which cells are visited and in how concurrent workers agree on
//! the next generation.
//! [backend::SynchronousSweep] defines the reference semantics;
//! [backend::BarrierThreaded] and [backend::DistributedHybrid] reproduce it exactly while the
//! two randomized schedulers deliberately depart from it.
//!
//! ## Monitoring
//! Generations are counted by [time::GenerationCounter] which also schedules the debug
//! snapshots written by [snapshot].

pub mod backend;

pub mod snapshot;

pub mod time;

#[doc(hidden)]
pub use rayon;

#[cfg(feature = "tracing")]
#[doc(hidden)]
pub use tracing;

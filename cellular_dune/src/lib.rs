#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! [cellular_dune](crate) simulates a sand dune style cellular automaton on a two-dimensional
//! grid surrounded by a living ghost border.
//!
//! The same grid can be advanced by five interchangeable update schedulers:
//! a serial double-buffered sweep, two randomized in-place sweeps, a barrier synchronized
//! multi-threaded sweep and a domain-decomposed sweep over communicating peers.
//!
//! ```
//! use cellular_dune::prelude::*;
//! let mut settings = Settings::new(14, 14, 20, Strategy::DistributedHybrid);
//! settings.workers = 4.try_into().unwrap();
//! settings.rng_seed = 1;
//! let hybrid = run_simulation(&settings).unwrap();
//!
//! settings.strategy = Strategy::SynchronousSweep;
//! assert_eq!(hybrid, run_simulation(&settings).unwrap());
//! ```

pub use cellular_dune_concepts as concepts;

pub use cellular_dune_core as core;

/// Re-exports the default simulation types and traits.
pub mod prelude;

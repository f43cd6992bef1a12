#![deny(missing_docs)]
//! Vocabulary of the `cellular_dune` simulator.
//!
//! The [Grid] stores the cell space together with its ghost border, a [TransitionRule] decides
//! how a single cell evolves and the [errors] module lists everything which can go wrong while
//! setting up or running a simulation.
//! The update strategies themselves live in `cellular_dune-core`.

/// Error types shared by all crates of the workspace
pub mod errors;
/// Cell space with ghost border
pub mod grid;
/// Neighbor-counting transition rule
pub mod rule;

pub use errors::*;
pub use grid::*;
pub use rule::*;

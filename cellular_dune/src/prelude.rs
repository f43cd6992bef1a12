pub use cellular_dune_concepts::*;

pub use cellular_dune_core::backend::*;
pub use cellular_dune_core::snapshot::*;
pub use cellular_dune_core::time::*;

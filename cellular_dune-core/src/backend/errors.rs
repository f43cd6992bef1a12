use cellular_dune_concepts::errors::*;
use core::any::type_name;
use core::fmt::Display;

use crossbeam_channel::{RecvError, SendError};

macro_rules! impl_error_variant {
    ($name: ident, $($err_var: ident),+) => {
        // Implement Display for ErrorVariant
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        $name::$err_var(message) => write!(f, "{}", message),
                    )+
                }
            }
        }
    }
}

macro_rules! impl_from_error {
    ($name: ident, $(($err_var: ident, $err_type: ty)),+) => {
        $(
            // Implement conversion from error to errorvariant
            impl From<$err_type> for $name {
                fn from(err: $err_type) -> Self {
                    $name::$err_var(err)
                }
            }
        )+
    }
}

/// Covers all errors that can occur while setting up or running a simulation.
///
/// The errors are listed from very likely to be a user error to almost certainly an internal
/// error.
/// None of them is recoverable: the simulation is a batch job and any of these aborts the run.
#[derive(Debug)]
pub enum SimulationError {
    // Very likely to be user errors
    /// Malformed settings such as negative dimensions or a zero worker count
    ConfigError(ConfigError),
    /// The rows can not be distributed evenly between workers or peers
    PartitionError(PartitionError),
    /// Access outside of the grid
    OutOfBounds(OutOfBounds),

    // Less likely but possible to be user errors
    /// Building or updating the progress bar failed
    TimeError(TimeError),
    /// Writing a snapshot failed
    IoError(std::io::Error),

    // Highly unlikely to be user errors
    /// Barrier, lock or worker thread failure
    SyncPrimitiveError(SyncPrimitiveError),
    /// Scatter, gather or all-to-all exchange between peers failed
    CollectiveError(CollectiveError),
    /// Errors surrounding construction of [rayon::ThreadPool].
    ThreadingError(rayon::ThreadPoolBuildError),
}

impl_from_error! {SimulationError,
    (ConfigError, ConfigError),
    (PartitionError, PartitionError),
    (OutOfBounds, OutOfBounds),
    (TimeError, TimeError),
    (IoError, std::io::Error),
    (SyncPrimitiveError, SyncPrimitiveError),
    (CollectiveError, CollectiveError),
    (ThreadingError, rayon::ThreadPoolBuildError)
}

impl_error_variant! {SimulationError,
    ConfigError,
    PartitionError,
    OutOfBounds,
    TimeError,
    IoError,
    SyncPrimitiveError,
    CollectiveError,
    ThreadingError
}

// Implement the general error property
impl std::error::Error for SimulationError {}

// Implement conversion from Sending error manually
impl<T> From<SendError<T>> for SimulationError {
    fn from(_err: SendError<T>) -> Self {
        SimulationError::CollectiveError(CollectiveError(format!(
            "Error sending object of type {} to a peer",
            type_name::<T>()
        )))
    }
}

impl From<RecvError> for SimulationError {
    fn from(err: RecvError) -> Self {
        SimulationError::CollectiveError(CollectiveError(format!(
            "Error receiving from a peer: {err}"
        )))
    }
}

impl<G> From<std::sync::PoisonError<G>> for SimulationError {
    fn from(_err: std::sync::PoisonError<G>) -> Self {
        SimulationError::SyncPrimitiveError(SyncPrimitiveError(format!(
            "lock guarding {} was poisoned by a panicking worker",
            type_name::<G>()
        )))
    }
}

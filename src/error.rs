//! Error types for gridr

use crate::launch::LaunchKind;
use thiserror::Error;

/// Result type alias using gridr's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving or dispatching a launch
#[derive(Error, Debug)]
pub enum Error {
    /// More than one grid axis was left for the resolver to infer
    #[error("Too many invalid grid dimensions: {count} axes marked for inference, at most 1 allowed")]
    TooManyInferredAxes {
        /// Number of inferred axes in the request
        count: usize,
    },

    /// Invalid argument provided to a launch
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// A device or occupancy query failed and the resolver was configured to treat that as fatal
    #[error("Occupancy query '{query}' failed: {reason}")]
    OccupancyQuery {
        /// The query that failed
        query: &'static str,
        /// Driver-reported reason
        reason: String,
    },

    /// The driver rejected the dispatch call
    #[error("{kind} launch failed: {reason}")]
    Launch {
        /// Which dispatch entry point was used
        kind: LaunchKind,
        /// Driver-reported reason
        reason: String,
    },

    /// Driver-side failure outside of a launch
    #[error("Driver error: {0}")]
    Driver(String),

    /// CUDA-specific error
    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] cudarc::driver::DriverError),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Create a launch error for the given dispatch variant
    pub fn launch(kind: LaunchKind, reason: impl Into<String>) -> Self {
        Self::Launch {
            kind,
            reason: reason.into(),
        }
    }
}

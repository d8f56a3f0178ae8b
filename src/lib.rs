//! # gridr
//!
//! **Occupancy-driven grid inference and single-shot kernel dispatch.**
//!
//! Compiled code often knows a kernel's block shape but not how many blocks
//! to launch. gridr lets the caller leave one grid axis open, sizes that axis
//! from the device's resident-block budget, and hands the resolved geometry
//! to the driver in a single launch call.
//!
//! ## Quick Start
//!
//! ```rust
//! use gridr::prelude::*;
//! use gridr::runtime::simulated::{KernelId, SimulatedDriver};
//!
//! let driver = SimulatedDriver::default();
//! let grid = GridShape::from_raw(-1, 4, 1)?;
//! let args = [0u64; 2];
//! let launch = KernelLaunch::<SimulatedDriver>::new(KernelId(0), grid, BlockShape::new(256, 1, 1), &args[..]);
//!
//! let geometry = launch_kernel(&driver, &launch, &ResolverConfig::default())?;
//! assert_eq!(geometry.grid.y, 4);
//! # Ok::<(), gridr::error::Error>(())
//! ```
//!
//! ## Launch variants
//!
//! - [`launch::launch_kernel`]: plain launch
//! - [`launch::launch_cluster_kernel`]: adds a thread-block cluster attribute
//! - [`launch::launch_cooperative_kernel`]: whole grid co-resident
//!
//! ## Feature Flags
//!
//! - `cuda`: NVIDIA CUDA driver backend and the `extern "C"` entry points

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
#[cfg(feature = "cuda")]
pub mod ffi;
pub mod grid;
pub mod launch;
pub mod resolver;
pub mod runtime;
pub mod terminator;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{QueryFailurePolicy, ResolverConfig};
    pub use crate::error::{Error, Result};
    pub use crate::grid::{Axis, BlockShape, ClusterShape, GridAxis, GridShape, ResolvedGrid};
    pub use crate::launch::{
        KernelLaunch, LaunchGeometry, LaunchKind, launch_cluster_kernel, launch_cooperative_kernel,
        launch_kernel,
    };
    pub use crate::resolver::{LaunchBudget, resolve_grid, resolve_raw_grid};
    pub use crate::runtime::LaunchDriver;

    #[cfg(feature = "cuda")]
    pub use crate::runtime::cuda::{CudaDriver, CudaKernel, CudaStreamHandle, KernelParams};
}

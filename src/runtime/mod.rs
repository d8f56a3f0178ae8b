//! Device drivers that answer occupancy queries and accept launches
//!
//! This module defines the `LaunchDriver` trait, the seam between geometry
//! resolution and whatever actually runs the kernel.
//!
//! # Architecture
//!
//! ```text
//! LaunchDriver (device runtime identity)
//! ├── Kernel  (opaque handle the occupancy query and launch refer to)
//! ├── Stream  (ordering handle; None selects the default stream)
//! ├── Args    (packed kernel arguments, passed through untouched)
//! ├── queries: multiprocessor_count, max_active_blocks_per_multiprocessor
//! └── launches: launch, launch_cluster, launch_cooperative
//! ```
//!
//! Two drivers are provided:
//!
//! - [`simulated::SimulatedDriver`] - host-side device model, always available
//! - `cuda::CudaDriver` - NVIDIA driver API via cudarc (`cuda` feature)

use std::fmt;

use crate::error::Result;
use crate::grid::ClusterShape;
use crate::launch::LaunchGeometry;

#[cfg(feature = "cuda")]
pub mod cuda;
pub mod simulated;

/// Core trait for device runtimes
///
/// All methods take `&self`; drivers hold no per-launch state and the
/// resolver never caches anything a driver returns.
pub trait LaunchDriver {
    /// Opaque kernel handle
    type Kernel: Copy + fmt::Debug;

    /// Execution stream handle
    type Stream: Copy + fmt::Debug;

    /// Packed kernel arguments
    type Args: ?Sized;

    /// Human-readable name of this driver
    fn name(&self) -> &'static str;

    /// Number of multiprocessors on the current device.
    fn multiprocessor_count(&self) -> Result<u32>;

    /// Maximum number of blocks of `kernel` that can be resident on one
    /// multiprocessor at once, for the given block size and dynamic shared memory.
    fn max_active_blocks_per_multiprocessor(
        &self,
        kernel: Self::Kernel,
        threads_per_block: u32,
        shared_mem_bytes: u32,
    ) -> Result<u32>;

    /// Standard launch.
    fn launch(
        &self,
        kernel: Self::Kernel,
        geometry: &LaunchGeometry,
        stream: Option<Self::Stream>,
        args: &Self::Args,
    ) -> Result<()>;

    /// Launch with a thread-block cluster dimension attribute.
    fn launch_cluster(
        &self,
        kernel: Self::Kernel,
        geometry: &LaunchGeometry,
        cluster: ClusterShape,
        stream: Option<Self::Stream>,
        args: &Self::Args,
    ) -> Result<()>;

    /// Cooperative launch. Every block must be co-resident; the driver is
    /// responsible for rejecting grids that cannot be.
    fn launch_cooperative(
        &self,
        kernel: Self::Kernel,
        geometry: &LaunchGeometry,
        stream: Option<Self::Stream>,
        args: &Self::Args,
    ) -> Result<()>;
}

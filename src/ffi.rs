//! C entry points
//!
//! Three functions for compiled code that launches kernels with a partially
//! known grid. Signed grid extents below zero request inference; at most one
//! may do so. `stream` is null for the default stream, otherwise it points to
//! the stream handle to use. `extra` is accepted for ABI compatibility and
//! ignored.
//!
//! `kernel` is a driver-API `CUfunction`, as returned by `cuModuleGetFunction`
//! or held by a `cudarc` `CudaFunction`. It is not the host-side stub symbol
//! that runtime-API launches (`cudaLaunchKernel`) take as `const void *`;
//! passing such a symbol is undefined behaviour. Code compiled against the
//! runtime API must look the function up with `cudaGetFuncBySymbol` first.
//!
//! None of these functions return an error: any failure aborts the process
//! with a diagnostic naming where it was detected.

use std::ffi::c_void;

use cudarc::driver::sys;

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::grid::{BlockShape, ClusterShape, GridShape};
use crate::launch::{
    KernelLaunch, launch_cluster_kernel, launch_cooperative_kernel, launch_kernel,
};
use crate::runtime::cuda::{CudaDriver, CudaKernel, CudaStreamHandle, KernelParams};
use crate::terminator::OrCrash;

/// Raw arguments shared by all three entry points
struct RawLaunch {
    kernel: sys::CUfunction,
    grid: (isize, isize, isize),
    block: (isize, isize, isize),
    stream: *const i64,
    shared_mem: i32,
    params: *mut *mut c_void,
}

impl RawLaunch {
    /// # Safety
    ///
    /// `stream` must be null or point to a live stream identifier.
    unsafe fn stream(&self) -> Option<CudaStreamHandle> {
        if self.stream.is_null() {
            None
        } else {
            // SAFETY: non-null per the caller's contract.
            Some(unsafe { CudaStreamHandle::from_id(*self.stream) })
        }
    }

    fn shapes(&self) -> Result<(GridShape, BlockShape, u32)> {
        let grid = GridShape::from_raw(self.grid.0 as i64, self.grid.1 as i64, self.grid.2 as i64)?;
        let block = BlockShape::from_raw(self.block.0 as i64, self.block.1 as i64, self.block.2 as i64)?;
        let shared_mem = u32::try_from(self.shared_mem).map_err(|_| {
            Error::invalid_argument("smem", format!("{} bytes is negative", self.shared_mem))
        })?;
        Ok((grid, block, shared_mem))
    }

    /// # Safety
    ///
    /// Same contract as the public entry points.
    unsafe fn with_launch<R>(
        &self,
        f: impl FnOnce(&CudaDriver, &KernelLaunch<'_, CudaDriver>) -> Result<R>,
    ) -> Result<R> {
        let (grid, block, shared_mem) = self.shapes()?;
        // SAFETY: forwarded from the entry point contract.
        let (kernel, params, stream) = unsafe {
            (
                CudaKernel::from_raw(self.kernel),
                KernelParams::from_raw(self.params),
                self.stream(),
            )
        };
        let launch = KernelLaunch::<CudaDriver>::new(kernel, grid, block, &params)
            .shared_mem(shared_mem)
            .on_stream(stream);
        f(&CudaDriver::new(), &launch)
    }
}

/// Launch `kernel`, inferring at most one negative grid extent.
///
/// # Safety
///
/// `kernel` must be a valid function in the current context, `stream` null or
/// a valid pointer to a stream handle, and `params` a valid argument array
/// for `kernel`.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn gridr_launch_kernel(
    kernel: sys::CUfunction,
    grid_x: isize,
    grid_y: isize,
    grid_z: isize,
    block_x: isize,
    block_y: isize,
    block_z: isize,
    stream: *const i64,
    smem: i32,
    params: *mut *mut c_void,
    _extra: *mut *mut c_void,
) {
    let raw = RawLaunch {
        kernel,
        grid: (grid_x, grid_y, grid_z),
        block: (block_x, block_y, block_z),
        stream,
        shared_mem: smem,
        params,
    };
    let config = ResolverConfig::from_env();
    // SAFETY: forwarded from this function's contract.
    unsafe { raw.with_launch(|driver, launch| launch_kernel(driver, launch, &config)) }
        .or_crash();
}

/// Launch `kernel` with a thread-block cluster attribute.
///
/// Cluster extents are used as given and never inferred.
///
/// # Safety
///
/// Same contract as [`gridr_launch_kernel`].
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn gridr_launch_cluster_kernel(
    kernel: sys::CUfunction,
    cluster_x: isize,
    cluster_y: isize,
    cluster_z: isize,
    grid_x: isize,
    grid_y: isize,
    grid_z: isize,
    block_x: isize,
    block_y: isize,
    block_z: isize,
    stream: *const i64,
    smem: i32,
    params: *mut *mut c_void,
    _extra: *mut *mut c_void,
) {
    let raw = RawLaunch {
        kernel,
        grid: (grid_x, grid_y, grid_z),
        block: (block_x, block_y, block_z),
        stream,
        shared_mem: smem,
        params,
    };
    let config = ResolverConfig::from_env();
    let cluster = ClusterShape::from_raw(cluster_x as i64, cluster_y as i64, cluster_z as i64)
        .or_crash();
    // SAFETY: forwarded from this function's contract.
    unsafe {
        raw.with_launch(|driver, launch| launch_cluster_kernel(driver, launch, cluster, &config))
    }
    .or_crash();
}

/// Launch `kernel` cooperatively. The driver rejects grids whose blocks
/// cannot all be resident at once.
///
/// # Safety
///
/// Same contract as [`gridr_launch_kernel`].
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn gridr_launch_cooperative_kernel(
    kernel: sys::CUfunction,
    grid_x: isize,
    grid_y: isize,
    grid_z: isize,
    block_x: isize,
    block_y: isize,
    block_z: isize,
    stream: *const i64,
    smem: i32,
    params: *mut *mut c_void,
    _extra: *mut *mut c_void,
) {
    let raw = RawLaunch {
        kernel,
        grid: (grid_x, grid_y, grid_z),
        block: (block_x, block_y, block_z),
        stream,
        shared_mem: smem,
        params,
    };
    let config = ResolverConfig::from_env();
    // SAFETY: forwarded from this function's contract.
    unsafe {
        raw.with_launch(|driver, launch| launch_cooperative_kernel(driver, launch, &config))
    }
    .or_crash();
}

//! CUDA driver backend
//!
//! `CudaDriver` issues occupancy queries and launches through the CUDA
//! driver API exposed by cudarc. It is stateless: every call acts on the
//! context current on the calling thread, which the caller owns.
//!
//! | Operation                              | Driver call                                   |
//! |----------------------------------------|-----------------------------------------------|
//! | `multiprocessor_count`                 | `cuDeviceGetAttribute(MULTIPROCESSOR_COUNT)`  |
//! | `max_active_blocks_per_multiprocessor` | `cuOccupancyMaxActiveBlocksPerMultiprocessor` |
//! | `launch`                               | `cuLaunchKernel`                              |
//! | `launch_cluster`                       | `cuLaunchKernelEx` + cluster dimension        |
//! | `launch_cooperative`                   | `cuLaunchCooperativeKernel`                   |

mod device;

pub use device::CudaDevice;

use std::ffi::c_void;

use cudarc::driver::safe::CudaStream;
use cudarc::driver::sys;

use super::LaunchDriver;
use crate::error::Result;
use crate::grid::ClusterShape;
use crate::launch::LaunchGeometry;

/// Raw CUDA function handle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CudaKernel(sys::CUfunction);

impl CudaKernel {
    /// Wrap a raw function handle.
    ///
    /// # Safety
    ///
    /// `function` must be a valid `CUfunction` loaded in a context that is
    /// current whenever the handle is used.
    pub unsafe fn from_raw(function: sys::CUfunction) -> Self {
        Self(function)
    }

    /// The raw function handle.
    pub fn as_raw(&self) -> sys::CUfunction {
        self.0
    }
}

/// Raw CUDA stream handle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CudaStreamHandle(sys::CUstream);

impl CudaStreamHandle {
    /// Wrap a raw stream handle.
    ///
    /// # Safety
    ///
    /// `stream` must outlive every launch made on it.
    pub unsafe fn from_raw(stream: sys::CUstream) -> Self {
        Self(stream)
    }

    /// Reinterpret a stream identifier passed across the C boundary.
    ///
    /// # Safety
    ///
    /// `id` must be the address of a live `CUstream`.
    pub unsafe fn from_id(id: i64) -> Self {
        Self(id as usize as sys::CUstream)
    }

    /// The raw stream handle.
    pub fn as_raw(&self) -> sys::CUstream {
        self.0
    }
}

impl From<&CudaStream> for CudaStreamHandle {
    fn from(stream: &CudaStream) -> Self {
        Self(stream.cu_stream())
    }
}

/// Packed kernel argument array (`void**`)
#[derive(Debug)]
pub struct KernelParams(*mut *mut c_void);

impl KernelParams {
    /// Wrap a raw argument array.
    ///
    /// # Safety
    ///
    /// `params` must point to one valid argument pointer per kernel parameter,
    /// or be null for a kernel without parameters.
    pub unsafe fn from_raw(params: *mut *mut c_void) -> Self {
        Self(params)
    }

    /// Borrow a slice of argument pointers.
    pub fn from_slice(params: &mut [*mut c_void]) -> Self {
        Self(params.as_mut_ptr())
    }
}

/// CUDA driver backend
#[derive(Clone, Copy, Debug, Default)]
pub struct CudaDriver;

impl CudaDriver {
    /// Create a driver bound to whatever context is current at call time.
    pub fn new() -> Self {
        Self
    }
}

#[inline]
fn stream_or_default(stream: Option<CudaStreamHandle>) -> sys::CUstream {
    stream.map_or(std::ptr::null_mut(), |s| s.0)
}

impl LaunchDriver for CudaDriver {
    type Kernel = CudaKernel;
    type Stream = CudaStreamHandle;
    type Args = KernelParams;

    fn name(&self) -> &'static str {
        "cuda"
    }

    fn multiprocessor_count(&self) -> Result<u32> {
        CudaDevice::current()?.multiprocessor_count()
    }

    fn max_active_blocks_per_multiprocessor(
        &self,
        kernel: CudaKernel,
        threads_per_block: u32,
        shared_mem_bytes: u32,
    ) -> Result<u32> {
        let mut blocks: std::ffi::c_int = 0;
        // SAFETY: kernel is a valid CUfunction per `CudaKernel::from_raw`.
        unsafe {
            sys::cuOccupancyMaxActiveBlocksPerMultiprocessor(
                &mut blocks,
                kernel.0,
                threads_per_block as std::ffi::c_int,
                shared_mem_bytes as usize,
            )
        }
        .result()?;
        Ok(blocks.max(0) as u32)
    }

    fn launch(
        &self,
        kernel: CudaKernel,
        geometry: &LaunchGeometry,
        stream: Option<CudaStreamHandle>,
        args: &KernelParams,
    ) -> Result<()> {
        let (gx, gy, gz) = geometry.grid.dims();
        let (bx, by, bz) = geometry.block.dims();
        // SAFETY: handles and argument array are valid per their constructors.
        unsafe {
            sys::cuLaunchKernel(
                kernel.0,
                gx,
                gy,
                gz,
                bx,
                by,
                bz,
                geometry.shared_mem_bytes,
                stream_or_default(stream),
                args.0,
                std::ptr::null_mut(),
            )
        }
        .result()?;
        Ok(())
    }

    fn launch_cluster(
        &self,
        kernel: CudaKernel,
        geometry: &LaunchGeometry,
        cluster: ClusterShape,
        stream: Option<CudaStreamHandle>,
        args: &KernelParams,
    ) -> Result<()> {
        // SAFETY: all-zero is a valid bit pattern for these plain C structs;
        // every field the driver reads is assigned below.
        unsafe {
            let mut attr: sys::CUlaunchAttribute = std::mem::zeroed();
            attr.id = sys::CUlaunchAttributeID::CU_LAUNCH_ATTRIBUTE_CLUSTER_DIMENSION;
            attr.value.clusterDim.x = cluster.x;
            attr.value.clusterDim.y = cluster.y;
            attr.value.clusterDim.z = cluster.z;

            let mut config: sys::CUlaunchConfig = std::mem::zeroed();
            (config.gridDimX, config.gridDimY, config.gridDimZ) = geometry.grid.dims();
            (config.blockDimX, config.blockDimY, config.blockDimZ) = geometry.block.dims();
            config.sharedMemBytes = geometry.shared_mem_bytes;
            config.hStream = stream_or_default(stream);
            config.attrs = &mut attr;
            config.numAttrs = 1;

            sys::cuLaunchKernelEx(&config, kernel.0, args.0, std::ptr::null_mut()).result()?;
        }
        Ok(())
    }

    fn launch_cooperative(
        &self,
        kernel: CudaKernel,
        geometry: &LaunchGeometry,
        stream: Option<CudaStreamHandle>,
        args: &KernelParams,
    ) -> Result<()> {
        let (gx, gy, gz) = geometry.grid.dims();
        let (bx, by, bz) = geometry.block.dims();
        // SAFETY: handles and argument array are valid per their constructors.
        unsafe {
            sys::cuLaunchCooperativeKernel(
                kernel.0,
                gx,
                gy,
                gz,
                bx,
                by,
                bz,
                geometry.shared_mem_bytes,
                stream_or_default(stream),
                args.0,
            )
        }
        .result()?;
        Ok(())
    }
}

/// Check if a CUDA device is present and the driver initialises.
///
/// Returns false instead of panicking when the driver library cannot be
/// loaded.
pub fn is_cuda_available() -> bool {
    std::panic::catch_unwind(|| {
        cudarc::driver::result::init().is_ok()
            && cudarc::driver::result::device::get_count()
                .map(|n| n > 0)
                .unwrap_or(false)
    })
    .unwrap_or(false)
}

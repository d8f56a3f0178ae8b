//! CUDA device queries
//!
//! Thin wrappers over the driver's attribute queries, always against the
//! device of the context current on the calling thread.

use cudarc::driver::sys;

use crate::error::Result;

/// CUDA device identified by its driver ordinal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CudaDevice {
    /// Device handle (ordinal) as returned by the driver
    pub(crate) handle: sys::CUdevice,
}

impl CudaDevice {
    /// Device of the CUDA context current on this thread.
    ///
    /// # Errors
    ///
    /// Fails if no context is current.
    pub fn current() -> Result<Self> {
        let mut handle: sys::CUdevice = 0;
        // SAFETY: cuCtxGetDevice only writes to the provided pointer.
        unsafe { sys::cuCtxGetDevice(&mut handle) }.result()?;
        Ok(Self { handle })
    }

    /// Device ordinal.
    pub fn ordinal(&self) -> i32 {
        self.handle
    }

    /// Read a device attribute.
    pub fn attribute(&self, attribute: sys::CUdevice_attribute) -> Result<i32> {
        // SAFETY: handle came from the driver and the attribute enum is valid.
        let value = unsafe { cudarc::driver::result::device::get_attribute(self.handle, attribute) }?;
        Ok(value)
    }

    /// Number of streaming multiprocessors.
    pub fn multiprocessor_count(&self) -> Result<u32> {
        let count =
            self.attribute(sys::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT)?;
        Ok(count.max(0) as u32)
    }

    /// Get the compute capability of this CUDA device
    ///
    /// Returns (major, minor) version numbers (e.g., (9, 0) for sm_90 / H100)
    pub fn compute_capability(&self) -> Result<(u32, u32)> {
        let major = self
            .attribute(sys::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR)?;
        let minor = self
            .attribute(sys::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR)?;
        Ok((major as u32, minor as u32))
    }

    /// Whether the device accepts cooperative launches.
    pub fn supports_cooperative_launch(&self) -> Result<bool> {
        let flag =
            self.attribute(sys::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COOPERATIVE_LAUNCH)?;
        Ok(flag != 0)
    }

    /// Whether the device accepts thread-block cluster launches (sm_90+).
    pub fn supports_clusters(&self) -> Result<bool> {
        let (major, _) = self.compute_capability()?;
        Ok(major >= 9)
    }
}

//! Common test utilities
#![allow(dead_code)]

use gridr::grid::BlockShape;
use gridr::runtime::simulated::{DeviceSpec, SimulatedDriver};

/// Block of 256 threads along x
pub const BLOCK_256: BlockShape = BlockShape::new(256, 1, 1);

/// Device whose resident budget for `BLOCK_256` is exactly 128 blocks
/// (16 SMs x 8 blocks)
pub fn budget_128_driver() -> SimulatedDriver {
    SimulatedDriver::new(DeviceSpec {
        multiprocessors: 16,
        max_blocks_per_multiprocessor: 8,
        max_threads_per_multiprocessor: 2048,
        ..DeviceSpec::default()
    })
}

/// Block of 32 threads along x
pub const BLOCK_32: BlockShape = BlockShape::new(32, 1, 1);

/// Device with `multiprocessors` SMs that each hold exactly `blocks_per_sm`
/// blocks of [`BLOCK_32`]
pub fn driver_with_budget(multiprocessors: u32, blocks_per_sm: u32) -> SimulatedDriver {
    SimulatedDriver::new(DeviceSpec {
        multiprocessors,
        max_blocks_per_multiprocessor: blocks_per_sm,
        max_threads_per_multiprocessor: 32 * blocks_per_sm.max(1),
        ..DeviceSpec::default()
    })
}

/// Hardware CUDA driver, returning None if no device is present
#[cfg(feature = "cuda")]
pub fn create_cuda_context() -> Option<std::sync::Arc<cudarc::driver::safe::CudaContext>> {
    if !gridr::runtime::cuda::is_cuda_available() {
        return None;
    }
    std::panic::catch_unwind(|| {
        let context = cudarc::driver::safe::CudaContext::new(0).ok()?;
        context.bind_to_thread().ok()?;
        Some(context)
    })
    .ok()
    .flatten()
}

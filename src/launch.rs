//! Kernel dispatch
//!
//! Three entry points share one resolution step and differ only in which
//! driver call they end with:
//!
//! | Function                    | Driver call            |
//! |-----------------------------|------------------------|
//! | [`launch_kernel`]           | `launch`               |
//! | [`launch_cluster_kernel`]   | `launch_cluster`       |
//! | [`launch_cooperative_kernel`] | `launch_cooperative` |
//!
//! Each performs exactly one dispatch call. Failures are returned, never
//! retried.

use std::fmt;

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::grid::{BlockShape, ClusterShape, GridShape, ResolvedGrid};
use crate::resolver::resolve_grid;
use crate::runtime::LaunchDriver;

/// Which dispatch entry point a launch went through
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LaunchKind {
    /// Plain kernel launch
    Standard,
    /// Launch carrying a cluster-dimension attribute
    Cluster,
    /// Cooperative launch (whole grid co-resident)
    Cooperative,
}

impl fmt::Display for LaunchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchKind::Standard => f.write_str("Standard"),
            LaunchKind::Cluster => f.write_str("Cluster"),
            LaunchKind::Cooperative => f.write_str("Cooperative"),
        }
    }
}

/// Fully resolved geometry handed to the driver
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaunchGeometry {
    /// Blocks per axis
    pub grid: ResolvedGrid,
    /// Threads per block per axis
    pub block: BlockShape,
    /// Dynamic shared memory per block in bytes
    pub shared_mem_bytes: u32,
}

/// A launch request against driver `D`
///
/// The grid may leave one axis for inference; everything else is used as given.
pub struct KernelLaunch<'a, D: LaunchDriver + ?Sized> {
    /// Kernel to launch
    pub kernel: D::Kernel,
    /// Requested grid, at most one axis inferred
    pub grid: GridShape,
    /// Threads per block
    pub block: BlockShape,
    /// Dynamic shared memory per block in bytes
    pub shared_mem_bytes: u32,
    /// Target stream, `None` for the default stream
    pub stream: Option<D::Stream>,
    /// Packed kernel arguments
    pub args: &'a D::Args,
}

impl<'a, D: LaunchDriver + ?Sized> KernelLaunch<'a, D> {
    /// Launch on the default stream with no dynamic shared memory.
    pub fn new(kernel: D::Kernel, grid: GridShape, block: BlockShape, args: &'a D::Args) -> Self {
        Self {
            kernel,
            grid,
            block,
            shared_mem_bytes: 0,
            stream: None,
            args,
        }
    }

    /// Set the dynamic shared memory size.
    pub fn shared_mem(mut self, bytes: u32) -> Self {
        self.shared_mem_bytes = bytes;
        self
    }

    /// Select the stream. `None` means the default stream.
    pub fn on_stream(mut self, stream: Option<D::Stream>) -> Self {
        self.stream = stream;
        self
    }

    fn resolve(&self, driver: &D, config: &ResolverConfig) -> Result<LaunchGeometry> {
        let grid = resolve_grid(
            driver,
            self.kernel,
            &self.grid,
            &self.block,
            self.shared_mem_bytes,
            config,
        )?;
        Ok(LaunchGeometry {
            grid,
            block: self.block,
            shared_mem_bytes: self.shared_mem_bytes,
        })
    }
}

/// Resolve the grid and issue a standard launch.
///
/// Returns the geometry that was dispatched.
///
/// # Errors
///
/// - `OccupancyQuery` if a query failed under `QueryFailurePolicy::Fatal`
/// - `Launch` if the driver rejected the launch
pub fn launch_kernel<D: LaunchDriver + ?Sized>(
    driver: &D,
    launch: &KernelLaunch<'_, D>,
    config: &ResolverConfig,
) -> Result<LaunchGeometry> {
    let geometry = launch.resolve(driver, config)?;
    trace_dispatch(driver, LaunchKind::Standard, &geometry, launch.stream);
    driver
        .launch(launch.kernel, &geometry, launch.stream, launch.args)
        .map_err(|e| Error::launch(LaunchKind::Standard, e.to_string()))?;
    Ok(geometry)
}

/// Resolve the grid and issue a launch with a cluster-dimension attribute.
///
/// `cluster` is forwarded verbatim; it takes no part in grid resolution.
pub fn launch_cluster_kernel<D: LaunchDriver + ?Sized>(
    driver: &D,
    launch: &KernelLaunch<'_, D>,
    cluster: ClusterShape,
    config: &ResolverConfig,
) -> Result<LaunchGeometry> {
    let geometry = launch.resolve(driver, config)?;
    trace_dispatch(driver, LaunchKind::Cluster, &geometry, launch.stream);
    driver
        .launch_cluster(launch.kernel, &geometry, cluster, launch.stream, launch.args)
        .map_err(|e| Error::launch(LaunchKind::Cluster, e.to_string()))?;
    Ok(geometry)
}

/// Resolve the grid and issue a cooperative launch.
///
/// Co-residency of the resolved grid is checked by the driver, not here.
pub fn launch_cooperative_kernel<D: LaunchDriver + ?Sized>(
    driver: &D,
    launch: &KernelLaunch<'_, D>,
    config: &ResolverConfig,
) -> Result<LaunchGeometry> {
    let geometry = launch.resolve(driver, config)?;
    trace_dispatch(driver, LaunchKind::Cooperative, &geometry, launch.stream);
    driver
        .launch_cooperative(launch.kernel, &geometry, launch.stream, launch.args)
        .map_err(|e| Error::launch(LaunchKind::Cooperative, e.to_string()))?;
    Ok(geometry)
}

#[inline]
fn trace_dispatch<D: LaunchDriver + ?Sized>(
    driver: &D,
    kind: LaunchKind,
    geometry: &LaunchGeometry,
    stream: Option<D::Stream>,
) {
    tracing::debug!(
        driver = driver.name(),
        %kind,
        grid = %geometry.grid,
        block = ?geometry.block.dims(),
        shared_mem_bytes = geometry.shared_mem_bytes,
        stream = ?stream,
        "dispatching kernel"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::simulated::{DeviceSpec, DriverEvent, Fault, KernelId, SimulatedDriver, StreamId};

    fn driver() -> SimulatedDriver {
        SimulatedDriver::new(DeviceSpec::default())
    }

    #[test]
    fn test_standard_launch_records_geometry() {
        let driver = driver();
        let args = [1u64, 2, 3];
        let launch = KernelLaunch::<SimulatedDriver>::new(
            KernelId(7),
            GridShape::pinned(4, 2, 1).unwrap(),
            BlockShape::new(128, 1, 1),
            &args[..],
        )
        .shared_mem(1024);

        let geometry = launch_kernel(&driver, &launch, &ResolverConfig::default()).unwrap();
        assert_eq!(geometry.grid, ResolvedGrid::new(4, 2, 1));

        let launches = driver.launches();
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].kind, LaunchKind::Standard);
        assert_eq!(launches[0].kernel, KernelId(7));
        assert_eq!(launches[0].geometry, geometry);
        assert_eq!(launches[0].arg_count, 3);
    }

    #[test]
    fn test_launch_failure_is_reported_once() {
        let driver = driver().with_fault(Fault::Launch);
        let launch = KernelLaunch::<SimulatedDriver>::new(
            KernelId(1),
            GridShape::pinned(1, 1, 1).unwrap(),
            BlockShape::new(32, 1, 1),
            &[][..],
        );

        let err = launch_kernel(&driver, &launch, &ResolverConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Launch {
                kind: LaunchKind::Standard,
                ..
            }
        ));
        let attempts = driver
            .events()
            .iter()
            .filter(|e| matches!(e, DriverEvent::LaunchRejected { .. }))
            .count();
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_stream_passed_verbatim() {
        let driver = driver();
        let launch = KernelLaunch::<SimulatedDriver>::new(
            KernelId(1),
            GridShape::pinned(1, 1, 1).unwrap(),
            BlockShape::new(32, 1, 1),
            &[][..],
        )
        .on_stream(Some(StreamId(0xdead)));

        launch_cooperative_kernel(&driver, &launch, &ResolverConfig::default()).unwrap();
        assert_eq!(driver.launches()[0].stream, Some(StreamId(0xdead)));
    }
}

//! Host-side simulated device
//!
//! `SimulatedDriver` models the occupancy and launch-validation rules of a
//! GPU without touching hardware. Every query and launch is appended to an
//! event log so callers can check exactly what reached the driver.
//!
//! Occupancy per multiprocessor is the minimum of three limits:
//!
//! - `max_blocks_per_multiprocessor`
//! - `max_threads_per_multiprocessor / threads_per_block`
//! - `shared_mem_per_multiprocessor / shared_mem_bytes` (when non-zero)
//!
//! Launch validation follows the driver's rules: no empty axes, grid and
//! block limits, co-residency for cooperative launches, and for clustered
//! launches a grid that tiles evenly into clusters of at most
//! `max_cluster_size` blocks.

use parking_lot::Mutex;

use super::LaunchDriver;
use crate::error::{Error, Result};
use crate::grid::ClusterShape;
use crate::launch::{LaunchGeometry, LaunchKind};

/// Kernel handle on the simulated device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelId(pub u64);

/// Stream handle on the simulated device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamId(pub i64);

/// Hardware limits of the simulated device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceSpec {
    /// Number of streaming multiprocessors
    pub multiprocessors: u32,
    /// Hardware cap on resident blocks per multiprocessor
    pub max_blocks_per_multiprocessor: u32,
    /// Resident threads per multiprocessor
    pub max_threads_per_multiprocessor: u32,
    /// Shared memory per multiprocessor in bytes
    pub shared_mem_per_multiprocessor: u32,
    /// Dynamic shared memory a single block may request
    pub max_shared_mem_per_block: u32,
    /// Threads per block
    pub max_threads_per_block: u32,
    /// Grid limits along x, y, z
    pub max_grid: (u32, u32, u32),
    /// Blocks per cluster; 0 disables clustered launches
    pub max_cluster_size: u32,
}

impl Default for DeviceSpec {
    /// Ampere-class datacenter part.
    fn default() -> Self {
        Self {
            multiprocessors: 108,
            max_blocks_per_multiprocessor: 32,
            max_threads_per_multiprocessor: 2048,
            shared_mem_per_multiprocessor: 164 * 1024,
            max_shared_mem_per_block: 163 * 1024,
            max_threads_per_block: 1024,
            max_grid: (i32::MAX as u32, 65535, 65535),
            max_cluster_size: 8,
        }
    }
}

impl DeviceSpec {
    /// Resident blocks per multiprocessor for a block profile.
    ///
    /// Zero when a single block does not fit on a multiprocessor.
    pub fn blocks_per_multiprocessor(&self, threads_per_block: u32, shared_mem_bytes: u32) -> u32 {
        if threads_per_block == 0
            || threads_per_block > self.max_threads_per_block
            || shared_mem_bytes > self.max_shared_mem_per_block
        {
            return 0;
        }
        let by_threads = self.max_threads_per_multiprocessor / threads_per_block;
        let by_shared = match shared_mem_bytes {
            0 => u32::MAX,
            bytes => self.shared_mem_per_multiprocessor / bytes,
        };
        self.max_blocks_per_multiprocessor
            .min(by_threads)
            .min(by_shared)
    }
}

/// Failure to inject into the simulated driver
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// `multiprocessor_count` fails
    DeviceQuery,
    /// `max_active_blocks_per_multiprocessor` fails
    OccupancyQuery,
    /// Every launch entry point fails
    Launch,
}

/// A launch accepted by the simulated driver
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchRecord {
    /// Entry point used
    pub kind: LaunchKind,
    /// Kernel launched
    pub kernel: KernelId,
    /// Geometry as received
    pub geometry: LaunchGeometry,
    /// Cluster attribute, clustered launches only
    pub cluster: Option<ClusterShape>,
    /// Stream as received; `None` is the default stream
    pub stream: Option<StreamId>,
    /// Number of packed arguments
    pub arg_count: usize,
}

/// Everything that reached the simulated driver, in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriverEvent {
    /// Multiprocessor count was queried
    DeviceQuery,
    /// Occupancy was queried
    OccupancyQuery {
        /// Kernel queried
        kernel: KernelId,
        /// Threads per block queried
        threads_per_block: u32,
        /// Dynamic shared memory queried
        shared_mem_bytes: u32,
    },
    /// A launch was accepted
    Launched(LaunchRecord),
    /// A launch was rejected
    LaunchRejected {
        /// Entry point used
        kind: LaunchKind,
        /// Rejection reason
        reason: String,
    },
}

/// Simulated device driver
#[derive(Debug)]
pub struct SimulatedDriver {
    spec: DeviceSpec,
    faults: Vec<Fault>,
    events: Mutex<Vec<DriverEvent>>,
}

impl SimulatedDriver {
    /// Create a driver for a device with the given limits.
    pub fn new(spec: DeviceSpec) -> Self {
        Self {
            spec,
            faults: Vec::new(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Inject a failure.
    pub fn with_fault(mut self, fault: Fault) -> Self {
        if !self.faults.contains(&fault) {
            self.faults.push(fault);
        }
        self
    }

    /// Device limits.
    pub fn spec(&self) -> &DeviceSpec {
        &self.spec
    }

    /// Snapshot of the event log.
    pub fn events(&self) -> Vec<DriverEvent> {
        self.events.lock().clone()
    }

    /// Accepted launches, in order.
    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                DriverEvent::Launched(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of launch attempts, accepted or rejected.
    pub fn launch_attempts(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, DriverEvent::Launched(_) | DriverEvent::LaunchRejected { .. }))
            .count()
    }

    /// Number of occupancy or device queries received.
    pub fn query_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, DriverEvent::DeviceQuery | DriverEvent::OccupancyQuery { .. }))
            .count()
    }

    /// Clear the event log.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn has_fault(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    fn record(&self, event: DriverEvent) {
        self.events.lock().push(event);
    }

    fn validate(
        &self,
        kind: LaunchKind,
        geometry: &LaunchGeometry,
        cluster: Option<ClusterShape>,
    ) -> std::result::Result<(), String> {
        if self.has_fault(Fault::Launch) {
            return Err("injected launch failure".to_string());
        }

        let grid = geometry.grid;
        let (max_x, max_y, max_z) = self.spec.max_grid;
        if grid.x == 0 || grid.y == 0 || grid.z == 0 {
            return Err(format!("invalid grid dimension {}", grid));
        }
        if grid.x > max_x || grid.y > max_y || grid.z > max_z {
            return Err(format!(
                "grid {} exceeds device limit {}x{}x{}",
                grid, max_x, max_y, max_z
            ));
        }

        let threads = geometry
            .block
            .threads_per_block()
            .map_err(|e| e.to_string())?;
        if threads == 0 || threads > self.spec.max_threads_per_block {
            return Err(format!(
                "block of {} threads outside 1..={}",
                threads, self.spec.max_threads_per_block
            ));
        }
        if geometry.shared_mem_bytes > self.spec.max_shared_mem_per_block {
            return Err(format!(
                "{} bytes of shared memory exceeds {} per block",
                geometry.shared_mem_bytes, self.spec.max_shared_mem_per_block
            ));
        }

        if kind == LaunchKind::Cooperative {
            let resident = u64::from(self.spec.multiprocessors)
                * u64::from(
                    self.spec
                        .blocks_per_multiprocessor(threads, geometry.shared_mem_bytes),
                );
            if grid.total_blocks() > resident {
                return Err(format!(
                    "cooperative launch too large: {} blocks, {} co-resident",
                    grid.total_blocks(),
                    resident
                ));
            }
        }

        if let Some(cluster) = cluster {
            if cluster.x == 0 || cluster.y == 0 || cluster.z == 0 {
                return Err(format!("invalid cluster dimension {:?}", cluster.dims()));
            }
            let size = u64::from(cluster.x) * u64::from(cluster.y) * u64::from(cluster.z);
            if size > u64::from(self.spec.max_cluster_size) {
                return Err(format!(
                    "cluster of {} blocks exceeds {}",
                    size, self.spec.max_cluster_size
                ));
            }
            if grid.x % cluster.x != 0 || grid.y % cluster.y != 0 || grid.z % cluster.z != 0 {
                return Err(format!(
                    "grid {} is not a multiple of cluster {:?}",
                    grid,
                    cluster.dims()
                ));
            }
        }

        Ok(())
    }

    fn dispatch(
        &self,
        kind: LaunchKind,
        kernel: KernelId,
        geometry: &LaunchGeometry,
        cluster: Option<ClusterShape>,
        stream: Option<StreamId>,
        args: &[u64],
    ) -> Result<()> {
        match self.validate(kind, geometry, cluster) {
            Ok(()) => {
                self.record(DriverEvent::Launched(LaunchRecord {
                    kind,
                    kernel,
                    geometry: *geometry,
                    cluster,
                    stream,
                    arg_count: args.len(),
                }));
                Ok(())
            }
            Err(reason) => {
                self.record(DriverEvent::LaunchRejected {
                    kind,
                    reason: reason.clone(),
                });
                Err(Error::Driver(reason))
            }
        }
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new(DeviceSpec::default())
    }
}

impl LaunchDriver for SimulatedDriver {
    type Kernel = KernelId;
    type Stream = StreamId;
    type Args = [u64];

    fn name(&self) -> &'static str {
        "simulated"
    }

    fn multiprocessor_count(&self) -> Result<u32> {
        self.record(DriverEvent::DeviceQuery);
        if self.has_fault(Fault::DeviceQuery) {
            return Err(Error::Driver("injected device query failure".to_string()));
        }
        Ok(self.spec.multiprocessors)
    }

    fn max_active_blocks_per_multiprocessor(
        &self,
        kernel: KernelId,
        threads_per_block: u32,
        shared_mem_bytes: u32,
    ) -> Result<u32> {
        self.record(DriverEvent::OccupancyQuery {
            kernel,
            threads_per_block,
            shared_mem_bytes,
        });
        if self.has_fault(Fault::OccupancyQuery) {
            return Err(Error::Driver("injected occupancy query failure".to_string()));
        }
        Ok(self
            .spec
            .blocks_per_multiprocessor(threads_per_block, shared_mem_bytes))
    }

    fn launch(
        &self,
        kernel: KernelId,
        geometry: &LaunchGeometry,
        stream: Option<StreamId>,
        args: &[u64],
    ) -> Result<()> {
        self.dispatch(LaunchKind::Standard, kernel, geometry, None, stream, args)
    }

    fn launch_cluster(
        &self,
        kernel: KernelId,
        geometry: &LaunchGeometry,
        cluster: ClusterShape,
        stream: Option<StreamId>,
        args: &[u64],
    ) -> Result<()> {
        self.dispatch(
            LaunchKind::Cluster,
            kernel,
            geometry,
            Some(cluster),
            stream,
            args,
        )
    }

    fn launch_cooperative(
        &self,
        kernel: KernelId,
        geometry: &LaunchGeometry,
        stream: Option<StreamId>,
        args: &[u64],
    ) -> Result<()> {
        self.dispatch(LaunchKind::Cooperative, kernel, geometry, None, stream, args)
    }
}

//! Grid inference from device occupancy
//!
//! # Algorithm
//!
//! ```text
//! free axis?  ── none ──► return pinned extents (no device query)
//!     │
//!    one
//!     ▼
//! budget = multiprocessors × max_active_blocks_per_multiprocessor
//!     │
//!     ▼
//! for each pinned axis p:  budget /= p
//!     │
//!     ▼
//! free axis = max(1, budget)
//! ```
//!
//! Pinned axes divide the running budget one at a time, so an axis pinned to
//! one is a no-op. A grid with more than one free axis never reaches this
//! module: `GridShape` rejects it at construction.
//!
//! The budget is queried on every call. Occupancy depends on the kernel, its
//! shared memory request and the current device, any of which may change
//! between launches.

use crate::config::{QueryFailurePolicy, ResolverConfig};
use crate::error::{Error, Result};
use crate::grid::{Axis, BlockShape, GridShape, ResolvedGrid};
use crate::runtime::LaunchDriver;

/// Maximum number of concurrently resident blocks across a device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaunchBudget {
    /// Multiprocessors on the device
    pub multiprocessor_count: u32,
    /// Resident blocks per multiprocessor for one kernel/block/shared-memory profile
    pub blocks_per_multiprocessor: u32,
}

impl LaunchBudget {
    /// Total resident blocks across the device.
    #[inline]
    pub fn total(&self) -> u64 {
        u64::from(self.multiprocessor_count) * u64::from(self.blocks_per_multiprocessor)
    }
}

/// Query the occupancy budget for `kernel` with `block` threads and
/// `shared_mem_bytes` of dynamic shared memory.
///
/// # Errors
///
/// Returns `OccupancyQuery` naming the query that failed.
pub fn query_budget<D: LaunchDriver + ?Sized>(
    driver: &D,
    kernel: D::Kernel,
    block: &BlockShape,
    shared_mem_bytes: u32,
) -> Result<LaunchBudget> {
    let threads_per_block = block.threads_per_block().map_err(|e| Error::OccupancyQuery {
        query: "threads_per_block",
        reason: e.to_string(),
    })?;

    let multiprocessor_count = driver
        .multiprocessor_count()
        .map_err(|e| Error::OccupancyQuery {
            query: "multiprocessor_count",
            reason: e.to_string(),
        })?;

    let blocks_per_multiprocessor = driver
        .max_active_blocks_per_multiprocessor(kernel, threads_per_block, shared_mem_bytes)
        .map_err(|e| Error::OccupancyQuery {
            query: "max_active_blocks_per_multiprocessor",
            reason: e.to_string(),
        })?;

    Ok(LaunchBudget {
        multiprocessor_count,
        blocks_per_multiprocessor,
    })
}

/// Blocks available to the free axis of `grid` given a device-wide budget.
///
/// Each pinned axis divides the budget in turn. `GridShape` guarantees the
/// pinned extents are non-zero. The result is never below one block.
pub fn distribute_budget(budget: u64, grid: &GridShape) -> u32 {
    let mut blocks = budget;
    for pinned in grid.pinned_extents() {
        blocks /= u64::from(pinned);
    }
    u32::try_from(blocks.max(1)).unwrap_or(u32::MAX)
}

/// Resolve `grid` into plain block counts.
///
/// A fully pinned grid is returned unchanged without touching the driver.
/// Otherwise the free axis is sized from the occupancy budget; on a query
/// failure the configured [`QueryFailurePolicy`] decides between resolving
/// it to one block and failing.
///
/// # Errors
///
/// Returns `OccupancyQuery` only under `QueryFailurePolicy::Fatal`.
pub fn resolve_grid<D: LaunchDriver + ?Sized>(
    driver: &D,
    kernel: D::Kernel,
    grid: &GridShape,
    block: &BlockShape,
    shared_mem_bytes: u32,
    config: &ResolverConfig,
) -> Result<ResolvedGrid> {
    let Some(free) = grid.free_axis() else {
        return Ok(assign(grid, None));
    };

    let blocks = match query_budget(driver, kernel, block, shared_mem_bytes) {
        Ok(budget) => {
            let blocks = distribute_budget(budget.total(), grid);
            tracing::debug!(
                driver = driver.name(),
                axis = %free,
                multiprocessors = budget.multiprocessor_count,
                blocks_per_multiprocessor = budget.blocks_per_multiprocessor,
                blocks,
                "inferred grid axis from occupancy"
            );
            blocks
        }
        Err(e) => match config.on_query_failure {
            QueryFailurePolicy::Fatal => return Err(e),
            QueryFailurePolicy::Degrade => {
                tracing::warn!(
                    driver = driver.name(),
                    axis = %free,
                    error = %e,
                    "occupancy unavailable, launching a single block along the inferred axis"
                );
                1
            }
        },
    };

    Ok(assign(grid, Some((free, blocks))))
}

/// Resolve a grid given as raw signed extents, negative meaning "infer".
///
/// # Errors
///
/// Returns `TooManyInferredAxes` before any driver call if two or three
/// extents are negative, and `InvalidArgument` if an extent is zero or does
/// not fit in `u32`.
pub fn resolve_raw_grid<D: LaunchDriver + ?Sized>(
    driver: &D,
    kernel: D::Kernel,
    raw: (i64, i64, i64),
    block: &BlockShape,
    shared_mem_bytes: u32,
    config: &ResolverConfig,
) -> Result<ResolvedGrid> {
    let grid = GridShape::from_raw(raw.0, raw.1, raw.2)?;
    resolve_grid(driver, kernel, &grid, block, shared_mem_bytes, config)
}

fn assign(grid: &GridShape, free: Option<(Axis, u32)>) -> ResolvedGrid {
    let extent = |axis: Axis| match free {
        Some((f, blocks)) if f == axis => blocks,
        _ => grid.axis(axis).pinned().unwrap_or(1),
    };
    ResolvedGrid::new(extent(Axis::X), extent(Axis::Y), extent(Axis::Z))
}

//! Launch geometry types
//!
//! A launch is described by three shapes:
//!
//! - [`GridShape`] - blocks per axis, where at most one axis may be left for
//!   the resolver to infer
//! - [`BlockShape`] - threads per block per axis, always caller-supplied
//! - [`ClusterShape`] - blocks per cluster, only used by clustered launches
//!
//! Resolution turns a `GridShape` into a [`ResolvedGrid`] which carries plain
//! block counts and is handed to the driver unchanged.

use std::fmt;

use crate::error::{Error, Result};

/// One of the three launch axes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// First axis
    X,
    /// Second axis
    Y,
    /// Third axis
    Z,
}

impl Axis {
    /// All axes in launch order
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("x"),
            Axis::Y => f.write_str("y"),
            Axis::Z => f.write_str("z"),
        }
    }
}

/// Extent of a single grid axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridAxis {
    /// Block count fixed by the caller
    Pinned(u32),
    /// Block count left for the resolver to derive from device occupancy
    Inferred,
}

impl GridAxis {
    /// Convert a raw signed extent. Negative values request inference.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a non-negative extent does not fit in `u32`.
    pub fn from_raw(value: i64) -> Result<Self> {
        if value < 0 {
            return Ok(GridAxis::Inferred);
        }
        u32::try_from(value).map(GridAxis::Pinned).map_err(|_| {
            Error::invalid_argument("grid", format!("extent {} exceeds u32::MAX", value))
        })
    }

    /// Returns true if this axis is left for inference.
    #[inline]
    pub fn is_inferred(self) -> bool {
        matches!(self, GridAxis::Inferred)
    }

    /// The pinned block count, if any.
    #[inline]
    pub fn pinned(self) -> Option<u32> {
        match self {
            GridAxis::Pinned(n) => Some(n),
            GridAxis::Inferred => None,
        }
    }
}

/// Requested grid shape with at most one inferred axis
///
/// The single-free-axis invariant is enforced by every constructor, so a
/// `GridShape` value never needs to be re-validated by the resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridShape {
    axes: [GridAxis; 3],
}

impl GridShape {
    /// Create a grid shape from three axes.
    ///
    /// # Errors
    ///
    /// Returns `TooManyInferredAxes` if two or three axes are `Inferred`, and
    /// `InvalidArgument` if a pinned axis has zero blocks.
    pub fn new(x: GridAxis, y: GridAxis, z: GridAxis) -> Result<Self> {
        let axes = [x, y, z];
        let count = axes.iter().filter(|a| a.is_inferred()).count();
        if count > 1 {
            return Err(Error::TooManyInferredAxes { count });
        }
        if let Some(axis) = Axis::ALL
            .into_iter()
            .find(|a| axes[a.index()] == GridAxis::Pinned(0))
        {
            return Err(Error::invalid_argument(
                "grid",
                format!("axis {} is pinned to zero blocks", axis),
            ));
        }
        Ok(Self { axes })
    }

    /// Create a grid shape from raw signed extents, negative meaning "infer".
    pub fn from_raw(x: i64, y: i64, z: i64) -> Result<Self> {
        Self::new(
            GridAxis::from_raw(x)?,
            GridAxis::from_raw(y)?,
            GridAxis::from_raw(z)?,
        )
    }

    /// Fully pinned grid.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if any extent is zero.
    pub fn pinned(x: u32, y: u32, z: u32) -> Result<Self> {
        Self::new(GridAxis::Pinned(x), GridAxis::Pinned(y), GridAxis::Pinned(z))
    }

    /// Grid with `axis` inferred and the other two pinned to the given counts.
    ///
    /// `others` are assigned to the remaining axes in x, y, z order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if either pinned count is zero.
    pub fn inferred_along(axis: Axis, others: (u32, u32)) -> Result<Self> {
        let mut rest = [others.0, others.1].into_iter();
        let mut axes = [GridAxis::Inferred; 3];
        for a in Axis::ALL {
            if a != axis {
                // two axes remain after skipping `axis`
                axes[a.index()] = GridAxis::Pinned(rest.next().unwrap_or(1));
            }
        }
        Self::new(axes[0], axes[1], axes[2])
    }

    /// Extent along `axis`.
    #[inline]
    pub fn axis(&self, axis: Axis) -> GridAxis {
        self.axes[axis.index()]
    }

    /// The axis left for inference, if any.
    pub fn free_axis(&self) -> Option<Axis> {
        Axis::ALL.into_iter().find(|a| self.axis(*a).is_inferred())
    }

    /// Pinned block counts in x, y, z order, skipping the inferred axis.
    pub fn pinned_extents(&self) -> impl Iterator<Item = u32> + '_ {
        self.axes.iter().filter_map(|a| a.pinned())
    }
}

/// Threads per block along each axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockShape {
    /// Threads along x
    pub x: u32,
    /// Threads along y
    pub y: u32,
    /// Threads along z
    pub z: u32,
}

impl BlockShape {
    /// Create a block shape.
    ///
    /// Extents are not checked here; a zero-thread block is rejected by the
    /// driver at launch.
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Create a block shape from raw signed extents.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for zero, negative or oversized extents.
    pub fn from_raw(x: i64, y: i64, z: i64) -> Result<Self> {
        let conv = |v: i64| {
            u32::try_from(v)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    Error::invalid_argument("block", format!("thread count {} out of range", v))
                })
        };
        Ok(Self::new(conv(x)?, conv(y)?, conv(z)?))
    }

    /// Total threads per block (x * y * z).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the product overflows `u32`.
    pub fn threads_per_block(&self) -> Result<u32> {
        self.x
            .checked_mul(self.y)
            .and_then(|xy| xy.checked_mul(self.z))
            .ok_or_else(|| {
                Error::invalid_argument(
                    "block",
                    format!("{}x{}x{} threads overflows u32", self.x, self.y, self.z),
                )
            })
    }

    /// Dimensions as a tuple, matching `cudarc`'s `LaunchConfig` layout.
    #[inline]
    pub fn dims(&self) -> (u32, u32, u32) {
        (self.x, self.y, self.z)
    }
}

/// Blocks per thread-block cluster along each axis
///
/// Always supplied by the caller and passed through to the driver untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClusterShape {
    /// Blocks along x
    pub x: u32,
    /// Blocks along y
    pub y: u32,
    /// Blocks along z
    pub z: u32,
}

impl ClusterShape {
    /// Create a cluster shape.
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Create a cluster shape from raw signed extents.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for zero, negative or oversized extents.
    pub fn from_raw(x: i64, y: i64, z: i64) -> Result<Self> {
        let conv = |v: i64| {
            u32::try_from(v)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    Error::invalid_argument("cluster", format!("extent {} out of range", v))
                })
        };
        Ok(Self::new(conv(x)?, conv(y)?, conv(z)?))
    }

    /// Dimensions as a tuple.
    #[inline]
    pub fn dims(&self) -> (u32, u32, u32) {
        (self.x, self.y, self.z)
    }
}

/// Grid with every axis resolved to a plain block count
///
/// Every axis produced by the resolver is at least 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedGrid {
    /// Blocks along x
    pub x: u32,
    /// Blocks along y
    pub y: u32,
    /// Blocks along z
    pub z: u32,
}

impl ResolvedGrid {
    /// Create a resolved grid.
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Block count along `axis`.
    pub fn get(&self, axis: Axis) -> u32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Total number of blocks in the grid.
    pub fn total_blocks(&self) -> u64 {
        u64::from(self.x) * u64::from(self.y) * u64::from(self.z)
    }

    /// Dimensions as a tuple, matching `cudarc`'s `LaunchConfig` layout.
    #[inline]
    pub fn dims(&self) -> (u32, u32, u32) {
        (self.x, self.y, self.z)
    }
}

impl fmt::Display for ResolvedGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_raw_extent_is_inferred() {
        assert_eq!(GridAxis::from_raw(-1).unwrap(), GridAxis::Inferred);
        assert_eq!(GridAxis::from_raw(i64::MIN).unwrap(), GridAxis::Inferred);
        assert_eq!(GridAxis::from_raw(7).unwrap(), GridAxis::Pinned(7));
        assert_eq!(GridAxis::from_raw(0).unwrap(), GridAxis::Pinned(0));
    }

    #[test]
    fn test_oversized_extent_rejected() {
        let err = GridAxis::from_raw(i64::from(u32::MAX) + 1).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "grid", .. }));
    }

    #[test]
    fn test_single_inferred_axis_accepted() {
        let grid = GridShape::from_raw(4, -1, 2).unwrap();
        assert_eq!(grid.free_axis(), Some(Axis::Y));
        assert_eq!(grid.pinned_extents().collect::<Vec<_>>(), vec![4, 2]);
    }

    #[test]
    fn test_two_inferred_axes_rejected() {
        let err = GridShape::from_raw(-1, -1, 2).unwrap_err();
        assert!(matches!(err, Error::TooManyInferredAxes { count: 2 }));

        let err = GridShape::from_raw(-1, -3, -7).unwrap_err();
        assert!(matches!(err, Error::TooManyInferredAxes { count: 3 }));
    }

    #[test]
    fn test_inferred_along_places_pinned_axes_in_order() {
        let grid = GridShape::inferred_along(Axis::Y, (4, 2)).unwrap();
        assert_eq!(grid.axis(Axis::X), GridAxis::Pinned(4));
        assert_eq!(grid.axis(Axis::Y), GridAxis::Inferred);
        assert_eq!(grid.axis(Axis::Z), GridAxis::Pinned(2));
    }

    #[test]
    fn test_threads_per_block() {
        assert_eq!(BlockShape::new(32, 8, 2).threads_per_block().unwrap(), 512);
        assert!(BlockShape::new(u32::MAX, 2, 1).threads_per_block().is_err());
    }

    #[test]
    fn test_negative_block_extent_rejected() {
        assert!(BlockShape::from_raw(-1, 1, 1).is_err());
        assert!(ClusterShape::from_raw(2, -1, 1).is_err());
    }

    #[test]
    fn test_zero_extents_rejected() {
        let err = GridShape::from_raw(0, -1, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "grid", .. }));
        assert!(GridShape::pinned(4, 0, 1).is_err());
        assert!(GridShape::inferred_along(Axis::X, (0, 4)).is_err());

        let err = BlockShape::from_raw(32, 0, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "block", .. }));
        let err = ClusterShape::from_raw(2, 1, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "cluster", .. }));
    }

    #[test]
    fn test_too_many_inferred_reported_before_zero_extent() {
        let err = GridShape::from_raw(-1, -1, 0).unwrap_err();
        assert!(matches!(err, Error::TooManyInferredAxes { count: 2 }));
    }
}

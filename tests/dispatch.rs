//! Integration tests for the three dispatch variants

mod common;

use common::{BLOCK_256, budget_128_driver};
use gridr::prelude::*;
use gridr::runtime::simulated::{Fault, KernelId, SimulatedDriver, StreamId};

fn request<'a>(grid: GridShape, args: &'a [u64]) -> KernelLaunch<'a, SimulatedDriver> {
    KernelLaunch::<SimulatedDriver>::new(KernelId(3), grid, BLOCK_256, args)
}

#[test]
fn test_standard_launch_with_inferred_axis() {
    let driver = budget_128_driver();
    let args = [10u64, 20];
    let launch = request(GridShape::from_raw(-1, 2, 1).unwrap(), &args).shared_mem(256);

    let geometry = launch_kernel(&driver, &launch, &ResolverConfig::default()).unwrap();

    assert_eq!(geometry.grid, ResolvedGrid::new(64, 2, 1));
    assert_eq!(geometry.block, BLOCK_256);
    assert_eq!(geometry.shared_mem_bytes, 256);

    let launches = driver.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].kind, LaunchKind::Standard);
    assert_eq!(launches[0].geometry, geometry);
    assert_eq!(launches[0].cluster, None);
    assert_eq!(launches[0].arg_count, 2);
}

#[test]
fn test_cluster_shape_forwarded_unchanged() {
    let cluster = ClusterShape::new(2, 1, 1);
    for raw in [(-1, 2, 1), (2, -1, 1), (2, 1, -1)] {
        let driver = budget_128_driver();
        let launch = request(GridShape::from_raw(raw.0, raw.1, raw.2).unwrap(), &[]);

        launch_cluster_kernel(&driver, &launch, cluster, &ResolverConfig::default()).unwrap();

        let launches = driver.launches();
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].kind, LaunchKind::Cluster);
        assert_eq!(launches[0].cluster, Some(cluster), "raw grid {:?}", raw);
    }
}

#[test]
fn test_cluster_launch_rejected_by_driver() {
    let driver = budget_128_driver();
    // 7 blocks cannot be tiled by clusters of 2
    let launch = request(GridShape::pinned(7, 1, 1).unwrap(), &[]);

    let err = launch_cluster_kernel(
        &driver,
        &launch,
        ClusterShape::new(2, 1, 1),
        &ResolverConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        Error::Launch {
            kind: LaunchKind::Cluster,
            ..
        }
    ));
    assert_eq!(driver.launch_attempts(), 1);
}

#[test]
fn test_cooperative_inferred_grid_fits_device() {
    let driver = budget_128_driver();
    let launch = request(GridShape::from_raw(-1, 1, 1).unwrap(), &[]);

    let geometry =
        launch_cooperative_kernel(&driver, &launch, &ResolverConfig::default()).unwrap();

    let spec = driver.spec();
    let resident = u64::from(spec.multiprocessors)
        * u64::from(spec.blocks_per_multiprocessor(BLOCK_256.x, 0));
    assert_eq!(resident, 128);
    assert_eq!(geometry.grid.total_blocks(), resident);
    assert_eq!(driver.launches()[0].kind, LaunchKind::Cooperative);
}

#[test]
fn test_zero_thread_block_rejected_by_driver() {
    let driver = budget_128_driver();
    let launch = KernelLaunch::<SimulatedDriver>::new(
        KernelId(3),
        GridShape::pinned(4, 1, 1).unwrap(),
        BlockShape::new(0, 1, 1),
        &[],
    );

    let err = launch_kernel(&driver, &launch, &ResolverConfig::default()).unwrap_err();

    assert!(matches!(err, Error::Launch { kind: LaunchKind::Standard, .. }));
    assert!(driver.launches().is_empty());
}

#[test]
fn test_cooperative_oversubscription_is_driver_error() {
    let driver = budget_128_driver();
    let launch = request(GridShape::pinned(129, 1, 1).unwrap(), &[]);

    let err = launch_cooperative_kernel(&driver, &launch, &ResolverConfig::default()).unwrap_err();

    assert!(matches!(
        err,
        Error::Launch {
            kind: LaunchKind::Cooperative,
            ..
        }
    ));
    assert!(err.to_string().contains("cooperative launch too large"));
}

#[test]
fn test_query_failure_still_dispatches() {
    for fault in [Fault::DeviceQuery, Fault::OccupancyQuery] {
        let driver = budget_128_driver().with_fault(fault);
        let launch = request(GridShape::from_raw(4, -1, 1).unwrap(), &[]);

        let geometry = launch_kernel(&driver, &launch, &ResolverConfig::default()).unwrap();

        assert_eq!(geometry.grid, ResolvedGrid::new(4, 1, 1));
        assert_eq!(driver.launch_attempts(), 1, "{:?}", fault);
    }
}

#[test]
fn test_strict_query_failure_never_dispatches() {
    let driver = budget_128_driver().with_fault(Fault::OccupancyQuery);
    let launch = request(GridShape::from_raw(4, -1, 1).unwrap(), &[]);

    assert!(launch_kernel(&driver, &launch, &ResolverConfig::strict()).is_err());
    assert_eq!(driver.launch_attempts(), 0);
}

#[test]
fn test_default_stream_when_absent() {
    let driver = budget_128_driver();
    let launch = request(GridShape::pinned(1, 1, 1).unwrap(), &[]).on_stream(None);

    launch_kernel(&driver, &launch, &ResolverConfig::default()).unwrap();

    assert_eq!(driver.launches()[0].stream, None);
}

#[test]
fn test_provided_stream_used_verbatim() {
    let driver = budget_128_driver();
    for stream in [StreamId(0), StreamId(42), StreamId(-7)] {
        driver.clear();
        let launch = request(GridShape::pinned(2, 1, 1).unwrap(), &[]).on_stream(Some(stream));

        launch_cluster_kernel(
            &driver,
            &launch,
            ClusterShape::new(1, 1, 1),
            &ResolverConfig::default(),
        )
        .unwrap();

        assert_eq!(driver.launches()[0].stream, Some(stream));
    }
}

#[test]
fn test_launch_failure_not_retried() {
    let driver = budget_128_driver().with_fault(Fault::Launch);
    let launch = request(GridShape::from_raw(-1, 1, 1).unwrap(), &[]);

    assert!(launch_kernel(&driver, &launch, &ResolverConfig::default()).is_err());
    assert!(launch_cooperative_kernel(&driver, &launch, &ResolverConfig::default()).is_err());

    assert_eq!(driver.launch_attempts(), 2);
    assert!(driver.launches().is_empty());
}

//! Concurrent mount and dispose tests

use std::sync::Arc;
use std::time::Duration;

use chipbridge_codec::{ChipConfig, ChipFamily};

use super::test_utils::*;
use crate::controller::InstanceStatus;
use crate::surface::{SURFACE_ALIAS, SurfaceEvent};
use crate::test_utils::{FixtureModule, GatedModuleSource, RecordingListener, StaticModuleSource, test_bridge};

const INSTANCES: usize = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mounts_never_share_alias() {
    let inner = StaticModuleSource::default().with_fixture(FixtureModule::new(ChipFamily::Fm));
    let source = Arc::new(GatedModuleSource::new(inner));
    let (bridge, table) = test_bridge(source.clone());

    let controllers: Vec<_> = (0..INSTANCES)
        .map(|_| {
            bridge.mount(
                ChipFamily::Fm,
                ChipConfig::default_for(ChipFamily::Fm),
                Arc::new(RecordingListener::default()),
            )
        })
        .collect();
    source.open();

    for controller in &controllers {
        assert_eq!(settle(controller).await, InstanceStatus::Ready);
    }
    assert_eq!(source.fetches(), 1);
    assert_eq!(table.max_alias_holders(), 1);
    assert_eq!(table.misroutes(), 0);
    assert_eq!(table.alias_holder(), None);

    let events = table.events();
    for controller in &controllers {
        let surface = controller.surface();
        assert!(events.contains(&SurfaceEvent::Bound {
            target: surface,
            caller: surface,
        }));
    }

    for controller in &controllers {
        controller.dispose().await;
    }
    assert_eq!(table.live_count(), 0);
    assert_eq!(table.misroutes(), 0);
    assert_eq!(table.max_alias_holders(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_families_mount_concurrently() {
    let source = ChipFamily::ALL
        .into_iter()
        .fold(StaticModuleSource::default(), |source, family| {
            source.with_fixture(FixtureModule::new(family))
        });
    let source = Arc::new(source);
    let (bridge, table) = test_bridge(source.clone());

    let controllers: Vec<_> = ChipFamily::ALL
        .into_iter()
        .chain(ChipFamily::ALL)
        .map(|family| {
            bridge.mount(
                family,
                ChipConfig::default_for(family),
                Arc::new(RecordingListener::default()),
            )
        })
        .collect();

    for controller in &controllers {
        assert_eq!(settle(controller).await, InstanceStatus::Ready, "{}", controller.family());
    }
    assert_eq!(source.fetches(), ChipFamily::ALL.len());
    assert_eq!(table.max_alias_holders(), 1);
    assert_eq!(table.misroutes(), 0);

    // Dropping a controller disposes it in the background
    drop(controllers);
    tokio::time::timeout(Duration::from_secs(10), async {
        while table.live_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("surfaces never removed");
    assert_eq!(table.misroutes(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispose_during_construct() {
    let inner = StaticModuleSource::default().with_fixture(FixtureModule::new(ChipFamily::Psg));
    let source = Arc::new(GatedModuleSource::new(inner));
    let (bridge, table) = test_bridge(source.clone());

    let controller = Arc::new(bridge.mount(
        ChipFamily::Psg,
        ChipConfig::default_for(ChipFamily::Psg),
        Arc::new(RecordingListener::default()),
    ));
    let surface = controller.surface();
    assert_eq!(controller.status(), InstanceStatus::Loading);

    let disposing = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.dispose().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Still loading: the surface must stay until the factory resolves
    assert!(!disposing.is_finished());
    assert!(table.is_live(surface));
    assert_eq!(count(&table.events(), &SurfaceEvent::Removed(surface)), 0);

    source.open();
    tokio::time::timeout(Duration::from_secs(10), disposing)
        .await
        .expect("dispose never finished")
        .unwrap();
    assert_eq!(controller.status(), InstanceStatus::Disposed);

    let events = table.events();
    assert_eq!(count(&events, &SurfaceEvent::Removed(surface)), 1);
    assert_eq!(count(&events, &SurfaceEvent::AliasClaimed(surface)), 2);

    // Constructor lookup plus exactly one shutdown lookup, both before removal
    assert_eq!(queries_by(&events, surface), 2);
    let shutdown_query = events
        .iter()
        .rposition(|e| {
            *e == SurfaceEvent::Queried {
                name: SURFACE_ALIAS.to_string(),
                caller: surface,
                resolved: Some(surface),
            }
        })
        .unwrap();
    let removed = position(&events, &SurfaceEvent::Removed(surface)).unwrap();
    assert!(shutdown_query < removed);

    // Never initialized, so input was never bound
    assert!(!events.iter().any(|e| matches!(e, SurfaceEvent::Bound { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispose_while_queued_keeps_chain() {
    let inner = StaticModuleSource::default().with_fixture(FixtureModule::new(ChipFamily::Wave));
    let source = Arc::new(GatedModuleSource::new(inner));
    let (bridge, table) = test_bridge(source.clone());

    let first = bridge.mount(
        ChipFamily::Wave,
        ChipConfig::default_for(ChipFamily::Wave),
        Arc::new(RecordingListener::default()),
    );
    let middle = Arc::new(bridge.mount(
        ChipFamily::Wave,
        ChipConfig::default_for(ChipFamily::Wave),
        Arc::new(RecordingListener::default()),
    ));
    let last = bridge.mount(
        ChipFamily::Wave,
        ChipConfig::default_for(ChipFamily::Wave),
        Arc::new(RecordingListener::default()),
    );

    let disposing = {
        let middle = middle.clone();
        tokio::spawn(async move { middle.dispose().await })
    };
    source.open();

    assert_eq!(settle(&first).await, InstanceStatus::Ready);
    assert_eq!(settle(&last).await, InstanceStatus::Ready);
    disposing.await.unwrap();
    assert_eq!(middle.status(), InstanceStatus::Disposed);
    assert!(!table.is_live(middle.surface()));
    assert_eq!(table.max_alias_holders(), 1);
    assert_eq!(table.misroutes(), 0);
}

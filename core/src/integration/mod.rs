//! Integration tests for the bridge
//!
//! Mounts fixture modules through the full stack: registry, arbiter,
//! controller, dispatcher and the in-memory surface table.

mod concurrency_tests;

pub(crate) mod test_utils {
    use std::time::Duration;

    use crate::controller::{InstanceController, InstanceStatus};
    use crate::surface::{SurfaceEvent, SurfaceId};

    const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Wait for loading to finish, failing the test if it hangs
    pub async fn settle(controller: &InstanceController) -> InstanceStatus {
        tokio::time::timeout(SETTLE_TIMEOUT, controller.wait_until_settled())
            .await
            .expect("instance never settled")
    }

    /// Alias lookups made by the module running on `surface`
    pub fn queries_by(events: &[SurfaceEvent], surface: SurfaceId) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, SurfaceEvent::Queried { caller, .. } if *caller == surface))
            .count()
    }

    pub fn position(events: &[SurfaceEvent], event: &SurfaceEvent) -> Option<usize> {
        events.iter().position(|e| e == event)
    }

    pub fn count(events: &[SurfaceEvent], event: &SurfaceEvent) -> usize {
        events.iter().filter(|e| *e == event).count()
    }
}

//! FIFO arbitration of the surface alias

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;

use super::{SurfaceHost, SurfaceId};
use crate::error::BridgeError;

/// Hands out surface ids and lends the alias to one surface at a time.
///
/// Waiters are served strictly in arrival order (tokio's mutex is fair).
/// A waiter that times out leaves the queue without disturbing the others.
pub struct SurfaceArbiter {
    next_id: AtomicU64,
    queue: Mutex<()>,
    host: Arc<dyn SurfaceHost>,
    wait_timeout: Option<Duration>,
}

impl SurfaceArbiter {
    pub fn new(host: Arc<dyn SurfaceHost>, wait_timeout: Option<Duration>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            queue: Mutex::new(()),
            host,
            wait_timeout,
        }
    }

    pub fn host(&self) -> &Arc<dyn SurfaceHost> {
        &self.host
    }

    /// Next process-unique surface id
    pub fn assign_unique_id(&self) -> SurfaceId {
        SurfaceId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Run `f` while `surface` holds the alias.
    ///
    /// The alias is claimed right before `f` starts and released as soon as
    /// it finishes, before the next waiter's turn begins. Fails only with
    /// [`BridgeError::Timeout`], in which case `f` never ran.
    pub async fn with_alias<T, F, Fut>(&self, surface: SurfaceId, f: F) -> Result<T, BridgeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _turn = match self.wait_timeout {
            Some(wait) => tokio::time::timeout(wait, self.queue.lock())
                .await
                .map_err(|_| {
                    tracing::warn!(%surface, ?wait, "gave up waiting for surface alias");
                    BridgeError::Timeout { waited: wait }
                })?,
            None => self.queue.lock().await,
        };

        let _claim = AliasClaim::new(self.host.as_ref(), surface);
        Ok(f().await)
    }
}

/// Restores the permanent name on drop, including when `f` unwinds.
struct AliasClaim<'a> {
    host: &'a dyn SurfaceHost,
    surface: SurfaceId,
}

impl<'a> AliasClaim<'a> {
    fn new(host: &'a dyn SurfaceHost, surface: SurfaceId) -> Self {
        tracing::debug!(%surface, "claiming surface alias");
        host.claim_alias(surface);
        Self { host, surface }
    }
}

impl Drop for AliasClaim<'_> {
    fn drop(&mut self) {
        self.host.release_alias(self.surface);
        tracing::debug!(surface = %self.surface, "released surface alias");
    }
}

//! Instance controller: one mounted module from construction to disposal
//!
//! # Lifecycle
//!
//! 1. Assign a surface id and mount the surface
//! 2. Resolve the factory through the registry
//! 3. Invoke the factory while holding the surface alias
//! 4. Install callbacks, then init, push the config, push PCM data, start
//! 5. On dispose: recapture if the family needs it, shut down while
//!    holding the alias, remove the surface, drop the instance
//!
//! A dispose that arrives during steps 2-4 is deferred: the load runs to
//! completion and is shut down right after, and only then is the surface
//! removed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chipbridge_codec::{ChipConfig, ChipFamily, ConfigPatch};
use tokio::sync::watch;

use crate::config::RuntimeConfig;
use crate::dispatcher::{CallbackDispatcher, InstanceListener, SharedConfig, lock_config};
use crate::error::BridgeError;
use crate::family::abi;
use crate::registry::{ModuleDescriptor, ModuleRegistry};
use crate::surface::{SurfaceArbiter, SurfaceHost, SurfaceId};
use crate::wasm::ModuleInstance;

/// What the host UI should render for an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Loading,
    Ready,
    Failed(BridgeError),
    Disposed,
}

impl InstanceStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, InstanceStatus::Loading)
    }

    /// Label for the fallback panel shown in place of a failed module
    pub fn fallback_label(&self, family: ChipFamily) -> Option<String> {
        match self {
            InstanceStatus::Failed(err) => {
                Some(format!("{} unavailable: {}", family.display_name(), err))
            }
            _ => None,
        }
    }
}

enum Slot {
    Loading {
        dispose_requested: bool,
        config_dirty: bool,
    },
    Live(Box<ModuleInstance>),
    Gone,
}

/// Everything needed to wire an instance into the bridge
pub(crate) struct MountParts {
    pub registry: Arc<ModuleRegistry>,
    pub arbiter: Arc<SurfaceArbiter>,
    pub host: Arc<dyn SurfaceHost>,
    pub runtime: RuntimeConfig,
}

struct Shared {
    family: ChipFamily,
    surface: SurfaceId,
    config: SharedConfig,
    listener: Arc<dyn InstanceListener>,
    parts: MountParts,
    slot: Mutex<Slot>,
    surface_mounted: AtomicBool,
    status: watch::Sender<InstanceStatus>,
}

/// Handle the host keeps for one mounted module.
///
/// Dropping the controller without calling [`InstanceController::dispose`]
/// disposes it in the background.
pub struct InstanceController {
    shared: Arc<Shared>,
}

impl InstanceController {
    /// Mount the surface and start loading in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(
        family: ChipFamily,
        initial: ChipConfig,
        listener: Arc<dyn InstanceListener>,
        descriptor: ModuleDescriptor,
        parts: MountParts,
    ) -> Self {
        let surface = parts.arbiter.assign_unique_id();
        let (status, _) = watch::channel(InstanceStatus::Loading);

        if initial.family() != family {
            let err = BridgeError::Initialization {
                family,
                message: format!("initial config is for {}", initial.family()),
            };
            tracing::warn!(%family, %surface, "{}", err);
            status.send_replace(InstanceStatus::Failed(err));
            let shared = Shared::new(family, surface, initial, listener, parts, Slot::Gone, status);
            return Self {
                shared: Arc::new(shared),
            };
        }

        parts.host.create(surface);
        let loading = Slot::Loading {
            dispose_requested: false,
            config_dirty: false,
        };
        let shared = Arc::new(Shared::new(family, surface, initial, listener, parts, loading, status));
        shared.surface_mounted.store(true, Ordering::SeqCst);
        tracing::debug!(%family, %surface, url = %descriptor.url, "mounting instance");

        tokio::spawn(shared.clone().mount(descriptor));
        Self { shared }
    }

    pub fn family(&self) -> ChipFamily {
        self.shared.family
    }

    pub fn surface(&self) -> SurfaceId {
        self.shared.surface
    }

    pub fn status(&self) -> InstanceStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<InstanceStatus> {
        self.shared.status.subscribe()
    }

    /// Wait until loading finishes one way or the other
    pub async fn wait_until_settled(&self) -> InstanceStatus {
        self.shared.wait_until_settled().await
    }

    pub fn fallback_label(&self) -> Option<String> {
        self.status().fallback_label(self.shared.family)
    }

    /// Latest host-side config, including changes reported by the module
    pub fn config(&self) -> ChipConfig {
        lock_config(&self.shared.config).clone()
    }

    /// Replace the config and push a full buffer to the module.
    ///
    /// While loading, the new config is stored and used for the initial push.
    pub fn update_config(&self, next: ChipConfig) -> Result<(), BridgeError> {
        let family = self.shared.family;
        if next.family() != family {
            return Err(BridgeError::ConfigPush(format!(
                "config is for {}, instance is {}",
                next.family(),
                family
            )));
        }
        *lock_config(&self.shared.config) = next.clone();

        let mut slot = self.shared.lock_slot();
        match &mut *slot {
            Slot::Live(instance) => push_config(instance, &next).map_err(|e| {
                tracing::warn!(%family, surface = %self.shared.surface, "config push failed: {:#}", e);
                BridgeError::ConfigPush(format!("{e:#}"))
            }),
            Slot::Loading { config_dirty, .. } => {
                *config_dirty = true;
                Ok(())
            }
            Slot::Gone => Err(self.shared.gone_error()),
        }
    }

    /// Advance the module one frame. Returns `false` if it has no tick export.
    pub fn tick(&self) -> Result<bool, BridgeError> {
        let family = self.shared.family;
        let mut slot = self.shared.lock_slot();
        match &mut *slot {
            Slot::Live(instance) => instance.tick().map_err(|e| BridgeError::Call {
                family,
                message: format!("{e:#}"),
            }),
            Slot::Loading { .. } => Err(BridgeError::NotReady),
            Slot::Gone => Err(self.shared.gone_error()),
        }
    }

    /// Shut the module down and remove its surface. Idempotent.
    pub async fn dispose(&self) {
        self.shared.dispose().await;
    }
}

impl Drop for InstanceController {
    fn drop(&mut self) {
        if matches!(*self.shared.status.borrow(), InstanceStatus::Disposed) {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let shared = self.shared.clone();
            handle.spawn(async move { shared.dispose().await });
        }
    }
}

fn push_config(instance: &mut ModuleInstance, config: &ChipConfig) -> anyhow::Result<()> {
    if let ChipConfig::Instrument(ins) = config {
        instance.set_chip_type(ins.ins_type.0)?;
    }
    instance.push_config(&config.encode())?;
    if let Some(sample) = config.pcm_sample() {
        instance.load_pcm(sample)?;
    }
    Ok(())
}

impl Shared {
    fn new(
        family: ChipFamily,
        surface: SurfaceId,
        initial: ChipConfig,
        listener: Arc<dyn InstanceListener>,
        parts: MountParts,
        slot: Slot,
        status: watch::Sender<InstanceStatus>,
    ) -> Self {
        Self {
            family,
            surface,
            config: Arc::new(Mutex::new(initial)),
            listener,
            parts,
            slot: Mutex::new(slot),
            surface_mounted: AtomicBool::new(false),
            status,
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gone_error(&self) -> BridgeError {
        match &*self.status.borrow() {
            InstanceStatus::Failed(_) => BridgeError::NotReady,
            _ => BridgeError::Disposed,
        }
    }

    async fn wait_until_settled(&self) -> InstanceStatus {
        let mut rx = self.status.subscribe();
        match rx.wait_for(InstanceStatus::is_settled).await {
            Ok(status) => status.clone(),
            Err(_) => self.status.borrow().clone(),
        }
    }

    fn set_status(&self, status: InstanceStatus) {
        self.status.send_replace(status);
    }

    async fn mount(self: Arc<Self>, descriptor: ModuleDescriptor) {
        let mut instance = match self.construct(&descriptor).await {
            Ok(instance) => instance,
            Err(err) => {
                self.release_surface();
                return self.finish_failed(err);
            }
        };

        if self.dispose_requested() {
            tracing::debug!(family = %self.family, surface = %self.surface, "disposed while loading");
            self.teardown(instance, false).await;
            *self.lock_slot() = Slot::Gone;
            return self.set_status(InstanceStatus::Disposed);
        }

        if let Err(err) = self.start(&mut instance) {
            tracing::warn!(family = %self.family, surface = %self.surface, "{}", err);
            self.teardown(instance, false).await;
            return self.finish_failed(err);
        }

        let leftover = {
            let mut slot = self.lock_slot();
            match *slot {
                Slot::Loading {
                    dispose_requested: true,
                    ..
                } => Some(instance),
                Slot::Loading { config_dirty, .. } => {
                    if config_dirty {
                        let latest = lock_config(&self.config).clone();
                        if let Err(e) = push_config(&mut instance, &latest) {
                            tracing::warn!(family = %self.family, "config push failed: {:#}", e);
                        }
                    }
                    *slot = Slot::Live(Box::new(instance));
                    None
                }
                _ => Some(instance),
            }
        };

        match leftover {
            Some(instance) => {
                self.teardown(instance, false).await;
                *self.lock_slot() = Slot::Gone;
                self.set_status(InstanceStatus::Disposed);
            }
            None => {
                tracing::info!(family = %self.family, surface = %self.surface, "instance ready");
                self.set_status(InstanceStatus::Ready);
            }
        }
    }

    fn dispose_requested(&self) -> bool {
        matches!(
            *self.lock_slot(),
            Slot::Loading {
                dispose_requested: true,
                ..
            }
        )
    }

    fn finish_failed(&self, err: BridgeError) {
        let disposed = {
            let mut slot = self.lock_slot();
            let disposed = matches!(
                *slot,
                Slot::Loading {
                    dispose_requested: true,
                    ..
                }
            );
            *slot = Slot::Gone;
            disposed
        };
        if disposed {
            self.set_status(InstanceStatus::Disposed);
        } else {
            tracing::warn!(family = %self.family, surface = %self.surface, "instance failed: {}", err);
            self.set_status(InstanceStatus::Failed(err));
        }
    }

    async fn construct(&self, descriptor: &ModuleDescriptor) -> Result<ModuleInstance, BridgeError> {
        let factory = self.parts.registry.get_factory(descriptor).await?;
        let (family, surface) = (self.family, self.surface);
        let host = self.parts.host.clone();
        self.parts
            .arbiter
            .with_alias(surface, move || factory.invoke(family, surface, host))
            .await?
    }

    /// Callbacks go in before init so nothing raised during init is lost.
    fn start(&self, instance: &mut ModuleInstance) -> Result<(), BridgeError> {
        let family = self.family;
        let fail = |e: anyhow::Error| BridgeError::initialization(family, &e);

        instance.install_dispatcher(CallbackDispatcher::new(
            family,
            self.surface,
            self.config.clone(),
            self.listener.clone(),
        ));
        instance
            .init(self.parts.runtime.surface_width, self.parts.runtime.surface_height)
            .map_err(fail)?;

        let config = lock_config(&self.config).clone();
        push_config(instance, &config).map_err(fail)?;
        instance.start().map_err(fail)
    }

    async fn dispose(&self) {
        let live = {
            let mut slot = self.lock_slot();
            match std::mem::replace(&mut *slot, Slot::Gone) {
                Slot::Live(instance) => Some(instance),
                Slot::Loading { config_dirty, .. } => {
                    *slot = Slot::Loading {
                        dispose_requested: true,
                        config_dirty,
                    };
                    None
                }
                Slot::Gone => None,
            }
        };

        match live {
            Some(instance) => {
                self.teardown(*instance, true).await;
                self.set_status(InstanceStatus::Disposed);
            }
            None => {
                // Loading instances are torn down by the mount task
                if let InstanceStatus::Failed(_) = self.wait_until_settled().await {
                    self.release_surface();
                    self.set_status(InstanceStatus::Disposed);
                }
            }
        }
    }

    /// Shutdown runs inside the alias window; the surface goes after it.
    async fn teardown(&self, mut instance: ModuleInstance, recapture: bool) {
        if recapture && abi(self.family).recapture_on_dispose {
            self.recapture(&mut instance);
        }

        let shutdown = self
            .parts
            .arbiter
            .with_alias(self.surface, move || async move {
                let mut instance = instance;
                let result = instance.shutdown();
                (instance, result)
            })
            .await;

        match shutdown {
            Ok((instance, result)) => {
                if let Err(e) = result {
                    tracing::warn!(family = %self.family, surface = %self.surface, "shutdown failed: {:#}", e);
                }
                self.release_surface();
                drop(instance);
            }
            Err(err) => {
                tracing::warn!(family = %self.family, surface = %self.surface, "shutdown skipped: {}", err);
                self.release_surface();
            }
        }
        tracing::debug!(family = %self.family, surface = %self.surface, "instance torn down");
    }

    /// Pull edits made inside the module back into host state.
    fn recapture(&self, instance: &mut ModuleInstance) {
        let dump = match instance.dump_config() {
            Ok(Some(dump)) => dump,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(family = %self.family, "recapture dump failed: {:#}", e);
                return;
            }
        };

        let snapshot = {
            let mut config = lock_config(&self.config);
            match config.decode(&dump) {
                Ok(decoded) => {
                    *config = decoded.clone();
                    decoded
                }
                Err(e) => {
                    tracing::warn!(family = %self.family, "recapture decode failed: {}", e);
                    return;
                }
            }
        };
        tracing::debug!(family = %self.family, bytes = dump.len(), "recaptured module state");
        self.listener.config_changed(&ConfigPatch::Snapshot(snapshot));
    }

    fn release_surface(&self) {
        if self.surface_mounted.swap(false, Ordering::SeqCst) {
            self.parts.host.remove(self.surface);
            tracing::debug!(family = %self.family, surface = %self.surface, "surface removed");
        }
    }
}

//! Process-wide entry point
//!
//! One [`Bridge`] owns the module registry and the surface arbiter, and is
//! shared by every instance the host mounts.

use std::sync::Arc;

use anyhow::Result;
use chipbridge_codec::{ChipConfig, ChipFamily};

use crate::config::BridgeConfig;
use crate::controller::{InstanceController, MountParts};
use crate::dispatcher::InstanceListener;
use crate::registry::{DefaultSource, ModuleRegistry, ModuleSource};
use crate::surface::{SurfaceArbiter, SurfaceHost, SurfaceTable};
use crate::wasm::WasmEngine;

pub struct Bridge {
    config: BridgeConfig,
    registry: Arc<ModuleRegistry>,
    arbiter: Arc<SurfaceArbiter>,
    host: Arc<dyn SurfaceHost>,
}

impl Bridge {
    /// Bridge that loads modules from disk or HTTP and keeps surfaces in memory
    pub fn new(config: BridgeConfig) -> Result<Self> {
        Self::with_parts(config, Arc::new(DefaultSource::default()), Arc::new(SurfaceTable::new()))
    }

    pub fn with_parts(
        config: BridgeConfig,
        source: Arc<dyn ModuleSource>,
        host: Arc<dyn SurfaceHost>,
    ) -> Result<Self> {
        let engine = Arc::new(WasmEngine::new()?);
        let registry = Arc::new(ModuleRegistry::new(engine, source, config.runtime.ram_limit));
        let arbiter = Arc::new(SurfaceArbiter::new(host.clone(), config.arbiter.wait_timeout()));
        tracing::info!(root = %config.modules.root, "bridge ready");
        Ok(Self {
            config,
            registry,
            arbiter,
            host,
        })
    }

    /// Mount a new instance of `family` and start loading it.
    ///
    /// Returns at once; watch [`InstanceController::status`] for the outcome.
    /// Must be called from within a tokio runtime.
    pub fn mount(
        &self,
        family: ChipFamily,
        initial: ChipConfig,
        listener: Arc<dyn InstanceListener>,
    ) -> InstanceController {
        let descriptor = self.config.descriptor_for(family);
        InstanceController::spawn(
            family,
            initial,
            listener,
            descriptor,
            MountParts {
                registry: self.registry.clone(),
                arbiter: self.arbiter.clone(),
                host: self.host.clone(),
                runtime: self.config.runtime.clone(),
            },
        )
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn arbiter(&self) -> &Arc<SurfaceArbiter> {
        &self.arbiter
    }

    pub fn host(&self) -> &Arc<dyn SurfaceHost> {
        &self.host
    }
}

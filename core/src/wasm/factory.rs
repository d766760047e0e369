//! Compiled module plus linker, ready to construct instances

use std::sync::Arc;

use chipbridge_codec::ChipFamily;
use wasmtime::{ExternType, Linker, Module};

use super::engine::WasmEngine;
use super::instance::ModuleInstance;
use super::state::BridgeContext;
use crate::error::BridgeError;
use crate::ffi::register_bridge_ffi;
use crate::registry::ModuleDescriptor;
use crate::surface::{SurfaceHost, SurfaceId};

/// Cached per module URL for the life of the process.
pub struct ModuleFactory {
    engine: Arc<WasmEngine>,
    module: Module,
    linker: Arc<Linker<BridgeContext>>,
    descriptor: ModuleDescriptor,
    ram_limit: usize,
}

impl ModuleFactory {
    /// Compile module bytes and check they export `descriptor.factory`.
    pub fn compile(
        engine: Arc<WasmEngine>,
        bytes: &[u8],
        descriptor: ModuleDescriptor,
        ram_limit: usize,
    ) -> Result<Self, BridgeError> {
        let factory = Self::compile_module(engine, bytes, descriptor, ram_limit)?;
        factory.check_symbol()?;
        Ok(factory)
    }

    /// Compile without looking for the constructor export.
    ///
    /// The registry shares one compiled module between callers that ask
    /// for different constructors, and each checks its own.
    pub(crate) fn compile_module(
        engine: Arc<WasmEngine>,
        bytes: &[u8],
        descriptor: ModuleDescriptor,
        ram_limit: usize,
    ) -> Result<Self, BridgeError> {
        let compile_error = |e: anyhow::Error| BridgeError::Compile {
            url: descriptor.url.clone(),
            message: format!("{e:#}"),
        };

        let module = engine.load_module(bytes).map_err(compile_error)?;
        WasmEngine::validate_module_memory(&module, ram_limit).map_err(compile_error)?;

        let mut linker = Linker::new(engine.engine());
        register_bridge_ffi(&mut linker).map_err(compile_error)?;

        Ok(Self {
            engine,
            module,
            linker: Arc::new(linker),
            descriptor,
            ram_limit,
        })
    }

    pub(crate) fn check_symbol(&self) -> Result<(), BridgeError> {
        match self.module.get_export(&self.descriptor.factory) {
            Some(ExternType::Func(_)) => Ok(()),
            _ => Err(BridgeError::ModuleResolution {
                symbol: self.descriptor.factory.clone(),
                url: self.descriptor.url.clone(),
            }),
        }
    }

    /// Same compiled module, different constructor export.
    pub fn with_symbol(&self, symbol: &str) -> Result<Self, BridgeError> {
        let factory = Self {
            engine: self.engine.clone(),
            module: self.module.clone(),
            linker: self.linker.clone(),
            descriptor: ModuleDescriptor {
                url: self.descriptor.url.clone(),
                factory: symbol.to_string(),
            },
            ram_limit: self.ram_limit,
        };
        factory.check_symbol()?;
        Ok(factory)
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Construct an instance synchronously on the current thread.
    pub fn instantiate(
        &self,
        family: ChipFamily,
        surface: SurfaceId,
        host: Arc<dyn SurfaceHost>,
    ) -> Result<ModuleInstance, BridgeError> {
        let context = BridgeContext::new(family, surface, host, self.ram_limit);
        ModuleInstance::instantiate(
            &self.engine,
            &self.module,
            &self.linker,
            &self.descriptor.factory,
            context,
        )
        .map_err(|e| BridgeError::initialization(family, &e))
    }

    /// Construct an instance on the blocking pool.
    pub async fn invoke(
        self: Arc<Self>,
        family: ChipFamily,
        surface: SurfaceId,
        host: Arc<dyn SurfaceHost>,
    ) -> Result<ModuleInstance, BridgeError> {
        tracing::debug!(%family, %surface, factory = %self.descriptor.factory, "invoking factory");
        tokio::task::spawn_blocking(move || self.instantiate(family, surface, host))
            .await
            .map_err(|e| BridgeError::Initialization {
                family,
                message: format!("factory task failed: {e}"),
            })?
    }
}

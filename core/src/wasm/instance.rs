//! A running chip module and its entry points

use anyhow::{Context, Result};
use chipbridge_codec::ChipFamily;
use wasmtime::{Instance, Linker, Module, Store, TypedFunc, WasmParams, WasmResults};

use super::engine::WasmEngine;
use super::state::{BridgeContext, memory_range};
use crate::dispatcher::CallbackDispatcher;
use crate::family::{FamilyAbi, abi};
use crate::surface::SurfaceId;

/// Family entry points, resolved once at instantiation
struct EntryPoints {
    init: TypedFunc<(i32, i32), ()>,
    start: TypedFunc<(), ()>,
    shutdown: TypedFunc<(), ()>,
    load_config: TypedFunc<(i32, i32), ()>,
    dump_config: Option<TypedFunc<(i32, i32), i32>>,
    load_pcm: Option<TypedFunc<(i32, i32), ()>>,
    tick: Option<TypedFunc<(), ()>>,
    set_chip_type: Option<TypedFunc<i32, ()>>,
}

fn required<P: WasmParams, R: WasmResults>(
    instance: &Instance,
    store: &mut Store<BridgeContext>,
    name: &str,
) -> Result<TypedFunc<P, R>> {
    instance
        .get_typed_func::<P, R>(&mut *store, name)
        .with_context(|| format!("missing entry point '{}'", name))
}

fn optional<P: WasmParams, R: WasmResults>(
    instance: &Instance,
    store: &mut Store<BridgeContext>,
    name: Option<&str>,
) -> Option<TypedFunc<P, R>> {
    let name = name?;
    let func = instance.get_typed_func::<P, R>(&mut *store, name).ok();
    if func.is_none() {
        tracing::debug!("optional entry point '{}' not exported", name);
    }
    func
}

impl EntryPoints {
    fn resolve(instance: &Instance, store: &mut Store<BridgeContext>, abi: &FamilyAbi) -> Result<Self> {
        Ok(Self {
            init: required(instance, store, abi.init)?,
            start: required(instance, store, abi.start)?,
            shutdown: required(instance, store, abi.shutdown)?,
            load_config: required(instance, store, abi.load_config)?,
            dump_config: optional(instance, store, abi.dump_config),
            load_pcm: optional(instance, store, abi.load_pcm),
            tick: optional(instance, store, abi.tick),
            set_chip_type: optional(instance, store, abi.set_chip_type),
        })
    }
}

/// The module's own allocator
struct Allocator {
    malloc: TypedFunc<i32, i32>,
    free: TypedFunc<i32, ()>,
}

impl Allocator {
    /// Allocate `len` bytes, run `f` with the block, then free it even if `f` failed.
    fn with_block<R>(
        &self,
        store: &mut Store<BridgeContext>,
        len: usize,
        f: impl FnOnce(&mut Store<BridgeContext>, i32, i32) -> Result<R>,
    ) -> Result<R> {
        let len = i32::try_from(len).context("buffer exceeds module address space")?;
        let ptr = self.malloc.call(&mut *store, len).context("malloc() failed")?;
        if ptr <= 0 {
            anyhow::bail!("malloc({}) returned {}", len, ptr);
        }
        let result = f(store, ptr, len);
        let freed = self.free.call(&mut *store, ptr).context("free() failed");
        result.and_then(|value| freed.map(|()| value))
    }
}

/// A loaded and constructed chip module.
///
/// Owned by exactly one instance controller. All calls are synchronous;
/// no view into linear memory outlives a single call.
pub struct ModuleInstance {
    family: ChipFamily,
    store: Store<BridgeContext>,
    /// Not used after construction but keeps exports alive
    #[allow(dead_code)]
    instance: Instance,
    alloc: Allocator,
    entry: EntryPoints,
    ticks: u64,
}

impl ModuleInstance {
    /// Instantiate `module` and run its constructor export `factory`.
    ///
    /// Runs entirely inside the caller's alias window: the constructor is
    /// where the module looks up its surface.
    pub fn instantiate(
        engine: &WasmEngine,
        module: &Module,
        linker: &Linker<BridgeContext>,
        factory: &str,
        context: BridgeContext,
    ) -> Result<Self> {
        let family = context.family;
        let mut store = Store::new(engine.engine(), context);
        store.limiter(|ctx| ctx.limits_mut());

        let instance = linker
            .instantiate(&mut store, module)
            .context("Failed to instantiate WASM module")?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .context("module does not export 'memory'")?;
        store.data_mut().memory = Some(memory);

        let alloc = Allocator {
            malloc: required(&instance, &mut store, "malloc")?,
            free: required(&instance, &mut store, "free")?,
        };
        let entry = EntryPoints::resolve(&instance, &mut store, abi(family))?;

        let constructor = instance
            .get_typed_func::<(), ()>(&mut store, factory)
            .with_context(|| format!("factory '{}' is not a callable export", factory))?;
        constructor.call(&mut store, ()).map_err(|e| {
            let error_msg = format!("{}() failed: {:#}", factory, e);
            tracing::warn!(%family, "{}", error_msg);
            anyhow::anyhow!(error_msg)
        })?;

        Ok(Self {
            family,
            store,
            instance,
            alloc,
            entry,
            ticks: 0,
        })
    }

    pub fn family(&self) -> ChipFamily {
        self.family
    }

    pub fn surface(&self) -> SurfaceId {
        self.store.data().surface
    }

    /// Route module callbacks to `dispatcher` from now on
    pub fn install_dispatcher(&mut self, dispatcher: CallbackDispatcher) {
        self.store.data_mut().dispatcher = Some(dispatcher);
    }

    pub fn init(&mut self, width: u32, height: u32) -> Result<()> {
        let name = abi(self.family).init;
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        self.entry
            .init
            .call(&mut self.store, (w, h))
            .with_context(|| format!("{}() failed", name))
    }

    pub fn start(&mut self) -> Result<()> {
        let name = abi(self.family).start;
        self.entry
            .start
            .call(&mut self.store, ())
            .with_context(|| format!("{}() failed", name))
    }

    pub fn shutdown(&mut self) -> Result<()> {
        let name = abi(self.family).shutdown;
        self.entry
            .shutdown
            .call(&mut self.store, ())
            .with_context(|| format!("{}() failed", name))
    }

    /// Copy a full config buffer into module memory and load it.
    pub fn push_config(&mut self, buf: &[u8]) -> Result<()> {
        let name = abi(self.family).load_config;
        let load = &self.entry.load_config;
        self.alloc.with_block(&mut self.store, buf.len(), |store, ptr, len| {
            write_block(store, ptr, buf)?;
            load.call(&mut *store, (ptr, len))
                .with_context(|| format!("{}() failed", name))
        })
    }

    /// Push raw sample data. Returns `false` if the module has no `load_pcm`.
    pub fn load_pcm(&mut self, data: &[u8]) -> Result<bool> {
        let Some(load) = &self.entry.load_pcm else {
            return Ok(false);
        };
        let name = abi(self.family).load_pcm.unwrap_or("load_pcm");
        self.alloc.with_block(&mut self.store, data.len(), |store, ptr, len| {
            write_block(store, ptr, data)?;
            load.call(&mut *store, (ptr, len))
                .with_context(|| format!("{}() failed", name))
        })?;
        Ok(true)
    }

    /// Ask the module to serialize its current state.
    ///
    /// The module writes at most the family's config size and returns the
    /// length it used. `None` if the module cannot dump.
    pub fn dump_config(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(dump) = &self.entry.dump_config else {
            return Ok(None);
        };
        let name = abi(self.family).dump_config.unwrap_or("dump_config");
        let max = self.family.config_size();
        self.alloc
            .with_block(&mut self.store, max, |store, ptr, max_len| {
                let written = dump
                    .call(&mut *store, (ptr, max_len))
                    .with_context(|| format!("{}() failed", name))?;
                if !(0..=max_len).contains(&written) {
                    anyhow::bail!("{}() reported {} bytes, buffer holds {}", name, written, max);
                }
                let memory = store.data().memory.context("module memory not set")?;
                memory_range(memory.data(&*store), ptr, written)
                    .map(<[u8]>::to_vec)
                    .context("dump range outside module memory")
            })
            .map(Some)
    }

    /// Advance the module by one frame. Returns `false` if it has no tick export.
    pub fn tick(&mut self) -> Result<bool> {
        let Some(tick) = &self.entry.tick else {
            return Ok(false);
        };
        self.ticks += 1;
        tick.call(&mut self.store, ()).map_err(|e| {
            anyhow::anyhow!(
                "{}() failed at tick {}: {:#}",
                abi(self.family).tick.unwrap_or("tick"),
                self.ticks,
                e
            )
        })?;
        Ok(true)
    }

    /// Tell the module which instrument type the next config targets.
    pub fn set_chip_type(&mut self, ins_type: u8) -> Result<bool> {
        let Some(set) = &self.entry.set_chip_type else {
            return Ok(false);
        };
        set.call(&mut self.store, i32::from(ins_type))
            .context("set_chip_type() failed")?;
        Ok(true)
    }

    pub fn has_dump(&self) -> bool {
        self.entry.dump_config.is_some()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn store(&self) -> &Store<BridgeContext> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store<BridgeContext> {
        &mut self.store
    }
}

fn write_block(store: &mut Store<BridgeContext>, ptr: i32, bytes: &[u8]) -> Result<()> {
    let memory = store.data().memory.context("module memory not set")?;
    let offset = usize::try_from(ptr).context("negative pointer")?;
    memory
        .write(&mut *store, offset, bytes)
        .context("buffer does not fit in module memory")
}

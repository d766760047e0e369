//! Shared test utilities for integration and unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chipbridge_codec::{ChipFamily, ConfigPatch};
use hashbrown::HashMap;
use tokio::sync::Semaphore;

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::dispatcher::{InstanceListener, SamplePlayback};
use crate::family::abi;
use crate::registry::{FetchFuture, ModuleSource};
use crate::surface::SurfaceTable;
use crate::wasm::ModuleInstance;

// ============================================================================
// Listener
// ============================================================================

/// Records everything an instance reports
#[derive(Default)]
pub struct RecordingListener {
    patches: Mutex<Vec<ConfigPatch>>,
    samples: Mutex<Vec<SamplePlayback>>,
    stops: AtomicUsize,
}

impl RecordingListener {
    pub fn patches(&self) -> Vec<ConfigPatch> {
        self.patches.lock().unwrap().clone()
    }

    pub fn samples(&self) -> Vec<SamplePlayback> {
        self.samples.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl InstanceListener for RecordingListener {
    fn config_changed(&self, patch: &ConfigPatch) {
        self.patches.lock().unwrap().push(patch.clone());
    }

    fn play_sample(&self, playback: SamplePlayback) {
        self.samples.lock().unwrap().push(playback);
    }

    fn stop_sample(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Module Sources
// ============================================================================

/// In-memory module source that counts fetches
#[derive(Default)]
pub struct StaticModuleSource {
    modules: Mutex<HashMap<String, Vec<u8>>>,
    fetches: AtomicUsize,
}

impl StaticModuleSource {
    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.modules.lock().unwrap().insert(url.into(), bytes);
    }

    /// Register a fixture under its family's default URL
    pub fn with_fixture(self, fixture: FixtureModule) -> Self {
        self.insert(module_url(fixture.family), fixture.wasm());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ModuleSource for StaticModuleSource {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.modules
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no module at {}", url))
        })
    }
}

/// Holds every fetch until [`GatedModuleSource::open`] is called
pub struct GatedModuleSource {
    inner: StaticModuleSource,
    gate: Semaphore,
}

impl GatedModuleSource {
    pub fn new(inner: StaticModuleSource) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(1024);
    }

    pub fn fetches(&self) -> usize {
        self.inner.fetches()
    }
}

impl ModuleSource for GatedModuleSource {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let _permit = self.gate.acquire().await?;
            self.inner.fetch(url).await
        })
    }
}

// ============================================================================
// Fixture Modules
// ============================================================================

/// Memory offsets the fixture module writes its observations to
pub mod fixture {
    pub const WIDTH: usize = 32;
    pub const HEIGHT: usize = 36;
    pub const STARTED: usize = 40;
    pub const SHUTDOWN_QUERY: usize = 44;
    pub const PUSH_LEN: usize = 48;
    pub const PUSH_COUNT: usize = 52;
    pub const TICKS: usize = 56;
    pub const PCM_LEN: usize = 60;
    pub const CHIP_TYPE: usize = 64;
    /// Copy of the last pushed config buffer
    pub const CONFIG_AREA: usize = 1024;
}

/// Something the fixture does on every tick
#[derive(Debug, Clone, Copy)]
pub enum TickAction {
    Param { id: i32, value: i32 },
    PlaySample { len: i32, is_16bit: bool },
    StopSample,
    /// Overwrite a byte of the stored config, as an in-module edit would
    Poke { offset: i32, value: i32 },
}

/// Generates a minimal chip module exporting a family's entry points.
///
/// The constructor looks up the surface alias and traps if it is missing,
/// init binds input to it, and shutdown looks it up again. Config pushes
/// are stored and echoed back by the dump export.
#[derive(Debug, Clone)]
pub struct FixtureModule {
    pub family: ChipFamily,
    factory: bool,
    start: bool,
    failing_init: bool,
    on_tick: Vec<TickAction>,
}

impl FixtureModule {
    pub fn new(family: ChipFamily) -> Self {
        Self {
            family,
            factory: true,
            start: true,
            failing_init: false,
            on_tick: Vec::new(),
        }
    }

    pub fn without_factory(mut self) -> Self {
        self.factory = false;
        self
    }

    pub fn without_start(mut self) -> Self {
        self.start = false;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.failing_init = true;
        self
    }

    pub fn on_tick(mut self, action: TickAction) -> Self {
        self.on_tick.push(action);
        self
    }

    pub fn wat(&self) -> String {
        let abi = abi(self.family);
        let mut funcs = Vec::new();

        if self.factory {
            funcs.push(format!(
                r#"(func (export "{}")
                    (global.set $canvas (call $surface_query (i32.const 16) (i32.const 6)))
                    (if (i32.lt_s (global.get $canvas) (i32.const 0)) (then unreachable))
                    (call $log (i32.const 24) (i32.const 11)))"#,
                abi.factory
            ));
        }

        let trap = if self.failing_init { "unreachable" } else { "" };
        funcs.push(format!(
            r#"(func (export "{}") (param $w i32) (param $h i32)
                {}
                (i32.store (i32.const 32) (local.get $w))
                (i32.store (i32.const 36) (local.get $h))
                (call $surface_bind (global.get $canvas)))"#,
            abi.init, trap
        ));

        if self.start {
            funcs.push(format!(
                r#"(func (export "{}") (i32.store (i32.const 40) (i32.const 1)))"#,
                abi.start
            ));
        }

        funcs.push(format!(
            r#"(func (export "{}")
                (i32.store (i32.const 44) (call $surface_query (i32.const 16) (i32.const 6))))"#,
            abi.shutdown
        ));

        funcs.push(format!(
            r#"(func (export "{}") (param $ptr i32) (param $len i32)
                (memory.copy (i32.const 1024) (local.get $ptr) (local.get $len))
                (i32.store (i32.const 48) (local.get $len))
                (i32.store (i32.const 52) (i32.add (i32.load (i32.const 52)) (i32.const 1))))"#,
            abi.load_config
        ));

        if let Some(dump) = abi.dump_config {
            funcs.push(format!(
                r#"(func (export "{}") (param $ptr i32) (param $max i32) (result i32)
                    (local $n i32)
                    (local.set $n (i32.load (i32.const 48)))
                    (if (i32.gt_u (local.get $n) (local.get $max))
                        (then (local.set $n (local.get $max))))
                    (memory.copy (local.get $ptr) (i32.const 1024) (local.get $n))
                    (local.get $n))"#,
                dump
            ));
        }

        if let Some(load_pcm) = abi.load_pcm {
            funcs.push(format!(
                r#"(func (export "{}") (param $ptr i32) (param $len i32)
                    (i32.store (i32.const 60) (local.get $len)))"#,
                load_pcm
            ));
        }

        if let Some(set) = abi.set_chip_type {
            funcs.push(format!(
                r#"(func (export "{}") (param $t i32) (i32.store (i32.const 64) (local.get $t)))"#,
                set
            ));
        }

        if let Some(tick) = abi.tick {
            let actions: String = self.on_tick.iter().map(TickAction::wat).collect();
            funcs.push(format!(
                r#"(func (export "{}")
                    (i32.store (i32.const 56) (i32.add (i32.load (i32.const 56)) (i32.const 1)))
                    {})"#,
                tick, actions
            ));
        }

        format!(
            r#"(module
                (import "env" "log" (func $log (param i32 i32)))
                (import "env" "surface_query" (func $surface_query (param i32 i32) (result i32)))
                (import "env" "surface_bind" (func $surface_bind (param i32)))
                (import "env" "param_change" (func $param_change (param i32 i32)))
                (import "env" "play_sample" (func $play_sample (param i32 i32 i32 i32 i32 i32)))
                (import "env" "stop_sample" (func $stop_sample))
                (memory (export "memory") 2)
                (data (i32.const 16) "canvas")
                (data (i32.const 24) "constructed")
                (global $heap (mut i32) (i32.const 4096))
                (global $canvas (mut i32) (i32.const -1))
                (func (export "malloc") (param $len i32) (result i32)
                    (local $ptr i32)
                    (local.set $ptr (global.get $heap))
                    (global.set $heap (i32.add (global.get $heap)
                        (i32.and (i32.add (local.get $len) (i32.const 7)) (i32.const -8))))
                    (local.get $ptr))
                (func (export "free") (param i32)
                    (global.set $heap (i32.const 4096)))
                {}
            )"#,
            funcs.join("\n")
        )
    }

    pub fn wasm(&self) -> Vec<u8> {
        wat::parse_str(self.wat()).unwrap()
    }
}

impl TickAction {
    fn wat(&self) -> String {
        match *self {
            TickAction::Param { id, value } => format!(
                "(call $param_change (i32.const {}) (i32.const {}))",
                id, value
            ),
            TickAction::PlaySample { len, is_16bit } => format!(
                "(call $play_sample (i32.const 1024) (i32.const {}) (i32.const 0) (i32.const {}) (i32.const 1) (i32.const {}))",
                len,
                len,
                i32::from(is_16bit)
            ),
            TickAction::StopSample => "(call $stop_sample)".to_string(),
            TickAction::Poke { offset, value } => format!(
                "(i32.store8 (i32.add (i32.const 1024) (i32.const {})) (i32.const {}))",
                offset, value
            ),
        }
    }
}

/// Read a little-endian word the fixture wrote
pub fn fixture_word(instance: &ModuleInstance, offset: usize) -> i32 {
    let store = instance.store();
    let memory = store.data().memory.unwrap();
    let bytes = &memory.data(store)[offset..offset + 4];
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

// ============================================================================
// Bridge
// ============================================================================

/// URL the default config resolves for `family`
pub fn module_url(family: ChipFamily) -> String {
    BridgeConfig::default().descriptor_for(family).url
}

/// Bridge over an in-memory surface table with default config
pub fn test_bridge(source: Arc<dyn ModuleSource>) -> (Bridge, Arc<SurfaceTable>) {
    test_bridge_with(BridgeConfig::default(), source)
}

pub fn test_bridge_with(
    config: BridgeConfig,
    source: Arc<dyn ModuleSource>,
) -> (Bridge, Arc<SurfaceTable>) {
    let table = Arc::new(SurfaceTable::new());
    let bridge = Bridge::with_parts(config, source, table.clone()).unwrap();
    (bridge, table)
}

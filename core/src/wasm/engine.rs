//! WASM engine wrapper for compiling chip modules

use anyhow::{Context, Result};
use wasmtime::{Engine, ExternType, Module};

/// Shared WASM engine (one per bridge)
pub struct WasmEngine {
    engine: Engine,
}

impl WasmEngine {
    pub fn new() -> Result<Self> {
        let mut config = wasmtime::Config::new();
        // Emscripten-style modules rely on bulk memory for memcpy/memset
        config.wasm_bulk_memory(true);
        let engine = Engine::new(&config).context("Failed to create WASM engine")?;
        Ok(Self { engine })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Compile a module from bytes (binary or text format)
    pub fn load_module(&self, bytes: &[u8]) -> Result<Module> {
        Module::new(&self.engine, bytes).context("Failed to compile WASM module")
    }

    /// Check that a module's declared memory fits the per-instance limit.
    ///
    /// Covers both exported and imported memories, so an oversized module
    /// is rejected with a readable message before instantiation.
    pub fn validate_module_memory(module: &Module, ram_limit: usize) -> Result<()> {
        let exported = module.exports().map(|e| (e.name(), e.ty()));
        let imported = module.imports().map(|i| (i.name(), i.ty()));

        for (name, ty) in exported.chain(imported) {
            let ExternType::Memory(mem_type) = ty else {
                continue;
            };
            let min_pages = mem_type.minimum();
            let min_bytes = min_pages.saturating_mul(65536); // WASM pages are 64KB
            if min_bytes > ram_limit as u64 {
                anyhow::bail!(
                    "memory '{}' needs at least {} bytes ({} pages), limit is {} bytes",
                    name,
                    min_bytes,
                    min_pages,
                    ram_limit
                );
            }
            if mem_type.maximum().is_none() {
                tracing::debug!(
                    "memory '{}' declares no maximum; capped at {} bytes",
                    name,
                    ram_limit
                );
            }
        }
        Ok(())
    }
}

// NOTE: no Default impl; engine creation is fallible.

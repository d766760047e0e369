//! WASM runtime wrapper
//!
//! Compiles chip modules with wasmtime and drives their entry points.
//!
//! # Key Types
//!
//! - [`WasmEngine`] - Shared WASM engine (one per bridge)
//! - [`ModuleFactory`] - Compiled module with its host imports linked
//! - [`ModuleInstance`] - Constructed module with resolved entry points
//! - [`BridgeContext`] - Store data reachable from host imports

mod engine;
mod factory;
mod instance;
mod state;


pub use engine::WasmEngine;
pub use factory::ModuleFactory;
pub use instance::ModuleInstance;
pub use state::{BridgeContext, memory_range, memory_str};

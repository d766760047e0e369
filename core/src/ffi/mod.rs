//! Host imports available to chip modules (module `env`)
//!
//! Modules import only what they use; every function here is optional
//! from the module's point of view.

mod callbacks;
mod surface;
mod system;


use anyhow::Result;
use wasmtime::Linker;

use crate::wasm::BridgeContext;

/// Register every bridge import with the linker
pub fn register_bridge_ffi(linker: &mut Linker<BridgeContext>) -> Result<()> {
    // System functions
    linker.func_wrap("env", "log", system::log_message)?;

    // Surface lookup and input wiring
    linker.func_wrap("env", "surface_query", surface::surface_query)?;
    linker.func_wrap("env", "surface_bind", surface::surface_bind)?;

    // Parameter callbacks
    linker.func_wrap("env", "param_change", callbacks::param_change)?;
    linker.func_wrap("env", "op_param_change", callbacks::op_param_change)?;
    linker.func_wrap("env", "algorithm_change", callbacks::algorithm_change)?;
    linker.func_wrap("env", "table_edit", callbacks::table_edit)?;
    linker.func_wrap("env", "table_select", callbacks::table_select)?;
    linker.func_wrap("env", "plist_change", callbacks::plist_change)?;
    linker.func_wrap("env", "plist_length_change", callbacks::plist_length_change)?;

    // Sample preview
    linker.func_wrap("env", "play_sample", callbacks::play_sample)?;
    linker.func_wrap("env", "stop_sample", callbacks::stop_sample)?;

    Ok(())
}

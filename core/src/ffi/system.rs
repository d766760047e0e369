//! Logging FFI

use wasmtime::Caller;

use crate::wasm::{BridgeContext, memory_str};

/// Log a message from the module
pub(super) fn log_message(caller: Caller<'_, BridgeContext>, ptr: i32, len: i32) {
    let ctx = caller.data();
    if let Some(memory) = ctx.memory
        && let Some(msg) = memory_str(memory.data(&caller), ptr, len)
    {
        tracing::info!(family = %ctx.family, surface = %ctx.surface, "[MODULE] {}", msg);
    }
}

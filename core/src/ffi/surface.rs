//! Surface lookup FFI

use wasmtime::Caller;

use crate::surface::SurfaceId;
use crate::wasm::{BridgeContext, memory_str};

/// Look up a surface by name. Returns its handle, or -1 if nothing matches.
pub(super) fn surface_query(caller: Caller<'_, BridgeContext>, ptr: i32, len: i32) -> i32 {
    let ctx = caller.data();
    let Some(memory) = ctx.memory else {
        return -1;
    };
    let Some(name) = memory_str(memory.data(&caller), ptr, len) else {
        tracing::warn!(surface = %ctx.surface, "surface_query with invalid name");
        return -1;
    };
    match ctx.host.query(name, ctx.surface) {
        Some(found) => found.handle(),
        None => {
            tracing::debug!(surface = %ctx.surface, name, "surface_query found nothing");
            -1
        }
    }
}

/// Attach the module's input handling to a surface handle
pub(super) fn surface_bind(caller: Caller<'_, BridgeContext>, handle: i32) {
    let ctx = caller.data();
    match SurfaceId::from_handle(handle) {
        Some(target) => ctx.host.bind_input(target, ctx.surface),
        None => tracing::warn!(surface = %ctx.surface, handle, "surface_bind with invalid handle"),
    }
}

//! Parameter and sample callbacks raised by the module

use chipbridge_codec::ParamEvent;
use chipbridge_codec::hively::PerfEntry;
use wasmtime::Caller;

use crate::dispatcher::{LoopKind, SamplePlayback};
use crate::wasm::{BridgeContext, memory_range};

fn narrow_u8(value: i32) -> u8 {
    value.clamp(0, u8::MAX as i32) as u8
}

fn dispatch(caller: &Caller<'_, BridgeContext>, event: ParamEvent) {
    let ctx = caller.data();
    match &ctx.dispatcher {
        Some(dispatcher) => dispatcher.on_event(event),
        None => tracing::warn!(
            family = %ctx.family,
            surface = %ctx.surface,
            ?event,
            "event raised before callbacks were installed"
        ),
    }
}

fn rejected(caller: &Caller<'_, BridgeContext>, callback: &str, value: i32) {
    let ctx = caller.data();
    tracing::warn!(family = %ctx.family, surface = %ctx.surface, callback, value, "out of range callback argument");
}

pub(super) fn param_change(caller: Caller<'_, BridgeContext>, id: i32, value: i32) {
    match u32::try_from(id) {
        Ok(id) => dispatch(&caller, ParamEvent::Param { id, value }),
        Err(_) => rejected(&caller, "param_change", id),
    }
}

pub(super) fn op_param_change(caller: Caller<'_, BridgeContext>, op: i32, id: i32, value: i32) {
    match (u8::try_from(op), u32::try_from(id)) {
        (Ok(op), Ok(id)) => dispatch(&caller, ParamEvent::OpParam { op, id, value }),
        (Err(_), _) => rejected(&caller, "op_param_change", op),
        (_, Err(_)) => rejected(&caller, "op_param_change", id),
    }
}

pub(super) fn algorithm_change(caller: Caller<'_, BridgeContext>, alg: i32) {
    dispatch(&caller, ParamEvent::Algorithm(narrow_u8(alg)));
}

pub(super) fn table_edit(caller: Caller<'_, BridgeContext>, index: i32, value: i32) {
    match u16::try_from(index) {
        Ok(index) => dispatch(&caller, ParamEvent::TableEdit { index, value }),
        Err(_) => rejected(&caller, "table_edit", index),
    }
}

pub(super) fn table_select(caller: Caller<'_, BridgeContext>, table: i32) {
    match u8::try_from(table) {
        Ok(table) => dispatch(&caller, ParamEvent::TableSelect(table)),
        Err(_) => rejected(&caller, "table_select", table),
    }
}

#[allow(clippy::too_many_arguments)]
pub(super) fn plist_change(
    caller: Caller<'_, BridgeContext>,
    index: i32,
    note: i32,
    waveform: i32,
    fixed: i32,
    fx0: i32,
    fx_param0: i32,
    fx1: i32,
    fx_param1: i32,
) {
    let Ok(index) = u16::try_from(index) else {
        return rejected(&caller, "plist_change", index);
    };
    let entry = PerfEntry {
        note: narrow_u8(note),
        waveform: narrow_u8(waveform),
        fixed: fixed != 0,
        fx: [narrow_u8(fx0), narrow_u8(fx1)],
        fx_param: [narrow_u8(fx_param0), narrow_u8(fx_param1)],
    };
    dispatch(&caller, ParamEvent::PlistEntry { index, entry });
}

pub(super) fn plist_length_change(caller: Caller<'_, BridgeContext>, len: i32) {
    match u16::try_from(len) {
        Ok(len) => dispatch(&caller, ParamEvent::PlistLength(len)),
        Err(_) => rejected(&caller, "plist_length_change", len),
    }
}

/// Copy `len` samples at `ptr` out of linear memory and hand them to the host.
///
/// The module may reuse the buffer as soon as this returns.
pub(super) fn play_sample(
    caller: Caller<'_, BridgeContext>,
    ptr: i32,
    len: i32,
    loop_start: i32,
    loop_len: i32,
    loop_type: i32,
    is_16bit: i32,
) {
    let ctx = caller.data();
    let Some(dispatcher) = &ctx.dispatcher else {
        tracing::warn!(family = %ctx.family, "play_sample before callbacks were installed");
        return;
    };
    let Some(memory) = ctx.memory else {
        return;
    };
    let is_16bit = is_16bit != 0;
    let byte_len = len.checked_mul(if is_16bit { 2 } else { 1 });
    let data = byte_len.and_then(|n| memory_range(memory.data(&caller), ptr, n));
    let Some(data) = data else {
        return rejected(&caller, "play_sample", len);
    };

    dispatcher.on_play_sample(SamplePlayback {
        data: data.to_vec(),
        samples: len.unsigned_abs(),
        loop_start: loop_start.max(0).unsigned_abs(),
        loop_len: loop_len.max(0).unsigned_abs(),
        loop_kind: LoopKind::from_raw(loop_type),
        is_16bit,
    });
}

pub(super) fn stop_sample(caller: Caller<'_, BridgeContext>) {
    if let Some(dispatcher) = &caller.data().dispatcher {
        dispatcher.on_stop_sample();
    }
}

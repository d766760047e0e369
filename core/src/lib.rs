//! ChipBridge Core - Hosts chip emulator modules
//!
//! Loads native emulator modules compiled to WebAssembly, gives each one a
//! drawable surface, and keeps the host's config in sync with the module's
//! internal state in both directions.
//!
//! # Architecture
//!
//! - [`Bridge`] - Process-wide registry and surface arbiter; mounts instances
//! - [`ModuleRegistry`] - Fetches and compiles each module URL once
//! - [`SurfaceArbiter`] - Lends the well-known surface alias one instance at a time
//! - [`InstanceController`] - One mounted module from construction to disposal
//! - [`CallbackDispatcher`] - Turns module callbacks into config patches

pub mod bridge;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod family;
pub mod ffi;
#[cfg(test)]
mod integration;
pub mod registry;
pub mod surface;
#[cfg(test)]
pub mod test_utils;
pub mod wasm;

pub use bridge::Bridge;
pub use config::{BridgeConfig, ModuleOverride, RuntimeConfig};
pub use controller::{InstanceController, InstanceStatus};
pub use dispatcher::{CallbackDispatcher, InstanceListener, LoopKind, SamplePlayback, SharedConfig};
pub use error::BridgeError;
pub use family::{FamilyAbi, abi};
pub use registry::{ModuleDescriptor, ModuleRegistry, ModuleSource};
pub use surface::{SURFACE_ALIAS, SurfaceArbiter, SurfaceEvent, SurfaceHost, SurfaceId, SurfaceTable};
pub use wasm::{ModuleFactory, ModuleInstance, WasmEngine};

pub use chipbridge_codec as codec;

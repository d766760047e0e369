//! Per-instance store data

use std::sync::Arc;

use chipbridge_codec::ChipFamily;
use wasmtime::{Memory, StoreLimits, StoreLimitsBuilder};

use crate::dispatcher::CallbackDispatcher;
use crate::surface::{SurfaceHost, SurfaceId};

/// Data owned by one module instance's `Store`, reachable from host imports.
pub struct BridgeContext {
    pub family: ChipFamily,
    /// Permanent id of the instance's surface
    pub surface: SurfaceId,
    pub host: Arc<dyn SurfaceHost>,
    /// Linear memory (set after instantiation)
    pub memory: Option<Memory>,
    /// Callback sink; events raised before it is installed are dropped
    pub dispatcher: Option<CallbackDispatcher>,
    limits: StoreLimits,
}

impl BridgeContext {
    pub fn new(
        family: ChipFamily,
        surface: SurfaceId,
        host: Arc<dyn SurfaceHost>,
        ram_limit: usize,
    ) -> Self {
        Self {
            family,
            surface,
            host,
            memory: None,
            dispatcher: None,
            limits: StoreLimitsBuilder::new().memory_size(ram_limit).build(),
        }
    }

    pub(crate) fn limits_mut(&mut self) -> &mut StoreLimits {
        &mut self.limits
    }
}

/// Bounds-checked `[ptr, ptr + len)` view of linear memory
pub fn memory_range(data: &[u8], ptr: i32, len: i32) -> Option<&[u8]> {
    let start = usize::try_from(ptr).ok()?;
    let len = usize::try_from(len).ok()?;
    data.get(start..start.checked_add(len)?)
}

/// Read a UTF-8 string out of linear memory
pub fn memory_str(data: &[u8], ptr: i32, len: i32) -> Option<&str> {
    memory_range(data, ptr, len).and_then(|bytes| std::str::from_utf8(bytes).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_range_bounds() {
        let data = [1u8, 2, 3, 4];
        assert_eq!(memory_range(&data, 1, 2), Some(&[2u8, 3][..]));
        assert_eq!(memory_range(&data, 0, 4), Some(&data[..]));
        assert_eq!(memory_range(&data, 3, 2), None);
        assert_eq!(memory_range(&data, -1, 1), None);
        assert_eq!(memory_range(&data, 0, -1), None);
        assert_eq!(memory_range(&data, i32::MAX, i32::MAX), None);
    }

    #[test]
    fn test_memory_str() {
        let data = b"xxcanvas";
        assert_eq!(memory_str(data, 2, 6), Some("canvas"));
        assert_eq!(memory_str(&[0xFF, 0xFE], 0, 2), None);
    }
}

//! Parameter events reported by a running module

use crate::hively::PerfEntry;

/// One change reported by the native side through a host callback.
///
/// Values arrive as raw `i32` from the module; each family narrows them
/// into its own field types when computing a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamEvent {
    /// `param_change(id, value)`
    Param { id: u32, value: i32 },
    /// `op_param_change(op, id, value)` for multi-operator families
    OpParam { op: u8, id: u32, value: i32 },
    /// `algorithm_change(alg)`
    Algorithm(u8),
    /// `table_edit(index, value)`: one step of a wave or macro table
    TableEdit { index: u16, value: i32 },
    /// `table_select(table)`: active logical table changed
    TableSelect(u8),
    /// `plist_change(...)`: one performance list row
    PlistEntry { index: u16, entry: PerfEntry },
    /// `plist_length_change(len)`
    PlistLength(u16),
}

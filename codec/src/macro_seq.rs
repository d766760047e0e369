//! Macro sequence editor, 264-byte layout
//!
//! The host keeps eight tables; the buffer only carries the active one.
//!
//! ```text
//! [0] active table [1] length [2] loop position [3] release position
//! [4..260] table values (i8)
//! [260] min (i8) [261] max (i8) [262] mode [263] reserved
//! ```
//!
//! A loop or release byte of 255 means "unset".

use serde::{Deserialize, Serialize};

use crate::bytes::{clamp_i8, clamp_u8, get_i8, put_i8};
use crate::error::{CodecError, check_len};
use crate::{ChipCodec, ChipFamily, ParamEvent};

pub const CONFIG_SIZE: usize = 264;
pub const HEADER_SIZE: usize = 4;
pub const TABLE_COUNT: usize = 8;
/// Longest table the length byte can describe
pub const MAX_LEN: usize = 255;
pub const UNSET: u8 = 255;

pub const PARAM_TAB_SELECT: u32 = 0;
pub const PARAM_LOOP_POS: u32 = 1;
pub const PARAM_REL_POS: u32 = 2;
pub const PARAM_MACRO_LEN: u32 = 3;
pub const PARAM_MACRO_MODE: u32 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroKind {
    #[default]
    Vol,
    Arp,
    Duty,
    Wave,
    Pitch,
    Ex1,
    Ex2,
    Ex3,
}

impl MacroKind {
    pub const ALL: [MacroKind; TABLE_COUNT] = [
        MacroKind::Vol,
        MacroKind::Arp,
        MacroKind::Duty,
        MacroKind::Wave,
        MacroKind::Pitch,
        MacroKind::Ex1,
        MacroKind::Ex2,
        MacroKind::Ex3,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Value range an empty table of this kind starts with
    pub fn default_range(self) -> (i8, i8) {
        match self {
            MacroKind::Arp | MacroKind::Pitch => (-127, 127),
            _ => (0, 15),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroMode {
    #[default]
    Sequence,
    Adsr,
    Lfo,
}

impl MacroMode {
    fn from_byte(b: u8) -> Self {
        match b {
            1 => MacroMode::Adsr,
            2 => MacroMode::Lfo,
            _ => MacroMode::Sequence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroTable {
    pub values: Vec<i8>,
    pub loop_pos: Option<u8>,
    pub release_pos: Option<u8>,
    pub min: i8,
    pub max: i8,
    pub mode: MacroMode,
}

impl Default for MacroTable {
    fn default() -> Self {
        Self::for_kind(MacroKind::Vol)
    }
}

impl MacroTable {
    pub fn for_kind(kind: MacroKind) -> Self {
        let (min, max) = kind.default_range();
        Self {
            values: Vec::new(),
            loop_pos: None,
            release_pos: None,
            min,
            max,
            mode: MacroMode::Sequence,
        }
    }

    fn meta(&self) -> MacroMeta {
        MacroMeta {
            len: self.values.len().min(MAX_LEN) as u8,
            loop_pos: self.loop_pos,
            release_pos: self.release_pos,
            mode: self.mode,
        }
    }
}

fn position_byte(pos: Option<u8>) -> u8 {
    pos.unwrap_or(UNSET)
}

fn position_from_byte(b: u8) -> Option<u8> {
    (b != UNSET).then_some(b)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroConfig {
    pub active: MacroKind,
    pub tables: [MacroTable; TABLE_COUNT],
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            active: MacroKind::Vol,
            tables: MacroKind::ALL.map(MacroTable::for_kind),
        }
    }
}

impl MacroConfig {
    pub fn active_table(&self) -> &MacroTable {
        &self.tables[self.active as usize]
    }
}

/// Per-table metadata edited in the module's bottom bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroMeta {
    pub len: u8,
    pub loop_pos: Option<u8>,
    pub release_pos: Option<u8>,
    pub mode: MacroMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MacroPatch {
    ActiveTable(MacroKind),
    Step { table: MacroKind, index: u8, value: i8 },
    Meta { table: MacroKind, meta: MacroMeta },
}

impl ChipCodec for MacroConfig {
    const FAMILY: ChipFamily = ChipFamily::Macro;
    const CONFIG_SIZE: usize = CONFIG_SIZE;
    type Patch = MacroPatch;

    fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; CONFIG_SIZE];
        let table = self.active_table();
        let len = table.values.len().min(MAX_LEN);
        buf[0] = self.active as u8;
        buf[1] = len as u8;
        buf[2] = position_byte(table.loop_pos);
        buf[3] = position_byte(table.release_pos);
        for (i, &v) in table.values[..len].iter().enumerate() {
            put_i8(&mut buf, HEADER_SIZE + i, v);
        }
        put_i8(&mut buf, 260, table.min);
        put_i8(&mut buf, 261, table.max);
        buf[262] = table.mode as u8;
        buf
    }

    fn decode(buf: &[u8], existing: &Self) -> Result<Self, CodecError> {
        check_len(ChipFamily::Macro, buf, CONFIG_SIZE)?;
        let mut out = existing.clone();
        out.active = MacroKind::from_index(buf[0]).unwrap_or_default();
        let len = buf[1] as usize;
        let table = &mut out.tables[out.active as usize];
        table.values = (0..len).map(|i| get_i8(buf, HEADER_SIZE + i)).collect();
        table.loop_pos = position_from_byte(buf[2]);
        table.release_pos = position_from_byte(buf[3]);
        table.min = get_i8(buf, 260);
        table.max = get_i8(buf, 261);
        table.mode = MacroMode::from_byte(buf[262]);
        Ok(out)
    }

    fn patch_for_event(&self, event: &ParamEvent) -> Option<MacroPatch> {
        let table = self.active;
        match *event {
            ParamEvent::TableSelect(tab) => MacroKind::from_index(tab).map(MacroPatch::ActiveTable),
            ParamEvent::TableEdit { index, value } if (index as usize) < MAX_LEN => {
                Some(MacroPatch::Step { table, index: index as u8, value: clamp_i8(value) })
            }
            ParamEvent::Param { id: PARAM_TAB_SELECT, value } => {
                MacroKind::from_index(clamp_u8(value)).map(MacroPatch::ActiveTable)
            }
            ParamEvent::Param { id, value } => {
                let mut meta = self.active_table().meta();
                let position = (0..UNSET as i32).contains(&value).then_some(value as u8);
                match id {
                    PARAM_LOOP_POS => meta.loop_pos = position,
                    PARAM_REL_POS => meta.release_pos = position,
                    PARAM_MACRO_LEN => meta.len = clamp_u8(value),
                    PARAM_MACRO_MODE => meta.mode = MacroMode::from_byte(clamp_u8(value)),
                    _ => return None,
                }
                Some(MacroPatch::Meta { table, meta })
            }
            _ => None,
        }
    }

    fn merge(&mut self, patch: &MacroPatch) {
        match *patch {
            MacroPatch::ActiveTable(kind) => self.active = kind,
            MacroPatch::Step { table, index, value } => {
                let values = &mut self.tables[table as usize].values;
                let index = index as usize;
                if index >= values.len() {
                    values.resize(index + 1, 0);
                }
                values[index] = value;
            }
            MacroPatch::Meta { table, meta } => {
                let t = &mut self.tables[table as usize];
                t.values.resize(meta.len as usize, 0);
                t.loop_pos = meta.loop_pos;
                t.release_pos = meta.release_pos;
                t.mode = meta.mode;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arp_config() -> MacroConfig {
        let mut config = MacroConfig { active: MacroKind::Arp, ..MacroConfig::default() };
        let arp = &mut config.tables[MacroKind::Arp as usize];
        arp.values = vec![0, 12, -12, 7];
        arp.loop_pos = Some(1);
        config
    }

    #[test]
    fn test_header_and_sentinels() {
        let buf = arp_config().encode();
        assert_eq!(buf.len(), CONFIG_SIZE);
        assert_eq!(&buf[..4], &[1, 4, 1, UNSET]);
        assert_eq!(&buf[4..8], &[0, 12, 0xF4, 7]);
        assert_eq!(buf[260] as i8, -127);
        assert_eq!(buf[261] as i8, 127);
    }

    #[test]
    fn test_round_trip_only_touches_active_table() {
        let mut existing = arp_config();
        existing.tables[0].values = vec![15, 10, 5];
        let decoded = MacroConfig::decode(&existing.encode(), &existing).unwrap();
        assert_eq!(decoded, existing);

        // A buffer for the volume table leaves the arp table alone
        let mut vol_buf = vec![0u8; CONFIG_SIZE];
        vol_buf[1] = 2;
        vol_buf[2] = UNSET;
        vol_buf[3] = 0;
        vol_buf[4] = 9;
        let merged = MacroConfig::decode(&vol_buf, &existing).unwrap();
        assert_eq!(merged.tables[0].values, vec![9, 0]);
        assert_eq!(merged.tables[0].release_pos, Some(0));
        assert_eq!(merged.tables[1], existing.tables[1]);
    }

    #[test]
    fn test_long_table_is_capped() {
        let mut config = MacroConfig::default();
        config.tables[0].values = vec![1; 300];
        let buf = config.encode();
        assert_eq!(buf[1] as usize, MAX_LEN);
        assert_eq!(buf[4 + MAX_LEN], 0);
    }

    #[test]
    fn test_edit_event_targets_active_table() {
        let mut config = arp_config();
        let patch = config.apply_event(&ParamEvent::TableEdit { index: 2, value: -5 });
        assert_eq!(patch, Some(MacroPatch::Step { table: MacroKind::Arp, index: 2, value: -5 }));
        assert_eq!(config.tables[1].values, vec![0, 12, -5, 7]);
        assert!(config.tables[0].values.is_empty());
    }

    #[test]
    fn test_tab_change_and_metadata() {
        let mut config = arp_config();
        assert_eq!(
            config.apply_event(&ParamEvent::TableSelect(4)),
            Some(MacroPatch::ActiveTable(MacroKind::Pitch))
        );
        config.apply_event(&ParamEvent::Param { id: PARAM_MACRO_LEN, value: 3 });
        config.apply_event(&ParamEvent::Param { id: PARAM_LOOP_POS, value: 255 });
        config.apply_event(&ParamEvent::Param { id: PARAM_MACRO_MODE, value: 2 });
        let pitch = &config.tables[MacroKind::Pitch as usize];
        assert_eq!(pitch.values, vec![0, 0, 0]);
        assert_eq!(pitch.loop_pos, None);
        assert_eq!(pitch.mode, MacroMode::Lfo);
        assert_eq!(config.apply_event(&ParamEvent::TableSelect(8)), None);
    }
}

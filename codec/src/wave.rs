//! Wavetable family, 300-byte layout
//!
//! ```text
//! [0] subtype [1] wave count [2] current wave [3] wave length (256 sent as 0)
//! [4..260]    sample data
//! [260..296]  FDS modulation: 32 x i8 table, speed u16, depth, reserved
//! [296..300]  N163: position, length, mode, reserved
//! ```

use serde::{Deserialize, Serialize};

use crate::bytes::{clamp_u8, clamp_u16, get_i8, get_u16, is_zeroed, put_i8, put_u16};
use crate::error::{CodecError, check_len};
use crate::{ChipCodec, ChipFamily, ParamEvent};

pub const CONFIG_SIZE: usize = 300;
pub const HEADER_SIZE: usize = 4;
pub const MAX_WAVE_LEN: usize = 256;
const FDS_OFFSET: usize = 260;
const FDS_SIZE: usize = 36;
const N163_OFFSET: usize = 296;

pub const PARAM_WAVE_SELECT: u32 = 0;
pub const PARAM_WAVE_LEN: u32 = 1;
pub const PARAM_FDS_MOD_SPEED: u32 = 2;
pub const PARAM_FDS_MOD_DEPTH: u32 = 3;
pub const PARAM_N163_POS: u32 = 4;
pub const PARAM_N163_LEN: u32 = 5;
pub const PARAM_N163_MODE: u32 = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WaveChip {
    #[default]
    Scc,
    N163,
    Fds,
    Pce,
    Vb,
    Swan,
    Lynx,
    X1010,
    Bubble,
    Namco,
}

impl WaveChip {
    pub const ALL: [WaveChip; 10] = [
        WaveChip::Scc,
        WaveChip::N163,
        WaveChip::Fds,
        WaveChip::Pce,
        WaveChip::Vb,
        WaveChip::Swan,
        WaveChip::Lynx,
        WaveChip::X1010,
        WaveChip::Bubble,
        WaveChip::Namco,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Native wave length of the chip
    pub fn wave_len(self) -> u16 {
        match self {
            WaveChip::Fds => 64,
            WaveChip::X1010 => 128,
            _ => 32,
        }
    }

    /// Largest sample value the chip stores
    pub fn max_value(self) -> u8 {
        match self {
            WaveChip::Scc | WaveChip::Lynx | WaveChip::X1010 => 255,
            WaveChip::Fds | WaveChip::Vb => 63,
            WaveChip::Pce => 31,
            WaveChip::N163 | WaveChip::Swan | WaveChip::Bubble | WaveChip::Namco => 15,
        }
    }
}

fn is_valid_len(len: u16) -> bool {
    matches!(len, 32 | 64 | 128 | 256)
}

/// FDS modulation unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FdsModulation {
    pub table: [i8; 32],
    pub speed: u16,
    pub depth: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct N163Settings {
    pub position: u8,
    pub length: u8,
    pub mode: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    pub subtype: WaveChip,
    pub wave_count: u8,
    pub current_wave: u8,
    /// 32, 64, 128 or 256; anything else falls back to the chip's native length
    pub wave_len: u16,
    /// Samples of the current wave. Padded with zeros or cut to `wave_len` on the
    /// wire; see [`WaveConfig::normalized`].
    pub data: Vec<u8>,
    pub fds: Option<FdsModulation>,
    pub n163: Option<N163Settings>,
}

impl Default for WaveConfig {
    fn default() -> Self {
        let chip = WaveChip::default();
        Self {
            subtype: chip,
            wave_count: 1,
            current_wave: 0,
            wave_len: chip.wave_len(),
            data: vec![0; chip.wave_len() as usize],
            fds: None,
            n163: None,
        }
    }
}

impl WaveConfig {
    pub fn effective_len(&self) -> u16 {
        if is_valid_len(self.wave_len) {
            self.wave_len
        } else {
            self.subtype.wave_len()
        }
    }

    /// The config as the wire carries it: `wave_len` resolved, `data` padded or
    /// cut to that length and samples clamped to the chip's range.
    ///
    /// `decode(&encode(c), c)` equals `c.normalized()`.
    pub fn normalized(&self) -> Self {
        let len = self.effective_len();
        let max = self.subtype.max_value();
        let mut data: Vec<u8> = self.data.iter().map(|&v| v.min(max)).collect();
        data.resize(len as usize, 0);
        Self { wave_len: len, data, ..self.clone() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WavePatch {
    CurrentWave(u8),
    WaveLen(u16),
    Sample { index: u16, value: u8 },
    Fds(FdsModulation),
    N163(N163Settings),
}

impl ChipCodec for WaveConfig {
    const FAMILY: ChipFamily = ChipFamily::Wave;
    const CONFIG_SIZE: usize = CONFIG_SIZE;
    type Patch = WavePatch;

    fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; CONFIG_SIZE];
        let len = self.effective_len();
        buf[0] = self.subtype as u8;
        buf[1] = self.wave_count.max(1);
        buf[2] = self.current_wave;
        buf[3] = (len & 0xFF) as u8;

        let max = self.subtype.max_value();
        for (dst, &v) in buf[HEADER_SIZE..HEADER_SIZE + len as usize].iter_mut().zip(&self.data) {
            *dst = v.min(max);
        }

        if let Some(fds) = &self.fds {
            for (i, &v) in fds.table.iter().enumerate() {
                put_i8(&mut buf, FDS_OFFSET + i, v);
            }
            put_u16(&mut buf, FDS_OFFSET + 32, fds.speed);
            buf[FDS_OFFSET + 34] = fds.depth;
        }
        if let Some(n163) = &self.n163 {
            buf[N163_OFFSET] = n163.position;
            buf[N163_OFFSET + 1] = n163.length;
            buf[N163_OFFSET + 2] = n163.mode;
        }
        buf
    }

    fn decode(buf: &[u8], existing: &Self) -> Result<Self, CodecError> {
        check_len(ChipFamily::Wave, buf, CONFIG_SIZE)?;
        let mut out = existing.clone();
        out.subtype = WaveChip::from_index(buf[0]).unwrap_or_default();
        out.wave_count = buf[1].max(1);
        out.current_wave = buf[2];
        out.wave_len = match buf[3] {
            0 => 256,
            b if is_valid_len(b as u16) => b as u16,
            _ => out.subtype.wave_len(),
        };
        let len = out.wave_len as usize;
        out.data = buf[HEADER_SIZE..HEADER_SIZE + len].to_vec();

        let fds = &buf[FDS_OFFSET..FDS_OFFSET + FDS_SIZE];
        if out.fds.is_some() || !is_zeroed(fds) {
            let mut table = [0i8; 32];
            for (i, v) in table.iter_mut().enumerate() {
                *v = get_i8(fds, i);
            }
            out.fds = Some(FdsModulation {
                table,
                speed: get_u16(fds, 32),
                depth: fds[34],
            });
        }
        let n163 = &buf[N163_OFFSET..N163_OFFSET + 3];
        if out.n163.is_some() || !is_zeroed(n163) {
            out.n163 = Some(N163Settings {
                position: n163[0],
                length: n163[1],
                mode: n163[2],
            });
        }
        Ok(out)
    }

    fn patch_for_event(&self, event: &ParamEvent) -> Option<WavePatch> {
        match *event {
            ParamEvent::TableEdit { index, value } if index < self.effective_len() => {
                Some(WavePatch::Sample { index, value: clamp_u8(value) })
            }
            ParamEvent::Param { id, value } => {
                let byte = clamp_u8(value);
                let mut fds = self.fds.unwrap_or_default();
                let mut n163 = self.n163.unwrap_or_default();
                let patch = match id {
                    PARAM_WAVE_SELECT => WavePatch::CurrentWave(byte),
                    PARAM_WAVE_LEN if value >= 0 && is_valid_len(clamp_u16(value)) => {
                        WavePatch::WaveLen(clamp_u16(value))
                    }
                    PARAM_FDS_MOD_SPEED => {
                        fds.speed = clamp_u16(value);
                        WavePatch::Fds(fds)
                    }
                    PARAM_FDS_MOD_DEPTH => {
                        fds.depth = byte;
                        WavePatch::Fds(fds)
                    }
                    PARAM_N163_POS => {
                        n163.position = byte;
                        WavePatch::N163(n163)
                    }
                    PARAM_N163_LEN => {
                        n163.length = byte;
                        WavePatch::N163(n163)
                    }
                    PARAM_N163_MODE => {
                        n163.mode = byte;
                        WavePatch::N163(n163)
                    }
                    _ => return None,
                };
                Some(patch)
            }
            _ => None,
        }
    }

    fn merge(&mut self, patch: &WavePatch) {
        match *patch {
            WavePatch::CurrentWave(wave) => self.current_wave = wave,
            WavePatch::WaveLen(len) => {
                self.wave_len = len;
                self.data.resize(len as usize, 0);
            }
            WavePatch::Sample { index, value } => {
                let index = index as usize;
                if index >= self.data.len() {
                    self.data.resize(index + 1, 0);
                }
                self.data[index] = value;
            }
            WavePatch::Fds(fds) => self.fds = Some(fds),
            WavePatch::N163(n163) => self.n163 = Some(n163),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize, max: u8) -> Vec<u8> {
        (0..len).map(|i| (i * max as usize / len) as u8).collect()
    }

    #[test]
    fn test_full_length_wave_encodes_as_zero() {
        let config = WaveConfig {
            subtype: WaveChip::X1010,
            wave_len: 256,
            data: ramp(256, 255),
            ..WaveConfig::default()
        };
        let buf = config.encode();
        assert_eq!(buf.len(), CONFIG_SIZE);
        assert_eq!(buf[3], 0);
        assert_eq!(buf[4 + 255], 254);
        assert_eq!(WaveConfig::decode(&buf, &config).unwrap(), config);
    }

    #[test]
    fn test_fds_block_round_trip() {
        let mut table = [0i8; 32];
        table[0] = -4;
        table[31] = 3;
        let config = WaveConfig {
            subtype: WaveChip::Fds,
            wave_len: 64,
            data: ramp(64, 63),
            fds: Some(FdsModulation { table, speed: 1000, depth: 40 }),
            ..WaveConfig::default()
        };
        let buf = config.encode();
        assert_eq!(buf[260], 0xFC);
        assert_eq!(&buf[292..295], &[0xE8, 0x03, 40]);
        assert_eq!(&buf[296..300], &[0, 0, 0, 0]);
        assert_eq!(WaveConfig::decode(&buf, &config).unwrap(), config);
    }

    #[test]
    fn test_short_data_is_padded() {
        let config = WaveConfig { data: vec![7, 7], ..WaveConfig::default() };
        let buf = config.encode();
        assert_eq!(&buf[4..8], &[7, 7, 0, 0]);
        let decoded = WaveConfig::decode(&buf, &config).unwrap();
        assert_eq!(decoded.data.len(), 32);
        assert_eq!(decoded, config.normalized());
    }

    #[test]
    fn test_decode_matches_normalized_config() {
        let long = WaveConfig {
            subtype: WaveChip::Pce,
            wave_len: 32,
            data: vec![40; 48],
            ..WaveConfig::default()
        };
        let normalized = long.normalized();
        assert_eq!(normalized.data, vec![31; 32]);
        assert_eq!(WaveConfig::decode(&long.encode(), &long).unwrap(), normalized);

        let odd = WaveConfig { subtype: WaveChip::Fds, wave_len: 50, ..WaveConfig::default() };
        let normalized = odd.normalized();
        assert_eq!(normalized.wave_len, 64);
        assert_eq!(normalized.normalized(), normalized);
        assert_eq!(WaveConfig::decode(&odd.encode(), &odd).unwrap(), normalized);
    }

    #[test]
    fn test_draw_past_wave_length_ignored() {
        let mut config = WaveConfig { wave_len: 32, ..WaveConfig::default() };
        assert_eq!(config.apply_event(&ParamEvent::TableEdit { index: 40, value: 9 }), None);
        assert_eq!(config.data.len(), 32);
    }

    #[test]
    fn test_samples_clamped_to_chip_range() {
        let config = WaveConfig {
            subtype: WaveChip::Pce,
            data: vec![200; 32],
            ..WaveConfig::default()
        };
        assert_eq!(config.encode()[4], 31);
    }

    #[test]
    fn test_invalid_length_uses_chip_default() {
        let config = WaveConfig { subtype: WaveChip::Fds, wave_len: 50, ..WaveConfig::default() };
        assert_eq!(config.encode()[3], 64);
    }

    #[test]
    fn test_draw_event_patches_one_sample() {
        let mut config = WaveConfig::default();
        let patch = config.apply_event(&ParamEvent::TableEdit { index: 5, value: 200 });
        assert_eq!(patch, Some(WavePatch::Sample { index: 5, value: 200 }));
        assert_eq!(config.data[5], 200);
        assert_eq!(config.data.iter().filter(|&&v| v != 0).count(), 1);
    }

    #[test]
    fn test_length_event_resizes() {
        let mut config = WaveConfig::default();
        config.apply_event(&ParamEvent::Param { id: PARAM_WAVE_LEN, value: 128 });
        assert_eq!(config.wave_len, 128);
        assert_eq!(config.data.len(), 128);
        assert_eq!(config.apply_event(&ParamEvent::Param { id: PARAM_WAVE_LEN, value: 100 }), None);
    }

    #[test]
    fn test_n163_event() {
        let mut config = WaveConfig { subtype: WaveChip::N163, ..WaveConfig::default() };
        config.apply_event(&ParamEvent::Param { id: PARAM_N163_LEN, value: 16 });
        assert_eq!(config.n163, Some(N163Settings { position: 0, length: 16, mode: 0 }));
        assert!(config.fds.is_none());
    }
}

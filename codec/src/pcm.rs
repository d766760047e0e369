//! PCM family: sample-playback chips, 20-byte layout
//!
//! ```text
//! [0] subtype  [1] bit depth  [2] loop enable  [3] loop mode
//! [4..6] sample rate (u16)    [6] filter enable [7] reserved
//! [8..12] loop start (u32)    [12..16] loop end (u32)
//! [16..18] k1 (u16)           [18..20] k2 (u16)
//! ```

use serde::{Deserialize, Serialize};

use crate::bytes::{clamp_u16, get_u16, get_u32, is_zeroed, put_u16, put_u32};
use crate::error::{CodecError, check_len};
use crate::{ChipCodec, ChipFamily, ParamEvent};

pub const CONFIG_SIZE: usize = 20;

pub const PARAM_SAMPLE_RATE: u32 = 0;
pub const PARAM_BIT_DEPTH: u32 = 1;
pub const PARAM_LOOP_ENABLE: u32 = 2;
pub const PARAM_LOOP_MODE: u32 = 3;
pub const PARAM_LOOP_START: u32 = 4;
pub const PARAM_LOOP_END: u32 = 5;
pub const PARAM_FILTER_ENABLE: u32 = 6;
pub const PARAM_FILTER_K1: u32 = 7;
pub const PARAM_FILTER_K2: u32 = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PcmChip {
    #[default]
    SegaPcm,
    QSound,
    Es5506,
    Rf5c68,
    C140,
    K007232,
    K053260,
    Ga20,
    Oki,
    Ymz280b,
    MultiPcm,
    Amiga,
}

impl PcmChip {
    pub const ALL: [PcmChip; 12] = [
        PcmChip::SegaPcm,
        PcmChip::QSound,
        PcmChip::Es5506,
        PcmChip::Rf5c68,
        PcmChip::C140,
        PcmChip::K007232,
        PcmChip::K053260,
        PcmChip::Ga20,
        PcmChip::Oki,
        PcmChip::Ymz280b,
        PcmChip::MultiPcm,
        PcmChip::Amiga,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Native playback rate of the chip in Hz
    pub fn default_rate(self) -> u16 {
        match self {
            PcmChip::SegaPcm => 15625,
            PcmChip::QSound => 24000,
            PcmChip::Es5506 => 44100,
            PcmChip::Rf5c68 => 19800,
            PcmChip::C140 => 21390,
            PcmChip::K007232 => 12500,
            PcmChip::K053260 => 14000,
            PcmChip::Ga20 => 12000,
            PcmChip::Oki => 7812,
            PcmChip::Ymz280b => 16934,
            PcmChip::MultiPcm => 44100,
            PcmChip::Amiga => 22050,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    Forward,
    PingPong,
    Reverse,
}

impl LoopMode {
    fn from_byte(b: u8) -> Self {
        match b {
            1 => LoopMode::PingPong,
            2 => LoopMode::Reverse,
            _ => LoopMode::Forward,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcmLoop {
    pub enabled: bool,
    pub mode: LoopMode,
    pub start: u32,
    pub end: u32,
}

/// ES5506 filter coefficients
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Es5506Filter {
    pub enabled: bool,
    pub k1: u16,
    pub k2: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcmConfig {
    pub subtype: PcmChip,
    /// 8 or 16; anything else is sent as 8
    pub bit_depth: u8,
    pub sample_rate: u16,
    #[serde(rename = "loop")]
    pub loop_point: PcmLoop,
    pub filter: Option<Es5506Filter>,
    /// Raw sample bytes pushed through `load_pcm` after the config.
    /// Not part of the config buffer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<Vec<u8>>,
}

impl Default for PcmConfig {
    fn default() -> Self {
        Self {
            subtype: PcmChip::default(),
            bit_depth: 8,
            sample_rate: PcmChip::default().default_rate(),
            loop_point: PcmLoop::default(),
            filter: None,
            sample: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PcmPatch {
    SampleRate(u16),
    BitDepth(u8),
    Loop(PcmLoop),
    Filter(Es5506Filter),
}

impl ChipCodec for PcmConfig {
    const FAMILY: ChipFamily = ChipFamily::Pcm;
    const CONFIG_SIZE: usize = CONFIG_SIZE;
    type Patch = PcmPatch;

    fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; CONFIG_SIZE];
        buf[0] = self.subtype as u8;
        buf[1] = if self.bit_depth == 16 { 16 } else { 8 };
        buf[2] = self.loop_point.enabled as u8;
        buf[3] = self.loop_point.mode as u8;
        put_u16(&mut buf, 4, self.sample_rate);
        put_u32(&mut buf, 8, self.loop_point.start);
        put_u32(&mut buf, 12, self.loop_point.end);
        if let Some(filter) = &self.filter {
            buf[6] = filter.enabled as u8;
            put_u16(&mut buf, 16, filter.k1);
            put_u16(&mut buf, 18, filter.k2);
        }
        buf
    }

    fn decode(buf: &[u8], existing: &Self) -> Result<Self, CodecError> {
        check_len(ChipFamily::Pcm, buf, CONFIG_SIZE)?;
        let mut out = existing.clone();
        out.subtype = PcmChip::from_index(buf[0]).unwrap_or_default();
        out.bit_depth = if buf[1] == 16 { 16 } else { 8 };
        out.sample_rate = get_u16(buf, 4);
        out.loop_point = PcmLoop {
            enabled: buf[2] != 0,
            mode: LoopMode::from_byte(buf[3]),
            start: get_u32(buf, 8),
            end: get_u32(buf, 12),
        };
        if out.filter.is_some() || buf[6] != 0 || !is_zeroed(&buf[16..20]) {
            out.filter = Some(Es5506Filter {
                enabled: buf[6] != 0,
                k1: get_u16(buf, 16),
                k2: get_u16(buf, 18),
            });
        }
        Ok(out)
    }

    fn patch_for_event(&self, event: &ParamEvent) -> Option<PcmPatch> {
        let &ParamEvent::Param { id, value } = event else {
            return None;
        };
        let mut lp = self.loop_point;
        let mut filter = self.filter.unwrap_or_default();
        let patch = match id {
            PARAM_SAMPLE_RATE => PcmPatch::SampleRate(clamp_u16(value)),
            PARAM_BIT_DEPTH => PcmPatch::BitDepth(if value == 16 { 16 } else { 8 }),
            PARAM_LOOP_ENABLE | PARAM_LOOP_MODE | PARAM_LOOP_START | PARAM_LOOP_END => {
                let position = value.max(0) as u32;
                match id {
                    PARAM_LOOP_ENABLE => lp.enabled = value != 0,
                    PARAM_LOOP_MODE => lp.mode = LoopMode::from_byte(value.clamp(0, 2) as u8),
                    PARAM_LOOP_START => lp.start = position,
                    _ => lp.end = position,
                }
                PcmPatch::Loop(lp)
            }
            PARAM_FILTER_ENABLE => {
                filter.enabled = value != 0;
                PcmPatch::Filter(filter)
            }
            PARAM_FILTER_K1 => {
                filter.k1 = clamp_u16(value);
                PcmPatch::Filter(filter)
            }
            PARAM_FILTER_K2 => {
                filter.k2 = clamp_u16(value);
                PcmPatch::Filter(filter)
            }
            _ => return None,
        };
        Some(patch)
    }

    fn merge(&mut self, patch: &PcmPatch) {
        match *patch {
            PcmPatch::SampleRate(rate) => self.sample_rate = rate,
            PcmPatch::BitDepth(depth) => self.bit_depth = depth,
            PcmPatch::Loop(lp) => self.loop_point = lp,
            PcmPatch::Filter(filter) => self.filter = Some(filter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let config = PcmConfig {
            subtype: PcmChip::Es5506,
            bit_depth: 16,
            sample_rate: 44100,
            loop_point: PcmLoop { enabled: true, mode: LoopMode::PingPong, start: 0x0102_0304, end: 70_000 },
            filter: Some(Es5506Filter { enabled: true, k1: 0xFFFF, k2: 0x1234 }),
            sample: None,
        };
        let buf = config.encode();
        assert_eq!(buf.len(), CONFIG_SIZE);
        assert_eq!(&buf[..8], &[2, 16, 1, 1, 0x44, 0xAC, 1, 0]);
        assert_eq!(&buf[8..12], &[4, 3, 2, 1]);
        assert_eq!(&buf[16..20], &[0xFF, 0xFF, 0x34, 0x12]);
        assert_eq!(PcmConfig::decode(&buf, &config).unwrap(), config);
    }

    #[test]
    fn test_absent_filter_is_zeroed() {
        let config = PcmConfig::default();
        let buf = config.encode();
        assert_eq!(buf[6], 0);
        assert_eq!(&buf[16..20], &[0, 0, 0, 0]);
        assert_eq!(PcmConfig::decode(&buf, &config).unwrap(), config);
    }

    #[test]
    fn test_invalid_bit_depth_falls_back() {
        let config = PcmConfig { bit_depth: 12, ..PcmConfig::default() };
        assert_eq!(config.encode()[1], 8);
    }

    #[test]
    fn test_decode_keeps_sample_data() {
        let existing = PcmConfig { sample: Some(vec![1, 2, 3]), ..PcmConfig::default() };
        let decoded = PcmConfig::decode(&PcmConfig::default().encode(), &existing).unwrap();
        assert_eq!(decoded.sample.as_deref(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_loop_event_patches_loop_block() {
        let mut config = PcmConfig::default();
        let patch = config.apply_event(&ParamEvent::Param { id: PARAM_LOOP_END, value: 512 });
        assert_eq!(
            patch,
            Some(PcmPatch::Loop(PcmLoop { end: 512, ..PcmLoop::default() }))
        );
        assert_eq!(config.loop_point.end, 512);
        assert!(config.filter.is_none());
    }

    #[test]
    fn test_filter_event_creates_block() {
        let mut config = PcmConfig::default();
        config.apply_event(&ParamEvent::Param { id: PARAM_FILTER_K1, value: 300 });
        assert_eq!(config.filter, Some(Es5506Filter { enabled: false, k1: 300, k2: 0 }));
    }
}

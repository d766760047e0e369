//! Hively instrument editor: 22 parameter bytes + 256 performance list rows
//!
//! Each row is 5 bytes: `note, waveform | fixed << 7, fx0 << 4 | fx1,
//! fx_param0, fx_param1`. Byte 19 holds the number of rows played; rows past
//! it stay stored so shrinking and regrowing the list keeps them.

use serde::{Deserialize, Serialize};

use crate::bytes::clamp_u8;
use crate::error::{CodecError, check_len};
use crate::{ChipCodec, ChipFamily, ParamEvent};

pub const PARAM_COUNT: usize = 22;
pub const MAX_PLIST: usize = 256;
pub const ENTRY_SIZE: usize = 5;
pub const CONFIG_SIZE: usize = PARAM_COUNT + MAX_PLIST * ENTRY_SIZE;

pub const PARAM_VOLUME: u32 = 0;
pub const PARAM_WAVELENGTH: u32 = 1;
pub const PARAM_ATTACK_FRAMES: u32 = 2;
pub const PARAM_RELEASE_VOLUME: u32 = 8;
pub const PARAM_VIBRATO_DELAY: u32 = 9;
pub const PARAM_VIBRATO_SPEED: u32 = 11;
pub const PARAM_SQUARE_LOWER: u32 = 12;
pub const PARAM_SQUARE_SPEED: u32 = 14;
pub const PARAM_FILTER_LOWER: u32 = 15;
pub const PARAM_FILTER_SPEED: u32 = 17;
pub const PARAM_PERF_SPEED: u32 = 18;
pub const PARAM_PERF_LENGTH: u32 = 19;
pub const PARAM_HARDCUT_FRAMES: u32 = 20;
pub const PARAM_HARDCUT_RELEASE: u32 = 21;

/// One performance list row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerfEntry {
    pub note: u8,
    /// 0..=127
    pub waveform: u8,
    pub fixed: bool,
    /// Effect commands, 0..=15 each
    pub fx: [u8; 2],
    pub fx_param: [u8; 2],
}

impl PerfEntry {
    fn to_bytes(self) -> [u8; ENTRY_SIZE] {
        [
            self.note,
            (self.waveform & 0x7F) | ((self.fixed as u8) << 7),
            ((self.fx[0] & 0x0F) << 4) | (self.fx[1] & 0x0F),
            self.fx_param[0],
            self.fx_param[1],
        ]
    }

    fn from_bytes(b: &[u8]) -> Self {
        Self {
            note: b[0],
            waveform: b[1] & 0x7F,
            fixed: b[1] & 0x80 != 0,
            fx: [b[2] >> 4, b[2] & 0x0F],
            fx_param: [b[3], b[4]],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HvlEnvelope {
    pub attack_frames: u8,
    pub attack_volume: u8,
    pub decay_frames: u8,
    pub decay_volume: u8,
    pub sustain_frames: u8,
    pub release_frames: u8,
    pub release_volume: u8,
}

impl HvlEnvelope {
    fn fields(&mut self) -> [&mut u8; 7] {
        [
            &mut self.attack_frames,
            &mut self.attack_volume,
            &mut self.decay_frames,
            &mut self.decay_volume,
            &mut self.sustain_frames,
            &mut self.release_frames,
            &mut self.release_volume,
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HvlVibrato {
    pub delay: u8,
    pub depth: u8,
    pub speed: u8,
}

/// Lower/upper sweep limits with a speed, shared by square and filter modulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HvlSweep {
    pub lower: u8,
    pub upper: u8,
    pub speed: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HvlHardCut {
    pub frames: u8,
    pub release: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HivelyConfig {
    pub volume: u8,
    pub wave_length: u8,
    pub envelope: HvlEnvelope,
    pub vibrato: HvlVibrato,
    pub square: HvlSweep,
    pub filter: HvlSweep,
    pub perf_speed: u8,
    pub hardcut: HvlHardCut,
    /// Rows played, independent of how many rows are stored
    pub perf_length: u8,
    /// Row storage; rows past the end read as empty
    pub perf_list: Vec<PerfEntry>,
}

impl Default for HivelyConfig {
    fn default() -> Self {
        Self {
            volume: 64,
            wave_length: 3,
            envelope: HvlEnvelope {
                attack_frames: 1,
                attack_volume: 64,
                decay_frames: 1,
                decay_volume: 64,
                sustain_frames: 1,
                release_frames: 1,
                release_volume: 0,
            },
            vibrato: HvlVibrato::default(),
            square: HvlSweep { lower: 32, upper: 63, speed: 1 },
            filter: HvlSweep { lower: 1, upper: 63, speed: 1 },
            perf_speed: 1,
            hardcut: HvlHardCut::default(),
            perf_length: 0,
            perf_list: Vec::new(),
        }
    }
}

impl HivelyConfig {
    /// Stored row at `index`, empty if never written
    pub fn row(&self, index: usize) -> PerfEntry {
        self.perf_list.get(index).copied().unwrap_or_default()
    }

    fn set_row(&mut self, index: usize, entry: PerfEntry) {
        if index >= self.perf_list.len() {
            if entry == PerfEntry::default() {
                return;
            }
            self.perf_list.resize(index + 1, PerfEntry::default());
        }
        self.perf_list[index] = entry;
    }

    /// Parameter bytes in wire order
    pub fn params(&self) -> [u8; PARAM_COUNT] {
        let e = &self.envelope;
        [
            self.volume,
            self.wave_length,
            e.attack_frames,
            e.attack_volume,
            e.decay_frames,
            e.decay_volume,
            e.sustain_frames,
            e.release_frames,
            e.release_volume,
            self.vibrato.delay,
            self.vibrato.depth,
            self.vibrato.speed,
            self.square.lower,
            self.square.upper,
            self.square.speed,
            self.filter.lower,
            self.filter.upper,
            self.filter.speed,
            self.perf_speed,
            self.perf_length,
            self.hardcut.frames,
            self.hardcut.release as u8,
        ]
    }

    fn set_params(&mut self, p: &[u8]) {
        self.volume = p[0];
        self.wave_length = p[1];
        for (field, &v) in self.envelope.fields().into_iter().zip(&p[2..9]) {
            *field = v;
        }
        self.vibrato = HvlVibrato { delay: p[9], depth: p[10], speed: p[11] };
        self.square = HvlSweep { lower: p[12], upper: p[13], speed: p[14] };
        self.filter = HvlSweep { lower: p[15], upper: p[16], speed: p[17] };
        self.perf_speed = p[18];
        self.perf_length = p[19];
        self.hardcut = HvlHardCut { frames: p[20], release: p[21] != 0 };
    }
}

fn sweep_with(mut sweep: HvlSweep, slot: u32, value: u8) -> HvlSweep {
    match slot {
        0 => sweep.lower = value,
        1 => sweep.upper = value,
        _ => sweep.speed = value,
    }
    sweep
}

#[derive(Debug, Clone, PartialEq)]
pub enum HivelyPatch {
    Volume(u8),
    WaveLength(u8),
    Envelope(HvlEnvelope),
    Vibrato(HvlVibrato),
    Square(HvlSweep),
    Filter(HvlSweep),
    PerfSpeed(u8),
    HardCut(HvlHardCut),
    PlistEntry { index: u16, entry: PerfEntry },
    PlistLength(u16),
}

impl ChipCodec for HivelyConfig {
    const FAMILY: ChipFamily = ChipFamily::Hively;
    const CONFIG_SIZE: usize = CONFIG_SIZE;
    type Patch = HivelyPatch;

    fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; CONFIG_SIZE];
        buf[..PARAM_COUNT].copy_from_slice(&self.params());
        for (i, entry) in self.perf_list.iter().take(MAX_PLIST).enumerate() {
            let off = PARAM_COUNT + i * ENTRY_SIZE;
            buf[off..off + ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
        }
        buf
    }

    /// Accepts the module's variable-length dump (`22 + length * 5` bytes).
    /// Rows the buffer does not carry keep their stored values.
    fn decode(buf: &[u8], existing: &Self) -> Result<Self, CodecError> {
        check_len(ChipFamily::Hively, buf, PARAM_COUNT)?;
        let length = buf[19] as usize;
        check_len(ChipFamily::Hively, buf, PARAM_COUNT + length * ENTRY_SIZE)?;

        let mut out = existing.clone();
        out.set_params(&buf[..PARAM_COUNT]);
        let rows = buf[PARAM_COUNT..buf.len().min(CONFIG_SIZE)].chunks_exact(ENTRY_SIZE);
        for (index, row) in rows.enumerate() {
            out.set_row(index, PerfEntry::from_bytes(row));
        }
        Ok(out)
    }

    fn patch_for_event(&self, event: &ParamEvent) -> Option<HivelyPatch> {
        match *event {
            ParamEvent::PlistEntry { index, entry } if (index as usize) < MAX_PLIST => {
                Some(HivelyPatch::PlistEntry { index, entry })
            }
            ParamEvent::PlistLength(len) => Some(HivelyPatch::PlistLength(len.min(255))),
            ParamEvent::Param { id, value } => {
                let v = clamp_u8(value);
                let patch = match id {
                    PARAM_VOLUME => HivelyPatch::Volume(v),
                    PARAM_WAVELENGTH => HivelyPatch::WaveLength(v),
                    PARAM_ATTACK_FRAMES..=PARAM_RELEASE_VOLUME => {
                        let mut env = self.envelope;
                        if let Some(field) = env.fields().into_iter().nth((id - PARAM_ATTACK_FRAMES) as usize) {
                            *field = v;
                        }
                        HivelyPatch::Envelope(env)
                    }
                    PARAM_VIBRATO_DELAY..=PARAM_VIBRATO_SPEED => {
                        let mut vib = self.vibrato;
                        match id - PARAM_VIBRATO_DELAY {
                            0 => vib.delay = v,
                            1 => vib.depth = v,
                            _ => vib.speed = v,
                        }
                        HivelyPatch::Vibrato(vib)
                    }
                    PARAM_SQUARE_LOWER..=PARAM_SQUARE_SPEED => {
                        HivelyPatch::Square(sweep_with(self.square, id - PARAM_SQUARE_LOWER, v))
                    }
                    PARAM_FILTER_LOWER..=PARAM_FILTER_SPEED => {
                        HivelyPatch::Filter(sweep_with(self.filter, id - PARAM_FILTER_LOWER, v))
                    }
                    PARAM_PERF_SPEED => HivelyPatch::PerfSpeed(v),
                    PARAM_PERF_LENGTH => HivelyPatch::PlistLength(v as u16),
                    PARAM_HARDCUT_FRAMES => HivelyPatch::HardCut(HvlHardCut { frames: v, ..self.hardcut }),
                    PARAM_HARDCUT_RELEASE => {
                        HivelyPatch::HardCut(HvlHardCut { release: v != 0, ..self.hardcut })
                    }
                    _ => return None,
                };
                Some(patch)
            }
            _ => None,
        }
    }

    fn merge(&mut self, patch: &HivelyPatch) {
        match *patch {
            HivelyPatch::Volume(v) => self.volume = v,
            HivelyPatch::WaveLength(v) => self.wave_length = v,
            HivelyPatch::Envelope(env) => self.envelope = env,
            HivelyPatch::Vibrato(vib) => self.vibrato = vib,
            HivelyPatch::Square(sq) => self.square = sq,
            HivelyPatch::Filter(f) => self.filter = f,
            HivelyPatch::PerfSpeed(v) => self.perf_speed = v,
            HivelyPatch::HardCut(hc) => self.hardcut = hc,
            HivelyPatch::PlistEntry { index, entry } => self.set_row(index as usize, entry),
            HivelyPatch::PlistLength(len) => self.perf_length = len.min(255) as u8,
        }
    }
}

//! Full instrument editor: 240-byte field format (magic 0xDE)
//!
//! ```text
//! [0] 0xDE  [1] version  [2..4] total size (u16)  [4] instrument type
//! [8..104]   FM: 8-byte header + 4 x 22-byte operators at 16/38/60/82
//! [104..108] GB         [112..126] C64       [128..136] SNES
//! [136..144] N163       [144..185] FDS       [188..221] ESFM
//! [224..237] ES5506
//! ```
//!
//! When the config carries a native Furnace instrument (at least 4 bytes,
//! starting with `INS2`, `IN2B`, `INST`, `FINS` or `FINB`), [`encode`] sends
//! those bytes untouched instead of the field format. That is the only case
//! where the buffer length differs from [`CONFIG_SIZE`].
//!
//! [`encode`]: ChipCodec::encode

use serde::{Deserialize, Serialize};

use crate::bytes::{get_i8, get_i32, get_u16, is_zeroed, put_i8, put_i32, put_u16};
use crate::error::{CodecError, check_len};
use crate::{ChipCodec, ChipFamily, ParamEvent};

pub const CONFIG_SIZE: usize = 240;
pub const MAGIC: u8 = 0xDE;
pub const VERSION: u8 = 1;

/// Leading bytes of the native Furnace instrument formats
pub const NATIVE_MAGICS: [&[u8; 4]; 5] = [b"INS2", b"IN2B", b"INST", b"FINS", b"FINB"];

const FM_OFFSET: usize = 8;
const FM_OP_OFFSET: usize = 16;
const FM_OP_SIZE: usize = 22;
const GB_OFFSET: usize = 104;
const C64_OFFSET: usize = 112;
const SNES_OFFSET: usize = 128;
const N163_OFFSET: usize = 136;
const FDS_OFFSET: usize = 144;
const ESFM_OFFSET: usize = 188;
const ESFM_OP_SIZE: usize = 8;
const ES5506_OFFSET: usize = 224;

/// Furnace `DivInstrumentType` code.
///
/// Kept as the raw code so instruments of types this table does not name
/// survive a round trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentType(pub u8);

const TYPE_NAMES: &[(u8, &str)] = &[
    (0, "STD"),
    (1, "FM"),
    (2, "GB"),
    (3, "C64"),
    (4, "AMIGA"),
    (5, "PCE"),
    (6, "AY"),
    (7, "AY8930"),
    (8, "TIA"),
    (9, "SAA1099"),
    (10, "VIC"),
    (11, "PET"),
    (12, "VRC6"),
    (13, "OPLL"),
    (14, "OPL"),
    (15, "FDS"),
    (16, "VBOY"),
    (17, "N163"),
    (18, "SCC"),
    (19, "OPZ"),
    (20, "POKEY"),
    (21, "BEEPER"),
    (22, "SWAN"),
    (23, "MIKEY"),
    (24, "VERA"),
    (25, "X1_010"),
    (26, "VRC6_SAW"),
    (27, "ES5506"),
    (28, "MULTIPCM"),
    (29, "SNES"),
    (30, "SU"),
    (31, "NAMCO"),
    (32, "OPL_DRUMS"),
    (33, "OPM"),
    (34, "NES"),
    (35, "MSM6258"),
    (36, "MSM6295"),
    (37, "ADPCMA"),
    (38, "ADPCMB"),
    (39, "SEGAPCM"),
    (40, "QSOUND"),
    (41, "YMZ280B"),
    (42, "RF5C68"),
    (43, "MSM5232"),
    (44, "T6W28"),
    (45, "K007232"),
    (46, "GA20"),
    (47, "POKEMINI"),
    (48, "SM8521"),
    (49, "PV1000"),
    (50, "K053260"),
    (52, "TED"),
    (53, "C140"),
    (54, "C219"),
    (55, "ESFM"),
    (56, "POWERNOISE"),
    (57, "POWERNOISE_SLOPE"),
    (58, "DAVE"),
    (59, "NDS"),
    (60, "GBA_DMA"),
    (61, "GBA_MINMOD"),
    (62, "BIFURCATOR"),
    (63, "SID2"),
    (64, "SUPERVISION"),
    (65, "UPD1771C"),
];

impl InstrumentType {
    pub const STD: Self = Self(0);
    pub const FM: Self = Self(1);
    pub const GB: Self = Self(2);
    pub const C64: Self = Self(3);
    pub const OPLL: Self = Self(13);
    pub const OPL: Self = Self(14);
    pub const FDS: Self = Self(15);
    pub const N163: Self = Self(17);
    pub const OPZ: Self = Self(19);
    pub const ES5506: Self = Self(27);
    pub const SNES: Self = Self(29);
    pub const OPM: Self = Self(33);
    pub const ESFM: Self = Self(55);

    pub fn name(self) -> Option<&'static str> {
        TYPE_NAMES
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, name)| *name)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        TYPE_NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(code, _)| Self(*code))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsFmOperator {
    pub enable: bool,
    pub mult: u8,
    pub tl: u8,
    pub ar: u8,
    pub dr: u8,
    pub d2r: u8,
    pub sl: u8,
    pub rr: u8,
    pub dt: u8,
    pub dt2: u8,
    pub rs: u8,
    pub am: u8,
    pub ksr: u8,
    pub ksl: u8,
    pub sus: u8,
    pub vib: u8,
    pub ws: u8,
    pub ssg_env: u8,
    pub dam: u8,
    pub dvb: u8,
    pub egt: u8,
    pub kvs: u8,
}

impl InsFmOperator {
    fn to_bytes(self) -> [u8; FM_OP_SIZE] {
        [
            self.enable as u8,
            self.mult,
            self.tl,
            self.ar,
            self.dr,
            self.d2r,
            self.sl,
            self.rr,
            self.dt,
            self.dt2,
            self.rs,
            self.am,
            self.ksr,
            self.ksl,
            self.sus,
            self.vib,
            self.ws,
            self.ssg_env,
            self.dam,
            self.dvb,
            self.egt,
            self.kvs,
        ]
    }

    fn from_bytes(b: &[u8]) -> Self {
        Self {
            enable: b[0] != 0,
            mult: b[1],
            tl: b[2],
            ar: b[3],
            dr: b[4],
            d2r: b[5],
            sl: b[6],
            rr: b[7],
            dt: b[8],
            dt2: b[9],
            rs: b[10],
            am: b[11],
            ksr: b[12],
            ksl: b[13],
            sus: b[14],
            vib: b[15],
            ws: b[16],
            ssg_env: b[17],
            dam: b[18],
            dvb: b[19],
            egt: b[20],
            kvs: b[21],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FmSection {
    pub alg: u8,
    pub fb: u8,
    pub fms: u8,
    pub ams: u8,
    pub ops: u8,
    pub opll_preset: u8,
    pub fixed_drums: bool,
    pub fms2: u8,
    pub op: [InsFmOperator; 4],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbSection {
    pub env_vol: u8,
    pub env_dir: u8,
    pub env_len: u8,
    pub sound_len: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct C64Section {
    pub tri_on: bool,
    pub saw_on: bool,
    pub pulse_on: bool,
    pub noise_on: bool,
    pub a: u8,
    pub d: u8,
    pub s: u8,
    pub r: u8,
    pub duty: u16,
    pub ring_mod: u8,
    pub osc_sync: u8,
    pub res: u8,
    pub cut: u16,
    pub lp: bool,
    pub bp: bool,
    pub hp: bool,
    pub ch3off: bool,
    pub to_filter: bool,
    pub init_filter: bool,
    pub duty_is_abs: bool,
    pub filter_is_abs: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnesSection {
    pub use_env: bool,
    pub gain_mode: u8,
    pub gain: u8,
    pub a: u8,
    pub d: u8,
    pub s: u8,
    pub r: u8,
    pub d2: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct N163Section {
    pub wave: i32,
    pub wave_pos: u8,
    pub wave_len: u8,
    pub wave_mode: u8,
    pub per_chan_pos: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FdsSection {
    pub mod_speed: i32,
    pub mod_depth: i32,
    pub mod_table: [i8; 32],
    pub init_mod_table_with_first_wave: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EsfmOperator {
    pub delay: u8,
    pub out_lvl: u8,
    pub mod_in: u8,
    pub left: u8,
    pub right: u8,
    pub ct: i8,
    pub dt: i8,
    pub fixed: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EsfmSection {
    pub noise: u8,
    pub op: [EsfmOperator; 4],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Es5506Section {
    pub filter_mode: u8,
    pub k1: u16,
    pub k2: u16,
    pub ecount: u16,
    pub lv_ramp: i8,
    pub rv_ramp: i8,
    pub k1_ramp: i8,
    pub k2_ramp: i8,
    pub k1_slow: bool,
    pub k2_slow: bool,
}

/// Host-side instrument. Sections absent here are written as zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    #[serde(rename = "type")]
    pub ins_type: InstrumentType,
    pub fm: Option<FmSection>,
    pub gb: Option<GbSection>,
    pub c64: Option<C64Section>,
    pub snes: Option<SnesSection>,
    pub n163: Option<N163Section>,
    pub fds: Option<FdsSection>,
    pub esfm: Option<EsfmSection>,
    pub es5506: Option<Es5506Section>,
    /// Native Furnace instrument file, sent as-is when recognised
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<Vec<u8>>,
}

impl InstrumentConfig {
    /// The native payload, if it qualifies for pass-through.
    pub fn passthrough(&self) -> Option<&[u8]> {
        let raw = self.native.as_deref()?;
        (raw.len() >= 4 && NATIVE_MAGICS.iter().any(|m| raw[..4] == m[..])).then_some(raw)
    }

    fn write_fields(&self, buf: &mut [u8]) {
        buf[0] = MAGIC;
        buf[1] = VERSION;
        put_u16(buf, 2, CONFIG_SIZE as u16);
        buf[4] = self.ins_type.0;

        if let Some(fm) = &self.fm {
            let b = &mut buf[FM_OFFSET..];
            b[..8].copy_from_slice(&[
                fm.alg,
                fm.fb,
                fm.fms,
                fm.ams,
                fm.ops,
                fm.opll_preset,
                fm.fixed_drums as u8,
                fm.fms2,
            ]);
            for (i, op) in fm.op.iter().enumerate() {
                let off = FM_OP_OFFSET + i * FM_OP_SIZE;
                buf[off..off + FM_OP_SIZE].copy_from_slice(&op.to_bytes());
            }
        }

        if let Some(gb) = &self.gb {
            buf[GB_OFFSET..GB_OFFSET + 4]
                .copy_from_slice(&[gb.env_vol, gb.env_dir, gb.env_len, gb.sound_len]);
        }

        if let Some(c) = &self.c64 {
            let b = &mut buf[C64_OFFSET..C64_OFFSET + 14];
            b[0] = bits(&[c.tri_on, c.saw_on, c.pulse_on, c.noise_on]);
            b[1..5].copy_from_slice(&[c.a, c.d, c.s, c.r]);
            put_u16(b, 5, c.duty);
            b[7] = c.ring_mod;
            b[8] = c.osc_sync;
            b[9] = c.res;
            put_u16(b, 10, c.cut);
            b[12] = bits(&[c.lp, c.bp, c.hp, c.ch3off]);
            b[13] = bits(&[c.to_filter, c.init_filter, c.duty_is_abs, c.filter_is_abs]);
        }

        if let Some(s) = &self.snes {
            buf[SNES_OFFSET..SNES_OFFSET + 8].copy_from_slice(&[
                s.use_env as u8,
                s.gain_mode,
                s.gain,
                s.a,
                s.d,
                s.s,
                s.r,
                s.d2,
            ]);
        }

        if let Some(n) = &self.n163 {
            put_i32(buf, N163_OFFSET, n.wave);
            buf[N163_OFFSET + 4..N163_OFFSET + 8].copy_from_slice(&[
                n.wave_pos,
                n.wave_len,
                n.wave_mode,
                n.per_chan_pos as u8,
            ]);
        }

        if let Some(f) = &self.fds {
            put_i32(buf, FDS_OFFSET, f.mod_speed);
            put_i32(buf, FDS_OFFSET + 4, f.mod_depth);
            for (i, &v) in f.mod_table.iter().enumerate() {
                put_i8(buf, FDS_OFFSET + 8 + i, v);
            }
            buf[FDS_OFFSET + 40] = f.init_mod_table_with_first_wave as u8;
        }

        if let Some(e) = &self.esfm {
            buf[ESFM_OFFSET] = e.noise;
            for (i, op) in e.op.iter().enumerate() {
                let off = ESFM_OFFSET + 1 + i * ESFM_OP_SIZE;
                buf[off..off + 5]
                    .copy_from_slice(&[op.delay, op.out_lvl, op.mod_in, op.left, op.right]);
                put_i8(buf, off + 5, op.ct);
                put_i8(buf, off + 6, op.dt);
                buf[off + 7] = op.fixed;
            }
        }

        if let Some(e) = &self.es5506 {
            let b = &mut buf[ES5506_OFFSET..ES5506_OFFSET + 13];
            b[0] = e.filter_mode;
            put_u16(b, 1, e.k1);
            put_u16(b, 3, e.k2);
            put_u16(b, 5, e.ecount);
            put_i8(b, 7, e.lv_ramp);
            put_i8(b, 8, e.rv_ramp);
            put_i8(b, 9, e.k1_ramp);
            put_i8(b, 10, e.k2_ramp);
            b[11] = e.k1_slow as u8;
            b[12] = e.k2_slow as u8;
        }
    }
}

fn bits(flags: &[bool]) -> u8 {
    flags
        .iter()
        .enumerate()
        .fold(0, |acc, (i, &on)| acc | ((on as u8) << i))
}

fn bit(byte: u8, i: u8) -> bool {
    byte & (1 << i) != 0
}

/// A section is taken from the buffer when the host already tracks it or
/// the module wrote something into it.
fn section<T>(existing: Option<T>, bytes: &[u8], read: impl FnOnce(&[u8]) -> T) -> Option<T> {
    if existing.is_some() || !is_zeroed(bytes) {
        Some(read(bytes))
    } else {
        None
    }
}

impl ChipCodec for InstrumentConfig {
    const FAMILY: ChipFamily = ChipFamily::Instrument;
    const CONFIG_SIZE: usize = CONFIG_SIZE;

    /// The module reports in-editor changes only through `dump_config`,
    /// so there is nothing to patch from individual events.
    type Patch = ();

    fn encode(&self) -> Vec<u8> {
        if let Some(raw) = self.passthrough() {
            return raw.to_vec();
        }
        let mut buf = vec![0u8; CONFIG_SIZE];
        self.write_fields(&mut buf);
        buf
    }

    /// Merge a field-format dump. The dump supersedes any native payload.
    fn decode(buf: &[u8], existing: &Self) -> Result<Self, CodecError> {
        check_len(ChipFamily::Instrument, buf, CONFIG_SIZE)?;
        if buf[0] != MAGIC {
            return Err(CodecError::WrongMagic {
                family: ChipFamily::Instrument,
                expected: MAGIC,
                found: buf[0],
            });
        }

        let mut out = existing.clone();
        out.native = None;
        out.ins_type = InstrumentType(buf[4]);

        out.fm = section(existing.fm, &buf[FM_OFFSET..GB_OFFSET], |b| {
            let mut op = [InsFmOperator::default(); 4];
            for (i, o) in op.iter_mut().enumerate() {
                let off = FM_OP_OFFSET - FM_OFFSET + i * FM_OP_SIZE;
                *o = InsFmOperator::from_bytes(&b[off..off + FM_OP_SIZE]);
            }
            FmSection {
                alg: b[0],
                fb: b[1],
                fms: b[2],
                ams: b[3],
                ops: b[4],
                opll_preset: b[5],
                fixed_drums: b[6] != 0,
                fms2: b[7],
                op,
            }
        });

        out.gb = section(existing.gb, &buf[GB_OFFSET..GB_OFFSET + 4], |b| GbSection {
            env_vol: b[0],
            env_dir: b[1],
            env_len: b[2],
            sound_len: b[3],
        });

        out.c64 = section(existing.c64, &buf[C64_OFFSET..C64_OFFSET + 14], |b| C64Section {
            tri_on: bit(b[0], 0),
            saw_on: bit(b[0], 1),
            pulse_on: bit(b[0], 2),
            noise_on: bit(b[0], 3),
            a: b[1],
            d: b[2],
            s: b[3],
            r: b[4],
            duty: get_u16(b, 5),
            ring_mod: b[7],
            osc_sync: b[8],
            res: b[9],
            cut: get_u16(b, 10),
            lp: bit(b[12], 0),
            bp: bit(b[12], 1),
            hp: bit(b[12], 2),
            ch3off: bit(b[12], 3),
            to_filter: bit(b[13], 0),
            init_filter: bit(b[13], 1),
            duty_is_abs: bit(b[13], 2),
            filter_is_abs: bit(b[13], 3),
        });

        out.snes = section(existing.snes, &buf[SNES_OFFSET..SNES_OFFSET + 8], |b| SnesSection {
            use_env: b[0] != 0,
            gain_mode: b[1],
            gain: b[2],
            a: b[3],
            d: b[4],
            s: b[5],
            r: b[6],
            d2: b[7],
        });

        out.n163 = section(existing.n163, &buf[N163_OFFSET..N163_OFFSET + 8], |b| N163Section {
            wave: get_i32(b, 0),
            wave_pos: b[4],
            wave_len: b[5],
            wave_mode: b[6],
            per_chan_pos: b[7] != 0,
        });

        out.fds = section(existing.fds, &buf[FDS_OFFSET..FDS_OFFSET + 41], |b| {
            let mut mod_table = [0i8; 32];
            for (i, v) in mod_table.iter_mut().enumerate() {
                *v = get_i8(b, 8 + i);
            }
            FdsSection {
                mod_speed: get_i32(b, 0),
                mod_depth: get_i32(b, 4),
                mod_table,
                init_mod_table_with_first_wave: b[40] != 0,
            }
        });

        out.esfm = section(existing.esfm, &buf[ESFM_OFFSET..ESFM_OFFSET + 33], |b| {
            let mut op = [EsfmOperator::default(); 4];
            for (i, o) in op.iter_mut().enumerate() {
                let r = &b[1 + i * ESFM_OP_SIZE..1 + (i + 1) * ESFM_OP_SIZE];
                *o = EsfmOperator {
                    delay: r[0],
                    out_lvl: r[1],
                    mod_in: r[2],
                    left: r[3],
                    right: r[4],
                    ct: get_i8(r, 5),
                    dt: get_i8(r, 6),
                    fixed: r[7],
                };
            }
            EsfmSection { noise: b[0], op }
        });

        out.es5506 = section(existing.es5506, &buf[ES5506_OFFSET..ES5506_OFFSET + 13], |b| {
            Es5506Section {
                filter_mode: b[0],
                k1: get_u16(b, 1),
                k2: get_u16(b, 3),
                ecount: get_u16(b, 5),
                lv_ramp: get_i8(b, 7),
                rv_ramp: get_i8(b, 8),
                k1_ramp: get_i8(b, 9),
                k2_ramp: get_i8(b, 10),
                k1_slow: b[11] != 0,
                k2_slow: b[12] != 0,
            }
        });

        Ok(out)
    }

    fn patch_for_event(&self, _event: &ParamEvent) -> Option<()> {
        None
    }

    fn merge(&mut self, _patch: &()) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opm_instrument() -> InstrumentConfig {
        let mut fm = FmSection {
            alg: 7,
            fb: 5,
            ops: 4,
            fms2: 2,
            ..FmSection::default()
        };
        fm.op[0] = InsFmOperator { enable: true, mult: 2, tl: 30, ar: 31, kvs: 2, ..Default::default() };
        fm.op[3] = InsFmOperator { enable: true, dt: 7, ssg_env: 8, egt: 1, ..Default::default() };
        InstrumentConfig {
            ins_type: InstrumentType::OPM,
            fm: Some(fm),
            ..InstrumentConfig::default()
        }
    }

    #[test]
    fn test_header_and_fm_offsets() {
        let buf = opm_instrument().encode();
        assert_eq!(buf.len(), CONFIG_SIZE);
        assert_eq!(&buf[..5], &[0xDE, 1, 240, 0, 33]);
        assert_eq!(&buf[8..16], &[7, 5, 0, 0, 4, 0, 0, 2]);
        assert_eq!(&buf[16..20], &[1, 2, 30, 31]);
        assert_eq!(buf[16 + 21], 2);
        assert_eq!(buf[82 + 8], 7);
        assert_eq!(buf[82 + 17], 8);
        assert_eq!(buf[82 + 20], 1);
        // Absent sections are zero
        assert!(buf[104..240].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_round_trip_all_sections() {
        let mut config = opm_instrument();
        config.gb = Some(GbSection { env_vol: 15, env_dir: 1, env_len: 2, sound_len: 64 });
        config.c64 = Some(C64Section {
            tri_on: true,
            noise_on: true,
            a: 1,
            d: 2,
            s: 3,
            r: 4,
            duty: 0x0ABC,
            ring_mod: 1,
            res: 7,
            cut: 0x07FF,
            bp: true,
            ch3off: true,
            init_filter: true,
            filter_is_abs: true,
            ..C64Section::default()
        });
        config.snes = Some(SnesSection { use_env: true, gain_mode: 3, gain: 100, d2: 9, ..Default::default() });
        config.n163 = Some(N163Section { wave: -1, wave_pos: 16, wave_len: 32, wave_mode: 2, per_chan_pos: true });
        let mut mod_table = [0i8; 32];
        mod_table[5] = -4;
        config.fds = Some(FdsSection {
            mod_speed: 70_000,
            mod_depth: 32,
            mod_table,
            init_mod_table_with_first_wave: true,
        });
        let mut esfm = EsfmSection { noise: 2, ..Default::default() };
        esfm.op[2] = EsfmOperator { delay: 3, out_lvl: 7, ct: -12, dt: -2, fixed: 1, ..Default::default() };
        config.esfm = Some(esfm);
        config.es5506 = Some(Es5506Section {
            filter_mode: 1,
            k1: 0xFFFF,
            k2: 0x8000,
            ecount: 500,
            lv_ramp: -100,
            k2_ramp: 5,
            k2_slow: true,
            ..Default::default()
        });

        let buf = config.encode();
        assert_eq!(buf[112], 0b1001);
        assert_eq!(&buf[117..119], &[0xBC, 0x0A]);
        assert_eq!(buf[124], 0b1010);
        assert_eq!(buf[125], 0b1010);
        assert_eq!(&buf[136..140], &[0xFF; 4]);
        assert_eq!(buf[152 + 5], 0xFC);
        assert_eq!(buf[184], 1);
        assert_eq!(buf[189 + 16 + 5], 0xF4);
        assert_eq!(buf[231], 0x9C);
        assert_eq!(InstrumentConfig::decode(&buf, &config).unwrap(), config);
    }

    #[test]
    fn test_absent_sections_stay_absent() {
        let config = opm_instrument();
        let decoded = InstrumentConfig::decode(&config.encode(), &config).unwrap();
        assert_eq!(decoded, config);
        assert!(decoded.gb.is_none() && decoded.es5506.is_none());
    }

    #[test]
    fn test_native_payload_passes_through() {
        let raw = b"FINS\x01\x02\x03\x04\x05".to_vec();
        let config = InstrumentConfig { native: Some(raw.clone()), ..opm_instrument() };
        assert_eq!(config.encode(), raw);

        // Unknown magic or too short: field format is derived instead
        for bad in [b"XXXX1234".to_vec(), b"INS".to_vec()] {
            let config = InstrumentConfig { native: Some(bad), ..opm_instrument() };
            let buf = config.encode();
            assert_eq!(buf.len(), CONFIG_SIZE);
            assert_eq!(buf[0], MAGIC);
        }
    }

    #[test]
    fn test_dump_replaces_native_payload() {
        let existing = InstrumentConfig { native: Some(b"INS2....".to_vec()), ..opm_instrument() };
        let dump = opm_instrument().encode();
        let decoded = InstrumentConfig::decode(&dump, &existing).unwrap();
        assert!(decoded.native.is_none());
        assert_eq!(decoded.fm, existing.fm);
    }

    #[test]
    fn test_wrong_magic() {
        let mut buf = opm_instrument().encode();
        buf[0] = 0xAD;
        let err = InstrumentConfig::decode(&buf, &InstrumentConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::WrongMagic { found: 0xAD, .. }));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(InstrumentType::ESFM.name(), Some("ESFM"));
        assert_eq!(InstrumentType::from_name("upd1771c"), Some(InstrumentType(65)));
        assert_eq!(InstrumentType::from_name("ted"), Some(InstrumentType(52)));
        assert_eq!(InstrumentType(51).name(), None);
        assert!(InstrumentType::from_name("PCE").is_some());
    }

    #[test]
    fn test_events_are_not_patched() {
        let mut config = opm_instrument();
        assert_eq!(config.apply_event(&ParamEvent::Param { id: 0, value: 1 }), None);
        assert_eq!(config, opm_instrument());
    }
}

//! FM family: 2/4-operator Yamaha-style chips, 88-byte layout
//!
//! An 8-byte header followed by four 20-byte operator records.

use serde::{Deserialize, Serialize};

use crate::bytes::{clamp_i8, clamp_u8, get_i8, put_i8};
use crate::error::{CodecError, check_len};
use crate::{ChipCodec, ChipFamily, ParamEvent};

pub const CONFIG_SIZE: usize = 88;
pub const HEADER_SIZE: usize = 8;
pub const OP_SIZE: usize = 20;
pub const MAX_OPS: usize = 4;

// Global parameter ids
pub const PARAM_ALGORITHM: u32 = 0;
pub const PARAM_FEEDBACK: u32 = 1;
pub const PARAM_FMS: u32 = 2;
pub const PARAM_AMS: u32 = 3;
pub const PARAM_OPLL_PRESET: u32 = 4;

// Operator parameter ids, in record order
pub const OP_ENABLED: u32 = 0;
pub const OP_MULT: u32 = 1;
pub const OP_TL: u32 = 2;
pub const OP_AR: u32 = 3;
pub const OP_DR: u32 = 4;
pub const OP_D2R: u32 = 5;
pub const OP_SL: u32 = 6;
pub const OP_RR: u32 = 7;
pub const OP_DT: u32 = 8;
pub const OP_DT2: u32 = 9;
pub const OP_RS: u32 = 10;
pub const OP_AM: u32 = 11;
pub const OP_KSR: u32 = 12;
pub const OP_KSL: u32 = 13;
pub const OP_SUS: u32 = 14;
pub const OP_VIB: u32 = 15;
pub const OP_WS: u32 = 16;
pub const OP_SSG: u32 = 17;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FmChip {
    #[default]
    Opn,
    Opm,
    Opl,
    Opll,
    Opz,
    Esfm,
    Opna,
    Opnb,
    Opl4,
    Y8950,
    Opn2203,
    Opnbb,
}

impl FmChip {
    pub const ALL: [FmChip; 12] = [
        FmChip::Opn,
        FmChip::Opm,
        FmChip::Opl,
        FmChip::Opll,
        FmChip::Opz,
        FmChip::Esfm,
        FmChip::Opna,
        FmChip::Opnb,
        FmChip::Opl4,
        FmChip::Y8950,
        FmChip::Opn2203,
        FmChip::Opnbb,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

/// One operator record. Defaults give an audible, fully open operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FmOperator {
    pub enabled: bool,
    pub mult: u8,
    pub tl: u8,
    pub ar: u8,
    pub dr: u8,
    pub d2r: u8,
    pub sl: u8,
    pub rr: u8,
    pub dt: i8,
    pub dt2: u8,
    pub rs: u8,
    pub am: u8,
    pub ksr: u8,
    pub ksl: u8,
    pub sus: u8,
    pub vib: u8,
    pub ws: u8,
    pub ssg: u8,
}

impl Default for FmOperator {
    fn default() -> Self {
        Self {
            enabled: true,
            mult: 1,
            tl: 0,
            ar: 31,
            dr: 0,
            d2r: 0,
            sl: 0,
            rr: 15,
            dt: 0,
            dt2: 0,
            rs: 0,
            am: 0,
            ksr: 0,
            ksl: 0,
            sus: 0,
            vib: 0,
            ws: 0,
            ssg: 0,
        }
    }
}

impl FmOperator {
    fn write(&self, rec: &mut [u8]) {
        rec[0] = self.enabled as u8;
        rec[1] = self.mult;
        rec[2] = self.tl;
        rec[3] = self.ar;
        rec[4] = self.dr;
        rec[5] = self.d2r;
        rec[6] = self.sl;
        rec[7] = self.rr;
        put_i8(rec, 8, self.dt);
        rec[9] = self.dt2;
        rec[10] = self.rs;
        rec[11] = self.am;
        rec[12] = self.ksr;
        rec[13] = self.ksl;
        rec[14] = self.sus;
        rec[15] = self.vib;
        rec[16] = self.ws;
        rec[17] = self.ssg;
    }

    fn read(rec: &[u8]) -> Self {
        Self {
            enabled: rec[0] != 0,
            mult: rec[1],
            tl: rec[2],
            ar: rec[3],
            dr: rec[4],
            d2r: rec[5],
            sl: rec[6],
            rr: rec[7],
            dt: get_i8(rec, 8),
            dt2: rec[9],
            rs: rec[10],
            am: rec[11],
            ksr: rec[12],
            ksl: rec[13],
            sus: rec[14],
            vib: rec[15],
            ws: rec[16],
            ssg: rec[17],
        }
    }

    /// Set one field by operator parameter id. Returns false for unknown ids.
    fn set(&mut self, id: u32, value: i32) -> bool {
        let byte = clamp_u8(value);
        match id {
            OP_ENABLED => self.enabled = value != 0,
            OP_MULT => self.mult = byte,
            OP_TL => self.tl = byte,
            OP_AR => self.ar = byte,
            OP_DR => self.dr = byte,
            OP_D2R => self.d2r = byte,
            OP_SL => self.sl = byte,
            OP_RR => self.rr = byte,
            OP_DT => self.dt = clamp_i8(value),
            OP_DT2 => self.dt2 = byte,
            OP_RS => self.rs = byte,
            OP_AM => self.am = byte,
            OP_KSR => self.ksr = byte,
            OP_KSL => self.ksl = byte,
            OP_SUS => self.sus = byte,
            OP_VIB => self.vib = byte,
            OP_WS => self.ws = byte,
            OP_SSG => self.ssg = byte,
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FmConfig {
    pub subtype: FmChip,
    pub algorithm: u8,
    pub feedback: u8,
    pub fms: u8,
    pub ams: u8,
    /// Active operator count; the layout stores 2 or 4
    pub op_count: u8,
    pub opll_preset: u8,
    pub fixed_drums: bool,
    pub operators: [FmOperator; MAX_OPS],
}

impl Default for FmConfig {
    fn default() -> Self {
        Self {
            subtype: FmChip::default(),
            algorithm: 0,
            feedback: 0,
            fms: 0,
            ams: 0,
            op_count: 4,
            opll_preset: 0,
            fixed_drums: false,
            operators: [FmOperator::default(); MAX_OPS],
        }
    }
}

fn wire_op_count(count: u8) -> u8 {
    if count <= 2 { 2 } else { MAX_OPS as u8 }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FmPatch {
    Algorithm(u8),
    Feedback(u8),
    Fms(u8),
    Ams(u8),
    OpllPreset(u8),
    Operator { index: u8, operator: FmOperator },
}

impl ChipCodec for FmConfig {
    const FAMILY: ChipFamily = ChipFamily::Fm;
    const CONFIG_SIZE: usize = CONFIG_SIZE;
    type Patch = FmPatch;

    fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; CONFIG_SIZE];
        buf[0] = self.subtype as u8;
        buf[1] = self.algorithm & 7;
        buf[2] = self.feedback & 7;
        buf[3] = self.fms & 7;
        buf[4] = self.ams & 3;
        buf[5] = wire_op_count(self.op_count);
        buf[6] = self.opll_preset;
        buf[7] = self.fixed_drums as u8;

        for (i, op) in self.operators.iter().enumerate() {
            let off = HEADER_SIZE + i * OP_SIZE;
            op.write(&mut buf[off..off + OP_SIZE]);
        }
        buf
    }

    fn decode(buf: &[u8], existing: &Self) -> Result<Self, CodecError> {
        check_len(ChipFamily::Fm, buf, CONFIG_SIZE)?;
        let mut out = existing.clone();
        out.subtype = FmChip::from_index(buf[0]).unwrap_or_default();
        out.algorithm = buf[1] & 7;
        out.feedback = buf[2] & 7;
        out.fms = buf[3] & 7;
        out.ams = buf[4] & 3;
        out.op_count = wire_op_count(buf[5]);
        out.opll_preset = buf[6];
        out.fixed_drums = buf[7] & 1 != 0;

        for (i, op) in out.operators.iter_mut().enumerate() {
            let off = HEADER_SIZE + i * OP_SIZE;
            *op = FmOperator::read(&buf[off..off + OP_SIZE]);
        }
        Ok(out)
    }

    fn patch_for_event(&self, event: &ParamEvent) -> Option<FmPatch> {
        match *event {
            ParamEvent::Algorithm(alg) => Some(FmPatch::Algorithm(alg & 7)),
            ParamEvent::Param { id, value } => {
                let byte = clamp_u8(value);
                match id {
                    PARAM_ALGORITHM => Some(FmPatch::Algorithm(byte & 7)),
                    PARAM_FEEDBACK => Some(FmPatch::Feedback(byte & 7)),
                    PARAM_FMS => Some(FmPatch::Fms(byte & 7)),
                    PARAM_AMS => Some(FmPatch::Ams(byte & 3)),
                    PARAM_OPLL_PRESET => Some(FmPatch::OpllPreset(byte)),
                    _ => None,
                }
            }
            ParamEvent::OpParam { op, id, value } => {
                let mut operator = *self.operators.get(op as usize)?;
                operator
                    .set(id, value)
                    .then_some(FmPatch::Operator { index: op, operator })
            }
            _ => None,
        }
    }

    fn merge(&mut self, patch: &FmPatch) {
        match *patch {
            FmPatch::Algorithm(alg) => self.algorithm = alg,
            FmPatch::Feedback(fb) => self.feedback = fb,
            FmPatch::Fms(fms) => self.fms = fms,
            FmPatch::Ams(ams) => self.ams = ams,
            FmPatch::OpllPreset(preset) => self.opll_preset = preset,
            FmPatch::Operator { index, operator } => {
                if let Some(slot) = self.operators.get_mut(index as usize) {
                    *slot = operator;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_patch() -> FmConfig {
        let mut config = FmConfig {
            subtype: FmChip::Opm,
            algorithm: 4,
            feedback: 6,
            fms: 3,
            ams: 2,
            op_count: 4,
            ..FmConfig::default()
        };
        config.operators[1].dt = -3;
        config.operators[2].tl = 127;
        config.operators[3].ssg = 9;
        config
    }

    #[test]
    fn test_header_and_operator_offsets() {
        let buf = sample_patch().encode();
        assert_eq!(buf.len(), CONFIG_SIZE);
        assert_eq!(&buf[..8], &[1, 4, 6, 3, 2, 4, 0, 0]);
        // Operator 2 record starts at 8 + 20
        assert_eq!(buf[HEADER_SIZE + OP_SIZE + 8], 0xFD);
        assert_eq!(buf[HEADER_SIZE + 2 * OP_SIZE + 2], 127);
        assert_eq!(buf[HEADER_SIZE + 3 * OP_SIZE + 17], 9);
        // Reserved bytes stay zero
        assert_eq!(buf[HEADER_SIZE + 18], 0);
        assert_eq!(buf[HEADER_SIZE + 19], 0);
    }

    #[test]
    fn test_header_fields_are_masked() {
        let config = FmConfig {
            algorithm: 9,
            feedback: 15,
            ams: 7,
            op_count: 1,
            ..FmConfig::default()
        };
        let buf = config.encode();
        assert_eq!(buf[1], 1);
        assert_eq!(buf[2], 7);
        assert_eq!(buf[4], 3);
        assert_eq!(buf[5], 2);
    }

    #[test]
    fn test_op_count_is_two_or_four() {
        let three = FmConfig { op_count: 3, ..FmConfig::default() };
        let buf = three.encode();
        assert_eq!(buf[5], 4);

        let mut odd = buf.clone();
        odd[5] = 3;
        assert_eq!(FmConfig::decode(&odd, &three).unwrap().op_count, 4);
        odd[5] = 0;
        assert_eq!(FmConfig::decode(&odd, &three).unwrap().op_count, 2);
    }

    #[test]
    fn test_round_trip() {
        let config = sample_patch();
        assert_eq!(FmConfig::decode(&config.encode(), &config).unwrap(), config);
    }

    #[test]
    fn test_operator_event_patches_one_operator() {
        let mut config = sample_patch();
        let patch = config
            .apply_event(&ParamEvent::OpParam { op: 2, id: OP_DT, value: -2 })
            .unwrap();
        match patch {
            FmPatch::Operator { index, operator } => {
                assert_eq!(index, 2);
                assert_eq!(operator.dt, -2);
                assert_eq!(operator.tl, 127);
            }
            other => panic!("unexpected patch {other:?}"),
        }
        assert_eq!(config.operators[2].dt, -2);
        assert_eq!(config.operators[1].dt, -3);
    }

    #[test]
    fn test_algorithm_events() {
        let mut config = FmConfig::default();
        assert_eq!(config.apply_event(&ParamEvent::Algorithm(5)), Some(FmPatch::Algorithm(5)));
        assert_eq!(
            config.apply_event(&ParamEvent::Param { id: PARAM_FEEDBACK, value: 3 }),
            Some(FmPatch::Feedback(3))
        );
        assert_eq!((config.algorithm, config.feedback), (5, 3));
    }

    #[test]
    fn test_out_of_range_operator_is_ignored() {
        let mut config = FmConfig::default();
        assert_eq!(config.apply_event(&ParamEvent::OpParam { op: 4, id: OP_TL, value: 1 }), None);
        assert_eq!(config.apply_event(&ParamEvent::OpParam { op: 0, id: 40, value: 1 }), None);
    }
}

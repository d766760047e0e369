//! Family-erased config and patch types handed across the bridge

use serde::{Deserialize, Serialize};

use crate::fm::{FmConfig, FmPatch};
use crate::hively::{HivelyConfig, HivelyPatch};
use crate::instrument::InstrumentConfig;
use crate::macro_seq::{MacroConfig, MacroPatch};
use crate::pcm::{PcmConfig, PcmPatch};
use crate::psg::{PsgConfig, PsgPatch};
use crate::wave::{WaveConfig, WavePatch};
use crate::{ChipCodec, ChipFamily, CodecError, ParamEvent};

/// Host-side config of one module instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum ChipConfig {
    Psg(PsgConfig),
    Fm(FmConfig),
    Pcm(PcmConfig),
    Wave(WaveConfig),
    Macro(MacroConfig),
    Instrument(InstrumentConfig),
    Hively(HivelyConfig),
}

/// Change forwarded to the host after a module callback or a recapture
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigPatch {
    Psg(PsgPatch),
    Fm(FmPatch),
    Pcm(PcmPatch),
    Wave(WavePatch),
    Macro(MacroPatch),
    Hively(HivelyPatch),
    /// Whole config recaptured from the module before teardown
    Snapshot(ChipConfig),
}

macro_rules! with_codec {
    ($config:expr, $c:ident => $body:expr) => {
        match $config {
            ChipConfig::Psg($c) => $body,
            ChipConfig::Fm($c) => $body,
            ChipConfig::Pcm($c) => $body,
            ChipConfig::Wave($c) => $body,
            ChipConfig::Macro($c) => $body,
            ChipConfig::Instrument($c) => $body,
            ChipConfig::Hively($c) => $body,
        }
    };
}

impl ChipConfig {
    pub fn default_for(family: ChipFamily) -> Self {
        match family {
            ChipFamily::Psg => ChipConfig::Psg(PsgConfig::default()),
            ChipFamily::Fm => ChipConfig::Fm(FmConfig::default()),
            ChipFamily::Pcm => ChipConfig::Pcm(PcmConfig::default()),
            ChipFamily::Wave => ChipConfig::Wave(WaveConfig::default()),
            ChipFamily::Macro => ChipConfig::Macro(MacroConfig::default()),
            ChipFamily::Instrument => ChipConfig::Instrument(InstrumentConfig::default()),
            ChipFamily::Hively => ChipConfig::Hively(HivelyConfig::default()),
        }
    }

    pub fn family(&self) -> ChipFamily {
        match self {
            ChipConfig::Psg(_) => ChipFamily::Psg,
            ChipConfig::Fm(_) => ChipFamily::Fm,
            ChipConfig::Pcm(_) => ChipFamily::Pcm,
            ChipConfig::Wave(_) => ChipFamily::Wave,
            ChipConfig::Macro(_) => ChipFamily::Macro,
            ChipConfig::Instrument(_) => ChipFamily::Instrument,
            ChipConfig::Hively(_) => ChipFamily::Hively,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        with_codec!(self, c => c.encode())
    }

    /// Merge a dumped buffer into this config, returning the merged copy.
    pub fn decode(&self, buf: &[u8]) -> Result<ChipConfig, CodecError> {
        Ok(match self {
            ChipConfig::Psg(c) => ChipConfig::Psg(PsgConfig::decode(buf, c)?),
            ChipConfig::Fm(c) => ChipConfig::Fm(FmConfig::decode(buf, c)?),
            ChipConfig::Pcm(c) => ChipConfig::Pcm(PcmConfig::decode(buf, c)?),
            ChipConfig::Wave(c) => ChipConfig::Wave(WaveConfig::decode(buf, c)?),
            ChipConfig::Macro(c) => ChipConfig::Macro(MacroConfig::decode(buf, c)?),
            ChipConfig::Instrument(c) => {
                ChipConfig::Instrument(InstrumentConfig::decode(buf, c)?)
            }
            ChipConfig::Hively(c) => ChipConfig::Hively(HivelyConfig::decode(buf, c)?),
        })
    }

    /// Patch implied by `event`, or `None` when this family ignores it.
    pub fn patch_for_event(&self, event: &ParamEvent) -> Option<ConfigPatch> {
        match self {
            ChipConfig::Psg(c) => c.patch_for_event(event).map(ConfigPatch::Psg),
            ChipConfig::Fm(c) => c.patch_for_event(event).map(ConfigPatch::Fm),
            ChipConfig::Pcm(c) => c.patch_for_event(event).map(ConfigPatch::Pcm),
            ChipConfig::Wave(c) => c.patch_for_event(event).map(ConfigPatch::Wave),
            ChipConfig::Macro(c) => c.patch_for_event(event).map(ConfigPatch::Macro),
            ChipConfig::Instrument(_) => None,
            ChipConfig::Hively(c) => c.patch_for_event(event).map(ConfigPatch::Hively),
        }
    }

    /// Apply a patch. A patch for a different family is ignored.
    pub fn merge(&mut self, patch: &ConfigPatch) {
        match (self, patch) {
            (this, ConfigPatch::Snapshot(snapshot)) => *this = snapshot.clone(),
            (ChipConfig::Psg(c), ConfigPatch::Psg(p)) => c.merge(p),
            (ChipConfig::Fm(c), ConfigPatch::Fm(p)) => c.merge(p),
            (ChipConfig::Pcm(c), ConfigPatch::Pcm(p)) => c.merge(p),
            (ChipConfig::Wave(c), ConfigPatch::Wave(p)) => c.merge(p),
            (ChipConfig::Macro(c), ConfigPatch::Macro(p)) => c.merge(p),
            (ChipConfig::Hively(c), ConfigPatch::Hively(p)) => c.merge(p),
            (this, patch) => {
                tracing::warn!(family = %this.family(), ?patch, "patch does not match config family");
            }
        }
    }

    pub fn apply_event(&mut self, event: &ParamEvent) -> Option<ConfigPatch> {
        let patch = self.patch_for_event(event)?;
        self.merge(&patch);
        Some(patch)
    }

    /// Sample data to push through `load_pcm`, if any
    pub fn pcm_sample(&self) -> Option<&[u8]> {
        match self {
            ChipConfig::Pcm(c) => c.sample.as_deref().filter(|s| !s.is_empty()),
            _ => None,
        }
    }
}

//! Config buffer codecs for chip emulator modules
//!
//! Every chip family shares one native module and one fixed binary layout.
//! This crate converts the host-side config of a family to and from that
//! layout, and turns parameter events reported by the module into minimal
//! patches of the host config.

use serde::{Deserialize, Serialize};

mod bytes;
pub mod config;
pub mod error;
pub mod event;
pub mod fm;
pub mod hively;
pub mod instrument;
pub mod macro_seq;
pub mod pcm;
pub mod psg;
pub mod wave;

pub use config::{ChipConfig, ConfigPatch};
pub use error::CodecError;
pub use event::ParamEvent;

/// A group of chips sharing one native module and one buffer layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipFamily {
    Psg,
    Fm,
    Pcm,
    Wave,
    Macro,
    Instrument,
    Hively,
}

impl ChipFamily {
    pub const ALL: [ChipFamily; 7] = [
        ChipFamily::Psg,
        ChipFamily::Fm,
        ChipFamily::Pcm,
        ChipFamily::Wave,
        ChipFamily::Macro,
        ChipFamily::Instrument,
        ChipFamily::Hively,
    ];

    /// Lowercase family name, as used in config files and on the command line
    pub fn name(self) -> &'static str {
        match self {
            ChipFamily::Psg => "psg",
            ChipFamily::Fm => "fm",
            ChipFamily::Pcm => "pcm",
            ChipFamily::Wave => "wave",
            ChipFamily::Macro => "macro",
            ChipFamily::Instrument => "instrument",
            ChipFamily::Hively => "hively",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Fixed length of the family's config buffer
    pub fn config_size(self) -> usize {
        match self {
            ChipFamily::Psg => psg::CONFIG_SIZE,
            ChipFamily::Fm => fm::CONFIG_SIZE,
            ChipFamily::Pcm => pcm::CONFIG_SIZE,
            ChipFamily::Wave => wave::CONFIG_SIZE,
            ChipFamily::Macro => macro_seq::CONFIG_SIZE,
            ChipFamily::Instrument => instrument::CONFIG_SIZE,
            ChipFamily::Hively => hively::CONFIG_SIZE,
        }
    }

    /// Human readable label for fallback panels
    pub fn display_name(self) -> &'static str {
        match self {
            ChipFamily::Psg => "PSG",
            ChipFamily::Fm => "FM",
            ChipFamily::Pcm => "PCM",
            ChipFamily::Wave => "Wavetable",
            ChipFamily::Macro => "Macro Editor",
            ChipFamily::Instrument => "Instrument Editor",
            ChipFamily::Hively => "Hively Instrument Editor",
        }
    }
}

impl std::fmt::Display for ChipFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Encode/decode contract implemented by every family config.
pub trait ChipCodec: Sized {
    const FAMILY: ChipFamily;
    const CONFIG_SIZE: usize;

    /// Minimal change to one sub-object of the config
    type Patch: Clone + std::fmt::Debug;

    /// Serialize into the family's fixed layout. Never fails.
    fn encode(&self) -> Vec<u8>;

    /// Merge a buffer into `existing`, overwriting only what the layout carries.
    fn decode(buf: &[u8], existing: &Self) -> Result<Self, CodecError>;

    /// Compute the patch an event implies, without changing `self`.
    ///
    /// Returns `None` for events this family does not understand.
    fn patch_for_event(&self, event: &ParamEvent) -> Option<Self::Patch>;

    /// Apply a patch previously produced by [`ChipCodec::patch_for_event`].
    fn merge(&mut self, patch: &Self::Patch);

    /// Compute the patch for `event`, merge it, and hand it back for forwarding.
    fn apply_event(&mut self, event: &ParamEvent) -> Option<Self::Patch> {
        let patch = self.patch_for_event(event)?;
        self.merge(&patch);
        Some(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_names_round_trip() {
        for family in ChipFamily::ALL {
            assert_eq!(ChipFamily::from_name(family.name()), Some(family));
        }
        assert_eq!(ChipFamily::from_name("PSG"), Some(ChipFamily::Psg));
        assert_eq!(ChipFamily::from_name("opl"), None);
    }

    #[test]
    fn test_family_sizes() {
        assert_eq!(ChipFamily::Psg.config_size(), 22);
        assert_eq!(ChipFamily::Fm.config_size(), 88);
        assert_eq!(ChipFamily::Pcm.config_size(), 20);
        assert_eq!(ChipFamily::Wave.config_size(), 300);
        assert_eq!(ChipFamily::Macro.config_size(), 264);
        assert_eq!(ChipFamily::Instrument.config_size(), 240);
        assert_eq!(ChipFamily::Hively.config_size(), 22 + 256 * 5);
    }

    #[test]
    fn test_family_serde_is_lowercase() {
        let json = serde_json::to_string(&ChipFamily::Instrument).unwrap();
        assert_eq!(json, "\"instrument\"");
    }
}

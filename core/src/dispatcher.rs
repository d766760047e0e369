//! Routes module callbacks into host config state
//!
//! Handlers run synchronously inside a module call. Each one reads the
//! latest config through the shared cell, merges a minimal patch and
//! forwards that same patch to the listener.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chipbridge_codec::{ChipConfig, ChipFamily, ConfigPatch, ParamEvent};

use crate::surface::SurfaceId;

/// Latest host config of one instance, updated on every `update_config`
pub type SharedConfig = Arc<Mutex<ChipConfig>>;

pub(crate) fn lock_config(config: &SharedConfig) -> MutexGuard<'_, ChipConfig> {
    config.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Host side of an instance's change notifications.
///
/// Called from inside module calls; implementations must not call back
/// into the instance controller synchronously.
pub trait InstanceListener: Send + Sync {
    fn config_changed(&self, patch: &ConfigPatch);

    fn play_sample(&self, playback: SamplePlayback) {
        let _ = playback;
    }

    fn stop_sample(&self) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopKind {
    #[default]
    Off,
    Forward,
    PingPong,
}

impl LoopKind {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => LoopKind::Forward,
            2 => LoopKind::PingPong,
            _ => LoopKind::Off,
        }
    }
}

/// Preview request raised by a module, with the sample copied out of its memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePlayback {
    pub data: Vec<u8>,
    /// Length in samples, not bytes
    pub samples: u32,
    pub loop_start: u32,
    pub loop_len: u32,
    pub loop_kind: LoopKind,
    pub is_16bit: bool,
}

impl SamplePlayback {
    /// Samples as signed 16-bit, widening 8-bit data
    pub fn to_i16(&self) -> Vec<i16> {
        if self.is_16bit {
            self.data
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                .collect()
        } else {
            self.data.iter().map(|&b| i16::from(b as i8) << 8).collect()
        }
    }
}

pub struct CallbackDispatcher {
    family: ChipFamily,
    surface: SurfaceId,
    config: SharedConfig,
    listener: Arc<dyn InstanceListener>,
}

impl CallbackDispatcher {
    pub fn new(
        family: ChipFamily,
        surface: SurfaceId,
        config: SharedConfig,
        listener: Arc<dyn InstanceListener>,
    ) -> Self {
        Self {
            family,
            surface,
            config,
            listener,
        }
    }

    pub fn on_event(&self, event: ParamEvent) {
        // Lock released before the listener runs
        let patch = lock_config(&self.config).apply_event(&event);
        match patch {
            Some(patch) => self.listener.config_changed(&patch),
            None => tracing::debug!(
                family = %self.family,
                surface = %self.surface,
                ?event,
                "event ignored by family"
            ),
        }
    }

    pub fn on_play_sample(&self, playback: SamplePlayback) {
        tracing::debug!(
            family = %self.family,
            samples = playback.samples,
            "sample preview requested"
        );
        self.listener.play_sample(playback);
    }

    pub fn on_stop_sample(&self) {
        self.listener.stop_sample();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingListener;
    use chipbridge_codec::psg::{self, PsgChip, PsgConfig, PsgPatch};

    fn c64_config() -> SharedConfig {
        let mut psg = PsgConfig {
            subtype: PsgChip::C64,
            ..PsgConfig::default()
        };
        psg.c64 = Some(psg::C64Voice {
            duty: 0x0800,
            ..psg::C64Voice::default()
        });
        Arc::new(Mutex::new(ChipConfig::Psg(psg)))
    }

    #[test]
    fn test_event_patches_shared_config_and_notifies() {
        let config = c64_config();
        let listener = Arc::new(RecordingListener::default());
        let dispatcher =
            CallbackDispatcher::new(ChipFamily::Psg, SurfaceId(1), config.clone(), listener.clone());

        dispatcher.on_event(ParamEvent::Param {
            id: psg::PARAM_DUTY,
            value: 0x12,
        });

        let ChipConfig::Psg(psg) = &*lock_config(&config) else {
            panic!("family changed");
        };
        assert_eq!(psg.c64.as_ref().map(|v| v.duty), Some(0x0812));
        let patches = listener.patches();
        assert_eq!(patches.len(), 1);
        assert!(matches!(patches[0], ConfigPatch::Psg(PsgPatch::C64(_))));
    }

    #[test]
    fn test_handler_reads_latest_config() {
        let config = c64_config();
        let listener = Arc::new(RecordingListener::default());
        let dispatcher =
            CallbackDispatcher::new(ChipFamily::Psg, SurfaceId(1), config.clone(), listener);

        // Host changes the config after registration
        if let ChipConfig::Psg(psg) = &mut *lock_config(&config)
            && let Some(voice) = psg.c64.as_mut()
        {
            voice.duty = 0x0300;
        }

        dispatcher.on_event(ParamEvent::Param {
            id: psg::PARAM_DUTY,
            value: 0x40,
        });
        let ChipConfig::Psg(psg) = &*lock_config(&config) else {
            panic!("family changed");
        };
        assert_eq!(psg.c64.as_ref().map(|v| v.duty), Some(0x0340));
    }

    #[test]
    fn test_unknown_event_is_dropped() {
        let config = c64_config();
        let before = lock_config(&config).clone();
        let listener = Arc::new(RecordingListener::default());
        let dispatcher =
            CallbackDispatcher::new(ChipFamily::Psg, SurfaceId(1), config.clone(), listener.clone());

        dispatcher.on_event(ParamEvent::TableSelect(3));
        assert!(listener.patches().is_empty());
        assert_eq!(*lock_config(&config), before);
    }

    #[test]
    fn test_sample_widening() {
        let eight = SamplePlayback {
            data: vec![0x7F, 0x80],
            samples: 2,
            loop_start: 0,
            loop_len: 0,
            loop_kind: LoopKind::Off,
            is_16bit: false,
        };
        assert_eq!(eight.to_i16(), vec![0x7F00, i16::MIN]);

        let sixteen = SamplePlayback {
            data: vec![0x34, 0x12],
            samples: 1,
            is_16bit: true,
            ..eight
        };
        assert_eq!(sixteen.to_i16(), vec![0x1234]);
        assert_eq!(LoopKind::from_raw(2), LoopKind::PingPong);
        assert_eq!(LoopKind::from_raw(7), LoopKind::Off);
    }
}

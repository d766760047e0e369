//! Per-family native entry point table
//!
//! Each family's module exports the same capability set under its own
//! symbol names. Names are resolved once here instead of being probed at
//! call sites.

use chipbridge_codec::ChipFamily;

/// Export names and lifecycle quirks of one family's module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyAbi {
    pub family: ChipFamily,
    /// Module file stem, used for the default URL
    pub module: &'static str,
    /// Constructor export
    pub factory: &'static str,
    pub init: &'static str,
    pub start: &'static str,
    pub shutdown: &'static str,
    pub load_config: &'static str,
    pub dump_config: Option<&'static str>,
    pub load_pcm: Option<&'static str>,
    /// Single frame advance, when the module has no main loop of its own
    pub tick: Option<&'static str>,
    /// Called with the instrument type byte before each config push
    pub set_chip_type: Option<&'static str>,
    /// Dump and decode the module's state right before shutdown
    pub recapture_on_dispose: bool,
}

impl FamilyAbi {
    pub fn default_url(&self) -> String {
        format!("{}.wasm", self.module)
    }
}

const PSG: FamilyAbi = FamilyAbi {
    family: ChipFamily::Psg,
    module: "furnace_psg",
    factory: "create_furnace_psg",
    init: "furnace_psg_init",
    start: "furnace_psg_start",
    shutdown: "furnace_psg_shutdown",
    load_config: "furnace_psg_load_config",
    dump_config: Some("furnace_psg_dump_config"),
    load_pcm: None,
    tick: Some("furnace_psg_tick"),
    set_chip_type: None,
    recapture_on_dispose: false,
};

const FM: FamilyAbi = FamilyAbi {
    family: ChipFamily::Fm,
    module: "furnace_fm",
    factory: "create_furnace_fm",
    init: "furnace_fm_init",
    start: "furnace_fm_start",
    shutdown: "furnace_fm_shutdown",
    load_config: "furnace_fm_load_config",
    dump_config: Some("furnace_fm_dump_config"),
    load_pcm: None,
    tick: Some("furnace_fm_tick"),
    set_chip_type: None,
    recapture_on_dispose: false,
};

const PCM: FamilyAbi = FamilyAbi {
    family: ChipFamily::Pcm,
    module: "furnace_pcm",
    factory: "create_furnace_pcm",
    init: "furnace_pcm_init",
    start: "furnace_pcm_start",
    shutdown: "furnace_pcm_shutdown",
    load_config: "furnace_pcm_load_config",
    dump_config: Some("furnace_pcm_dump_config"),
    load_pcm: Some("furnace_pcm_load_pcm"),
    tick: Some("furnace_pcm_tick"),
    set_chip_type: None,
    recapture_on_dispose: false,
};

const WAVE: FamilyAbi = FamilyAbi {
    family: ChipFamily::Wave,
    module: "furnace_wave",
    factory: "create_furnace_wave",
    init: "furnace_wave_init",
    start: "furnace_wave_start",
    shutdown: "furnace_wave_shutdown",
    load_config: "furnace_wave_load_config",
    dump_config: Some("furnace_wave_dump_config"),
    load_pcm: None,
    tick: Some("furnace_wave_tick"),
    set_chip_type: None,
    recapture_on_dispose: false,
};

const MACRO: FamilyAbi = FamilyAbi {
    family: ChipFamily::Macro,
    module: "furnace_macro",
    factory: "create_furnace_macro",
    init: "furnace_macro_init",
    start: "furnace_macro_start",
    shutdown: "furnace_macro_shutdown",
    load_config: "furnace_macro_load_config",
    dump_config: Some("furnace_macro_dump_config"),
    load_pcm: None,
    tick: Some("furnace_macro_tick"),
    set_chip_type: None,
    recapture_on_dispose: false,
};

// The instrument editor keeps edits that never come back through
// update_config, so its state is dumped before shutdown.
const INSTRUMENT: FamilyAbi = FamilyAbi {
    family: ChipFamily::Instrument,
    module: "furnace_insed",
    factory: "create_furnace_insed",
    init: "furnace_insed_init",
    start: "furnace_insed_start",
    shutdown: "furnace_insed_shutdown",
    load_config: "furnace_insed_load_config",
    dump_config: Some("furnace_insed_dump_config"),
    load_pcm: None,
    tick: Some("furnace_insed_tick"),
    set_chip_type: Some("furnace_insed_set_chip_type"),
    recapture_on_dispose: true,
};

const HIVELY: FamilyAbi = FamilyAbi {
    family: ChipFamily::Hively,
    module: "hively_insed",
    factory: "create_hively_insed",
    init: "insed_init",
    start: "insed_start",
    shutdown: "insed_shutdown",
    load_config: "insed_load_from_buffer",
    dump_config: Some("insed_dump_to_buffer"),
    load_pcm: None,
    tick: Some("insed_tick"),
    set_chip_type: None,
    recapture_on_dispose: false,
};

/// Entry point table for `family`
pub fn abi(family: ChipFamily) -> &'static FamilyAbi {
    match family {
        ChipFamily::Psg => &PSG,
        ChipFamily::Fm => &FM,
        ChipFamily::Pcm => &PCM,
        ChipFamily::Wave => &WAVE,
        ChipFamily::Macro => &MACRO,
        ChipFamily::Instrument => &INSTRUMENT,
        ChipFamily::Hively => &HIVELY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_family() {
        for family in ChipFamily::ALL {
            assert_eq!(abi(family).family, family);
        }
    }

    #[test]
    fn test_only_pcm_loads_samples() {
        for family in ChipFamily::ALL {
            assert_eq!(abi(family).load_pcm.is_some(), family == ChipFamily::Pcm);
        }
    }

    #[test]
    fn test_only_instrument_editor_recaptures() {
        let recapturing: Vec<_> = ChipFamily::ALL
            .into_iter()
            .filter(|f| abi(*f).recapture_on_dispose)
            .collect();
        assert_eq!(recapturing, vec![ChipFamily::Instrument]);
        assert!(abi(ChipFamily::Instrument).dump_config.is_some());
    }

    #[test]
    fn test_hively_uses_buffer_entry_points() {
        let hively = abi(ChipFamily::Hively);
        assert_eq!(hively.load_config, "insed_load_from_buffer");
        assert_eq!(hively.dump_config, Some("insed_dump_to_buffer"));
        assert_eq!(hively.default_url(), "hively_insed.wasm");
    }
}

//! Bridge error taxonomy
//!
//! Every error is local to one instance. None of them touch the registry
//! cache or another instance's state, and none are retried automatically:
//! the host re-mounts to try again.

use std::time::Duration;

use chipbridge_codec::ChipFamily;
use thiserror::Error;

/// Errors reported by the registry, the arbiter and instance controllers.
///
/// `Clone` so a single failed load can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The module loaded but does not export its factory symbol
    #[error("module '{url}' does not export factory '{symbol}'")]
    ModuleResolution { symbol: String, url: String },

    #[error("failed to fetch module '{url}': {message}")]
    Fetch { url: String, message: String },

    #[error("failed to compile module '{url}': {message}")]
    Compile { url: String, message: String },

    /// Factory, entry point, init or initial config push failed
    #[error("{} module failed to initialize: {message}", family.display_name())]
    Initialization { family: ChipFamily, message: String },

    /// Gave up waiting for the surface alias
    #[error("timed out after {waited:?} waiting for the surface alias")]
    Timeout { waited: Duration },

    #[error("instance has been disposed")]
    Disposed,

    #[error("instance is not ready")]
    NotReady,

    #[error("config push failed: {0}")]
    ConfigPush(String),

    /// A module call after startup trapped
    #[error("{} module call failed: {message}", family.display_name())]
    Call { family: ChipFamily, message: String },
}

impl BridgeError {
    /// Wrap a wasm-side failure as an initialization error, keeping the full cause chain.
    pub fn initialization(family: ChipFamily, err: &anyhow::Error) -> Self {
        BridgeError::Initialization {
            family,
            message: format!("{err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_keeps_cause_chain() {
        let err = anyhow::anyhow!("out of bounds").context("furnace_fm_init failed");
        let bridge = BridgeError::initialization(ChipFamily::Fm, &err);
        assert_eq!(
            bridge.to_string(),
            "FM module failed to initialize: furnace_fm_init failed: out of bounds"
        );
    }

    #[test]
    fn test_resolution_names_symbol_and_url() {
        let err = BridgeError::ModuleResolution {
            symbol: "create_furnace_psg".into(),
            url: "modules/furnace_psg.wasm".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("create_furnace_psg"));
        assert!(msg.contains("modules/furnace_psg.wasm"));
    }
}

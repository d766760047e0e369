//! Bridge configuration (bridge.toml)
//!
//! Settings live in TOML in the platform config directory. A missing or
//! unreadable file yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chipbridge_codec::ChipFamily;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::family::abi;
use crate::registry::ModuleDescriptor;

/// Default linear memory cap per module instance (64MB)
pub const DEFAULT_RAM_LIMIT: usize = 64 * 1024 * 1024;

pub const CONFIG_FILE: &str = "bridge.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    /// Where modules come from
    #[serde(default)]
    pub modules: ModulesConfig,
    /// Surface alias queue settings
    #[serde(default)]
    pub arbiter: ArbiterConfig,
    /// Per-instance runtime limits
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Base directory or URL prefix for relative module URLs (default: "modules")
    #[serde(default = "default_root")]
    pub root: String,
    /// Descriptor overrides keyed by family name
    #[serde(default)]
    pub overrides: HashMap<String, ModuleOverride>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleOverride {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub factory: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbiterConfig {
    /// Bounded wait for the alias queue in milliseconds; absent waits forever
    #[serde(default)]
    pub wait_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Linear memory cap per instance in bytes (default: 64MB)
    #[serde(default = "default_ram_limit")]
    pub ram_limit: usize,
    /// Surface size passed to the module's init (default: 640x480)
    #[serde(default = "default_surface_width")]
    pub surface_width: u32,
    #[serde(default = "default_surface_height")]
    pub surface_height: u32,
}

fn default_root() -> String {
    "modules".to_string()
}
fn default_ram_limit() -> usize {
    DEFAULT_RAM_LIMIT
}
fn default_surface_width() -> u32 {
    640
}
fn default_surface_height() -> u32 {
    480
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            overrides: HashMap::new(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ram_limit: default_ram_limit(),
            surface_width: default_surface_width(),
            surface_height: default_surface_height(),
        }
    }
}

impl ArbiterConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }
}

impl BridgeConfig {
    /// Module descriptor for `family`, with overrides applied and the URL
    /// resolved against `[modules] root`.
    pub fn descriptor_for(&self, family: ChipFamily) -> ModuleDescriptor {
        let abi = abi(family);
        let overrides = self.modules.overrides.get(family.name());
        let url = overrides
            .and_then(|o| o.url.clone())
            .unwrap_or_else(|| abi.default_url());
        let factory = overrides
            .and_then(|o| o.factory.clone())
            .unwrap_or_else(|| abi.factory.to_string());
        ModuleDescriptor {
            url: resolve_url(&self.modules.root, &url),
            factory,
        }
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || Path::new(url).is_absolute()
}

fn resolve_url(root: &str, url: &str) -> String {
    if root.is_empty() || is_absolute(url) {
        url.to_string()
    } else {
        format!("{}/{}", root.trim_end_matches('/'), url)
    }
}

/// Returns the platform-specific config directory.
///
/// On Linux: `~/.config/ChipBridge`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.nethercore", "", "ChipBridge")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads `bridge.toml` from the platform config directory.
pub fn load() -> BridgeConfig {
    match config_dir() {
        Some(dir) => load_from(&dir.join(CONFIG_FILE)),
        None => BridgeConfig::default(),
    }
}

/// Loads a config file, falling back to defaults if it is missing or invalid.
pub fn load_from(path: &Path) -> BridgeConfig {
    let Ok(content) = std::fs::read_to_string(path) else {
        return BridgeConfig::default();
    };
    match toml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), "invalid bridge config, using defaults: {}", e);
            BridgeConfig::default()
        }
    }
}

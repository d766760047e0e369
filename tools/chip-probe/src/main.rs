//! Chip Probe - Command-line access to the chip bridge
//!
//! # Commands
//!
//! - `probe encode <family> <config.json>` - Print a config's wire buffer as hex
//! - `probe decode <family> <hex>` - Decode a wire buffer into config JSON
//! - `probe run <family> <config.json>` - Mount the family's module, drive it, print every patch
//!
//! # Usage
//!
//! ```bash
//! probe encode psg voice.json
//! probe decode psg 0c05000000080f00...
//! RUST_LOG=debug probe run fm patch.json --ticks 60 --modules ./modules
//! ```

mod decode;
mod encode;
mod run;

use anyhow::{Context, Result};
use chipbridge_codec::{ChipConfig, ChipFamily};
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Chip Probe - Inspect chip module configs and modules
#[derive(Parser)]
#[command(name = "probe")]
#[command(about = "Encode, decode and run chip emulator module configs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the encoded config buffer as hex
    Encode(encode::EncodeArgs),

    /// Decode a hex buffer into config JSON
    Decode(decode::DecodeArgs),

    /// Mount a module through the bridge and print what it reports
    Run(run::RunArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode(args) => encode::execute(args),
        Commands::Decode(args) => decode::execute(args),
        Commands::Run(args) => run::execute(args),
    }
}

/// Parse a family name for clap
pub(crate) fn parse_family(name: &str) -> Result<ChipFamily, String> {
    ChipFamily::from_name(name).ok_or_else(|| {
        let known: Vec<_> = ChipFamily::ALL.iter().map(|f| f.name()).collect();
        format!("unknown family '{}' (expected one of: {})", name, known.join(", "))
    })
}

/// Read a family config from a JSON file.
///
/// The file holds the family's fields only; the family tag is added here.
pub(crate) fn read_config(family: ChipFamily, path: &Path) -> Result<ChipConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    config_from_json(family, &content).with_context(|| format!("Invalid config in {}", path.display()))
}

pub(crate) fn config_from_json(family: ChipFamily, json: &str) -> Result<ChipConfig> {
    let mut value: serde_json::Value = serde_json::from_str(json)?;
    let object = value
        .as_object_mut()
        .context("config must be a JSON object")?;
    object.insert("family".into(), serde_json::Value::String(family.name().into()));
    Ok(serde_json::from_value(value)?)
}

/// Serialize a config without its family tag, the same shape `read_config` accepts
pub(crate) fn config_to_json(config: &ChipConfig) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(config)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("family");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_family() {
        assert_eq!(parse_family("fm"), Ok(ChipFamily::Fm));
        assert_eq!(parse_family("Hively"), Ok(ChipFamily::Hively));
        let err = parse_family("opl").unwrap_err();
        assert!(err.contains("psg"));
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = ChipConfig::default_for(ChipFamily::Wave);
        let json = config_to_json(&config).unwrap();
        assert!(json.get("family").is_none());

        let back = config_from_json(ChipFamily::Wave, &json.to_string()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_config_must_be_object() {
        assert!(config_from_json(ChipFamily::Psg, "[1, 2]").is_err());
    }

    #[test]
    fn test_read_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.json");
        std::fs::write(&path, r#"{ "subtype": "C64" }"#).unwrap();

        let config = read_config(ChipFamily::Psg, &path).unwrap();
        assert_eq!(config.family(), ChipFamily::Psg);
    }
}

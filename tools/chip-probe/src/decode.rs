//! Decode command - wire buffer to config JSON

use anyhow::{Context, Result, bail};
use chipbridge_codec::{ChipConfig, ChipFamily};
use clap::Args;
use std::path::PathBuf;

use crate::{config_to_json, parse_family, read_config};

/// Arguments for the decode command
#[derive(Args)]
pub struct DecodeArgs {
    /// Chip family (psg, fm, pcm, wave, macro, instrument, hively)
    #[arg(value_parser = parse_family)]
    pub family: ChipFamily,

    /// Buffer as hex; whitespace is ignored
    pub hex: String,

    /// Existing config to merge into (defaults to the family's defaults)
    #[arg(short, long)]
    pub base: Option<PathBuf>,
}

/// Execute the decode command
pub fn execute(args: DecodeArgs) -> Result<()> {
    let buf = parse_hex(&args.hex)?;
    let base = match &args.base {
        Some(path) => read_config(args.family, path)?,
        None => ChipConfig::default_for(args.family),
    };

    let decoded = base
        .decode(&buf)
        .with_context(|| format!("Failed to decode {} buffer", args.family))?;
    println!("{}", serde_json::to_string_pretty(&config_to_json(&decoded)?)?);
    Ok(())
}

pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        bail!("hex input has an odd number of digits ({})", digits.len());
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).context("hex input is not ASCII")?;
            u8::from_str_radix(pair, 16).with_context(|| format!("invalid hex byte '{}'", pair))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::to_hex;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("00 0f\nA5ff").unwrap(), vec![0x00, 0x0f, 0xa5, 0xff]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_decode_encoded_default() {
        let config = ChipConfig::default_for(ChipFamily::Fm);
        let buf = parse_hex(&to_hex(&config.encode())).unwrap();
        assert_eq!(config.decode(&buf).unwrap(), config);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let config = ChipConfig::default_for(ChipFamily::Psg);
        assert!(config.decode(&parse_hex("0102").unwrap()).is_err());
    }
}

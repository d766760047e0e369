//! Encode command - config JSON to wire buffer

use anyhow::Result;
use chipbridge_codec::ChipFamily;
use clap::Args;
use std::path::PathBuf;

use crate::{parse_family, read_config};

/// Arguments for the encode command
#[derive(Args)]
pub struct EncodeArgs {
    /// Chip family (psg, fm, pcm, wave, macro, instrument, hively)
    #[arg(value_parser = parse_family)]
    pub family: ChipFamily,

    /// Config JSON file with the family's fields
    pub config: PathBuf,

    /// Print 16 bytes per line with offsets
    #[arg(long)]
    pub dump: bool,
}

/// Execute the encode command
pub fn execute(args: EncodeArgs) -> Result<()> {
    let config = read_config(args.family, &args.config)?;
    let buf = config.encode();
    tracing::debug!(family = %args.family, bytes = buf.len(), "encoded config");

    if args.dump {
        print!("{}", hex_dump(&buf));
    } else {
        println!("{}", to_hex(&buf));
    }
    Ok(())
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(row, chunk)| {
            let cells: Vec<_> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            format!("{:04x}  {}\n", row * 16, cells.join(" "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x00, 0x0f, 0xa5, 0xff]), "000fa5ff");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn test_hex_dump_rows() {
        let bytes: Vec<u8> = (0..20).collect();
        let dump = hex_dump(&bytes);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000  00 01 02"));
        assert_eq!(lines[1], "0010  10 11 12 13");
    }
}

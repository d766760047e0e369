//! Codec error types

use thiserror::Error;

use crate::ChipFamily;

/// Errors raised while decoding a module's config buffer.
///
/// Encoding never fails: every missing field falls back to a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("{family} buffer too short: expected {expected} bytes, got {actual}")]
    Truncated {
        family: ChipFamily,
        expected: usize,
        actual: usize,
    },

    #[error("{family} buffer has wrong magic byte 0x{found:02X} (expected 0x{expected:02X})")]
    WrongMagic {
        family: ChipFamily,
        expected: u8,
        found: u8,
    },
}

/// Fail with [`CodecError::Truncated`] unless `buf` holds at least `expected` bytes.
pub(crate) fn check_len(family: ChipFamily, buf: &[u8], expected: usize) -> Result<(), CodecError> {
    if buf.len() < expected {
        return Err(CodecError::Truncated {
            family,
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

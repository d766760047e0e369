//! Little-endian field helpers shared by every layout

use byteorder::{ByteOrder, LittleEndian};

pub(crate) fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    LittleEndian::write_u16(&mut buf[offset..offset + 2], value);
}

pub(crate) fn get_u16(buf: &[u8], offset: usize) -> u16 {
    LittleEndian::read_u16(&buf[offset..offset + 2])
}

pub(crate) fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    LittleEndian::write_u32(&mut buf[offset..offset + 4], value);
}

pub(crate) fn get_u32(buf: &[u8], offset: usize) -> u32 {
    LittleEndian::read_u32(&buf[offset..offset + 4])
}

pub(crate) fn put_i32(buf: &mut [u8], offset: usize, value: i32) {
    LittleEndian::write_i32(&mut buf[offset..offset + 4], value);
}

pub(crate) fn get_i32(buf: &[u8], offset: usize) -> i32 {
    LittleEndian::read_i32(&buf[offset..offset + 4])
}

/// Two's-complement narrowing of a signed field into one byte.
pub(crate) fn put_i8(buf: &mut [u8], offset: usize, value: i8) {
    buf[offset] = value as u8;
}

pub(crate) fn get_i8(buf: &[u8], offset: usize) -> i8 {
    buf[offset] as i8
}

/// Saturate a callback value (native side reports `int`) into a byte field.
pub(crate) fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, u8::MAX as i32) as u8
}

pub(crate) fn clamp_i8(value: i32) -> i8 {
    value.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

pub(crate) fn clamp_u16(value: i32) -> u16 {
    value.clamp(0, u16::MAX as i32) as u16
}

/// True when every byte of the range is zero (an absent optional block).
pub(crate) fn is_zeroed(buf: &[u8]) -> bool {
    buf.iter().all(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_narrowing_inverts() {
        let mut buf = [0u8; 2];
        for v in [i8::MIN, -1, 0, 1, i8::MAX] {
            put_i8(&mut buf, 1, v);
            assert_eq!(get_i8(&buf, 1), v);
        }
        put_i8(&mut buf, 0, -3);
        assert_eq!(buf[0], 0xFD);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut buf = [0u8; 8];
        put_u16(&mut buf, 0, 0x0812);
        put_u32(&mut buf, 2, 0xAABB_CCDD);
        assert_eq!(&buf[..6], &[0x12, 0x08, 0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(get_u16(&buf, 0), 0x0812);
        assert_eq!(get_u32(&buf, 2), 0xAABB_CCDD);
    }

    #[test]
    fn test_clamps() {
        assert_eq!(clamp_u8(-5), 0);
        assert_eq!(clamp_u8(300), 255);
        assert_eq!(clamp_i8(-200), -128);
        assert_eq!(clamp_u16(70_000), u16::MAX);
    }
}

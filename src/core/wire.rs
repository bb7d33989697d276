//! Little-endian wire primitives.
//!
//! All SMB2 integer fields are little-endian. Callers are expected to have
//! bounds-checked the buffer before reading; these helpers only index.

/// Read a little-endian u16 at `offset`.
pub fn get_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Read a little-endian u32 at `offset`.
pub fn get_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Read a little-endian u64 at `offset`.
pub fn get_u64(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
        buf[offset + 4],
        buf[offset + 5],
        buf[offset + 6],
        buf[offset + 7],
    ])
}

/// Write a little-endian u16 at `offset`.
pub fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Write a little-endian u32 at `offset`.
pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Write a little-endian u64 at `offset`.
pub fn put_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let mut buf = [0u8; 16];
        put_u16(&mut buf, 0, 0x1234);
        put_u32(&mut buf, 2, 0xDEAD_BEEF);
        put_u64(&mut buf, 6, 0x0123_4567_89AB_CDEF);
        assert_eq!(get_u16(&buf, 0), 0x1234);
        assert_eq!(get_u32(&buf, 2), 0xDEAD_BEEF);
        assert_eq!(get_u64(&buf, 6), 0x0123_4567_89AB_CDEF);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut buf = [0u8; 4];
        put_u32(&mut buf, 0, 0x0000_0103);
        assert_eq!(buf, [0x03, 0x01, 0x00, 0x00]);
    }
}

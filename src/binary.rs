//! Checked reads for RakNet wire data.
//!
//! All multi-byte integers on the wire are big-endian. Every reader checks
//! the remaining length first and fails with [`Error::UnexpectedEof`]
//! instead of panicking, so truncated datagrams surface as decode errors.

use bytes::Buf;

use crate::error::{Error, Result};

/// Reads a single byte from the buffer.
pub fn read_u8<B: Buf>(buf: &mut B) -> Result<u8> {
    if buf.remaining() < 1 {
        return Err(Error::UnexpectedEof);
    }
    Ok(buf.get_u8())
}

/// Reads a big-endian u16 from the buffer.
pub fn read_u16<B: Buf>(buf: &mut B) -> Result<u16> {
    if buf.remaining() < 2 {
        return Err(Error::UnexpectedEof);
    }
    Ok(buf.get_u16())
}

/// Reads a big-endian u32 from the buffer.
pub fn read_u32<B: Buf>(buf: &mut B) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(Error::UnexpectedEof);
    }
    Ok(buf.get_u32())
}

/// Reads a big-endian u64 from the buffer.
pub fn read_u64<B: Buf>(buf: &mut B) -> Result<u64> {
    if buf.remaining() < 8 {
        return Err(Error::UnexpectedEof);
    }
    Ok(buf.get_u64())
}

/// Reads a big-endian i64 from the buffer.
pub fn read_i64<B: Buf>(buf: &mut B) -> Result<i64> {
    if buf.remaining() < 8 {
        return Err(Error::UnexpectedEof);
    }
    Ok(buf.get_i64())
}

/// Reads `N` raw bytes from the buffer.
pub fn read_bytes<B: Buf, const N: usize>(buf: &mut B) -> Result<[u8; N]> {
    if buf.remaining() < N {
        return Err(Error::UnexpectedEof);
    }
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Skips `n` bytes in the buffer.
pub fn skip<B: Buf>(buf: &mut B, n: usize) -> Result<()> {
    if buf.remaining() < n {
        return Err(Error::UnexpectedEof);
    }
    buf.advance(n);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integers() {
        let mut buf: &[u8] = &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(read_u16(&mut buf).unwrap(), 0x0102);
        assert_eq!(read_u32(&mut buf).unwrap(), 0x03040506);
        assert_eq!(read_u8(&mut buf).unwrap(), 0x07);
        assert!(read_u16(&mut buf).is_err());
    }

    #[test]
    fn test_read_u64_eof() {
        let mut buf: &[u8] = &[0u8; 7];
        assert!(matches!(read_u64(&mut buf), Err(Error::UnexpectedEof)));
        // Position unchanged on failure
        assert_eq!(buf.remaining(), 7);
    }

    #[test]
    fn test_skip_and_bytes() {
        let mut buf: &[u8] = &[1, 2, 3, 4, 5];
        skip(&mut buf, 2).unwrap();
        let rest: [u8; 3] = read_bytes(&mut buf).unwrap();
        assert_eq!(rest, [3, 4, 5]);
        assert!(skip(&mut buf, 1).is_err());
    }
}

// Variable-length integers for the patch format.
//
// Base-128, big-endian: most-significant group first. Every byte except the
// last has bit 7 set. Encodings are minimal: a leading 0x80 byte (a redundant
// zero group) is rejected on read, so each value has exactly one encoding.
//
// Signed values (relative copy offsets) are zig-zag mapped onto u64 first.

use std::io::{self, Read, Write};

use thiserror::Error;

/// Maximum encoded length for a 64-bit value (ceil(64/7) = 10).
pub const MAX_VARINT_LEN: usize = 10;

/// Overflow guard: if these bits are set before a shift, `<< 7` would overflow.
const U64_OVERFLOW_MASK: u64 = 0xFE00_0000_0000_0000;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a `u64` into the tail of `buf`.
/// Returns the number of bytes written (1..=10); they occupy `buf[10 - n..]`.
#[inline]
pub fn encode_u64(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = MAX_VARINT_LEN;
    loop {
        i -= 1;
        buf[i] = (num as u8 & 0x7F) | 0x80;
        num >>= 7;
        if num == 0 {
            break;
        }
    }
    buf[MAX_VARINT_LEN - 1] &= 0x7F;
    MAX_VARINT_LEN - i
}

/// Append a `u64` to a byte vector.
#[inline]
pub fn push_u64(out: &mut Vec<u8>, num: u64) {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num, &mut buf);
    out.extend_from_slice(&buf[MAX_VARINT_LEN - len..]);
}

/// Append a zig-zag encoded `i64` to a byte vector.
#[inline]
pub fn push_i64(out: &mut Vec<u8>, num: i64) {
    push_u64(out, zigzag_encode(num));
}

/// Encode a `u64` and write it to a `Write` sink.
pub fn write_u64<W: Write>(w: &mut W, num: u64) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num, &mut buf);
    w.write_all(&buf[MAX_VARINT_LEN - len..])
}

/// Encode a `usize` and write it to a `Write` sink.
pub fn write_usize<W: Write>(w: &mut W, num: usize) -> io::Result<()> {
    write_u64(w, num as u64)
}

#[inline]
pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

#[inline]
pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

// ---------------------------------------------------------------------------
// Decoding from byte slices
// ---------------------------------------------------------------------------

/// Decode a `u64` from the start of `data`.
/// Returns `(value, bytes_consumed)`.
pub fn read_u64(data: &[u8]) -> Result<(u64, usize), VarIntError> {
    let mut val: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if i == 0 && byte == 0x80 {
            return Err(VarIntError::NonCanonical);
        }
        if val & U64_OVERFLOW_MASK != 0 {
            return Err(VarIntError::Overflow);
        }
        val = (val << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(VarIntError::Underflow)
}

/// Decode a zig-zag encoded `i64` from the start of `data`.
pub fn read_i64(data: &[u8]) -> Result<(i64, usize), VarIntError> {
    let (raw, len) = read_u64(data)?;
    Ok((zigzag_decode(raw), len))
}

/// Decode a `usize` from the start of `data`.
pub fn read_usize(data: &[u8]) -> Result<(usize, usize), VarIntError> {
    let (val, len) = read_u64(data)?;
    let val = usize::try_from(val).map_err(|_| VarIntError::Overflow)?;
    Ok((val, len))
}

// ---------------------------------------------------------------------------
// Decoding from `Read`
// ---------------------------------------------------------------------------

/// Read a `u64` varint from a streaming source.
///
/// A stream that ends mid-integer yields `ErrorKind::UnexpectedEof`; overflow
/// and non-minimal encodings yield `ErrorKind::InvalidData`.
pub fn stream_read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut val: u64 = 0;
    let mut buf = [0u8; 1];
    let mut first = true;
    loop {
        r.read_exact(&mut buf)?;
        let byte = buf[0];
        if first && byte == 0x80 {
            return Err(VarIntError::NonCanonical.into());
        }
        first = false;
        if val & U64_OVERFLOW_MASK != 0 {
            return Err(VarIntError::Overflow.into());
        }
        val = (val << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok(val);
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Encoded byte-length of a `u64` value.
#[inline]
pub fn sizeof_u64(num: u64) -> usize {
    let bits = 64 - num.leading_zeros();
    (bits.max(1).div_ceil(7) as usize).min(MAX_VARINT_LEN)
}

/// Encoded byte-length of a `usize` value.
#[inline]
pub fn sizeof_usize(num: usize) -> usize {
    sizeof_u64(num as u64)
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VarIntError {
    /// Not enough input bytes to complete the integer.
    #[error("varint underflow (truncated input)")]
    Underflow,
    /// Value would overflow the target integer type.
    #[error("varint overflow")]
    Overflow,
    /// Leading redundant continuation byte.
    #[error("non-canonical varint encoding")]
    NonCanonical,
}

impl From<VarIntError> for io::Error {
    fn from(e: VarIntError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_u64() {
        let cases: &[u64] = &[
            0,
            1,
            127,
            128,
            255,
            16383,
            16384,
            u32::MAX as u64,
            u64::MAX,
        ];
        let mut buf = [0u8; MAX_VARINT_LEN];
        for &val in cases {
            let len = encode_u64(val, &mut buf);
            let (decoded, consumed) = read_u64(&buf[MAX_VARINT_LEN - len..]).unwrap();
            assert_eq!(decoded, val, "roundtrip failed for {val}");
            assert_eq!(consumed, len, "length mismatch for {val}");
            assert_eq!(sizeof_u64(val), len, "sizeof mismatch for {val}");
        }
    }

    #[test]
    fn encoding_is_big_endian() {
        // 300 = (10) (0101100) = 0x82 0x2C
        let mut out = Vec::new();
        push_u64(&mut out, 300);
        assert_eq!(out, [0x82, 0x2C]);
    }

    #[test]
    fn redundant_leading_group_rejected() {
        // 0x80 0x05 would also decode to 5 without the canonical check.
        assert_eq!(read_u64(&[0x80, 0x05]), Err(VarIntError::NonCanonical));
        assert_eq!(read_u64(&[0x05]), Ok((5, 1)));
        assert_eq!(read_u64(&[0x00]), Ok((0, 1)));

        let mut cursor = std::io::Cursor::new([0x80u8, 0x80, 0x01]);
        let err = stream_read_u64(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn underflow_detection() {
        assert_eq!(read_u64(&[0x81, 0x80, 0x80]), Err(VarIntError::Underflow));
        assert_eq!(read_u64(&[]), Err(VarIntError::Underflow));

        let mut cursor = std::io::Cursor::new([0x81u8]);
        let err = stream_read_u64(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn overflow_detection() {
        let data = [0xFF; 11];
        assert_eq!(read_u64(&data), Err(VarIntError::Overflow));
    }

    #[test]
    fn zigzag_mapping() {
        for (signed, unsigned) in [(0i64, 0u64), (-1, 1), (1, 2), (-2, 3), (2, 4)] {
            assert_eq!(zigzag_encode(signed), unsigned);
            assert_eq!(zigzag_decode(unsigned), signed);
        }
        for v in [i64::MIN, i64::MAX, -1_000_000, 1_000_000] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }

        let mut out = Vec::new();
        push_i64(&mut out, -300);
        assert_eq!(read_i64(&out), Ok((-300, out.len())));
    }

    #[test]
    fn streaming_matches_slice_decoding() {
        let mut out = Vec::new();
        write_u64(&mut out, 123_456_789).unwrap();
        let mut cursor = std::io::Cursor::new(&out);
        assert_eq!(stream_read_u64(&mut cursor).unwrap(), 123_456_789);
        assert_eq!(read_usize(&out), Ok((123_456_789, out.len())));
    }
}

// Stream header and per-window header encoding/decoding.
//
// Stream header:
//   magic (4) | version (1) | flags (1) | [secondary id (1)]
//   | source length (varint) | [target length (varint)]
//   | [app header length (varint) | app header bytes]
//
// Window record:
//   target length (varint, 0 = end of stream) | window flags (1)
//   | [source offset (varint) | source length (varint)]
//   | payload length (varint) | payload Adler-32 (4, BE)
//   | target Adler-32 (4, BE) | payload bytes
//
// Both checksums precede the payload so a reader can validate or skip a
// window without parsing its instructions.

use std::io::{Read, Write};

use bitflags::bitflags;

use super::error::DecodeError;
use super::varint;

// ---------------------------------------------------------------------------
// Magic and version
// ---------------------------------------------------------------------------

pub const MAGIC: [u8; 4] = [0x89, b'O', b'X', b'P'];

/// Current (and highest readable) format revision.
pub const FORMAT_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Indicator flags
// ---------------------------------------------------------------------------

bitflags! {
    /// Stream header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HeaderFlags: u8 {
        /// A secondary compressor id follows.
        const SECONDARY = 1 << 0;
        /// The total target length is declared.
        const TARGET_LEN = 1 << 1;
        /// An application header follows.
        const APP_HEADER = 1 << 2;
    }
}

bitflags! {
    /// Per-window flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WindowFlags: u8 {
        /// The window copies from a source range.
        const SOURCE = 1 << 0;
        /// The payload is stored through the secondary compressor.
        const SECONDARY = 1 << 1;
    }
}

// ---------------------------------------------------------------------------
// Secondary compressor ids
// ---------------------------------------------------------------------------

pub const SECONDARY_LZMA_ID: u8 = 2;
pub const SECONDARY_ZLIB_ID: u8 = 3;

/// Display name for a secondary compressor id.
pub fn secondary_name(id: u8) -> &'static str {
    match id {
        SECONDARY_LZMA_ID => "lzma",
        SECONDARY_ZLIB_ID => "zlib",
        _ => "custom",
    }
}

// ---------------------------------------------------------------------------
// Hard limits
// ---------------------------------------------------------------------------

/// Largest target window a decoder accepts (16 MiB).
pub const HARD_MAX_WINDOW: u64 = 1 << 24;

/// Largest payload accepted for a window producing `target_len` bytes.
///
/// A one-byte insert costs three bytes and the optimizer never keeps a copy
/// that costs more than it saves, so well-formed payloads stay under this.
#[inline]
pub fn max_payload_len(target_len: u64) -> u64 {
    target_len.saturating_mul(3) + 16
}

fn read_byte<R: Read>(r: &mut R) -> Result<u8, DecodeError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_be_u32<R: Read>(r: &mut R) -> Result<u32, DecodeError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

// ---------------------------------------------------------------------------
// Stream header
// ---------------------------------------------------------------------------

/// Parsed or to-be-written stream header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamHeader {
    /// Format revision (set from the stream when decoding).
    pub version: u8,
    /// Secondary compressor id, when windows may be compressed.
    pub secondary_id: Option<u8>,
    /// Length of the source the patch was made against.
    pub source_len: u64,
    /// Total target length, when known up front.
    pub target_len: Option<u64>,
    /// Application-defined bytes (conventionally a UTF-8 description).
    pub app_header: Option<Vec<u8>>,
}

impl StreamHeader {
    pub fn new(source_len: u64) -> Self {
        Self {
            version: FORMAT_VERSION,
            source_len,
            ..Default::default()
        }
    }

    pub fn flags(&self) -> HeaderFlags {
        let mut flags = HeaderFlags::empty();
        flags.set(HeaderFlags::SECONDARY, self.secondary_id.is_some());
        flags.set(HeaderFlags::TARGET_LEN, self.target_len.is_some());
        flags.set(HeaderFlags::APP_HEADER, self.app_header.is_some());
        flags
    }

    /// The application header as text, with CR LF and lone CR normalized to LF.
    pub fn description(&self) -> Option<String> {
        let raw = self.app_header.as_deref()?;
        let text = String::from_utf8_lossy(raw);
        Some(text.replace("\r\n", "\n").replace('\r', "\n"))
    }

    /// Serialized size in bytes.
    pub fn encoded_len(&self) -> usize {
        let mut len = MAGIC.len() + 2;
        if self.secondary_id.is_some() {
            len += 1;
        }
        len += varint::sizeof_u64(self.source_len);
        if let Some(t) = self.target_len {
            len += varint::sizeof_u64(t);
        }
        if let Some(app) = &self.app_header {
            len += varint::sizeof_usize(app.len()) + app.len();
        }
        len
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&MAGIC)?;
        w.write_all(&[FORMAT_VERSION, self.flags().bits()])?;
        if let Some(id) = self.secondary_id {
            w.write_all(&[id])?;
        }
        varint::write_u64(w, self.source_len)?;
        if let Some(t) = self.target_len {
            varint::write_u64(w, t)?;
        }
        if let Some(app) = &self.app_header {
            varint::write_usize(w, app.len())?;
            w.write_all(app)?;
        }
        Ok(())
    }

    pub fn decode<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(DecodeError::InvalidHeader(format!(
                "bad magic {:02X} {:02X} {:02X} {:02X}",
                magic[0], magic[1], magic[2], magic[3]
            )));
        }

        let version = read_byte(r)?;
        if version > FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }
        if version == 0 {
            return Err(DecodeError::InvalidHeader("format version 0".into()));
        }

        let raw_flags = read_byte(r)?;
        let flags = HeaderFlags::from_bits(raw_flags).ok_or_else(|| {
            DecodeError::InvalidHeader(format!("unknown header flag bits {raw_flags:#04X}"))
        })?;

        let secondary_id = if flags.contains(HeaderFlags::SECONDARY) {
            Some(read_byte(r)?)
        } else {
            None
        };

        let source_len = varint::stream_read_u64(r)?;

        let target_len = if flags.contains(HeaderFlags::TARGET_LEN) {
            Some(varint::stream_read_u64(r)?)
        } else {
            None
        };

        let app_header = if flags.contains(HeaderFlags::APP_HEADER) {
            let len = varint::stream_read_u64(r)?;
            if len > HARD_MAX_WINDOW {
                return Err(DecodeError::InvalidHeader(format!(
                    "application header of {len} bytes exceeds {HARD_MAX_WINDOW}"
                )));
            }
            let mut data = vec![0u8; len as usize];
            r.read_exact(&mut data)?;
            Some(data)
        } else {
            None
        };

        Ok(Self {
            version,
            secondary_id,
            source_len,
            target_len,
            app_header,
        })
    }
}

// ---------------------------------------------------------------------------
// Window header
// ---------------------------------------------------------------------------

/// Fixed fields of one window record (everything before the payload).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowHeader {
    pub flags: WindowFlags,
    /// Bytes this window reconstructs (never zero).
    pub target_len: u64,
    /// Start of the source range copies may read from.
    pub source_offset: u64,
    /// Length of that range.
    pub source_len: u64,
    /// Stored payload length.
    pub payload_len: u64,
    /// Adler-32 of the stored payload bytes.
    pub payload_checksum: u32,
    /// Adler-32 of the reconstructed window.
    pub target_checksum: u32,
}

impl WindowHeader {
    #[inline]
    pub fn has_source(&self) -> bool {
        self.flags.contains(WindowFlags::SOURCE)
    }

    #[inline]
    pub fn is_secondary(&self) -> bool {
        self.flags.contains(WindowFlags::SECONDARY)
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        debug_assert!(self.target_len > 0, "empty windows collide with the terminator");
        varint::write_u64(w, self.target_len)?;
        w.write_all(&[self.flags.bits()])?;
        if self.has_source() {
            varint::write_u64(w, self.source_offset)?;
            varint::write_u64(w, self.source_len)?;
        }
        varint::write_u64(w, self.payload_len)?;
        w.write_all(&self.payload_checksum.to_be_bytes())?;
        w.write_all(&self.target_checksum.to_be_bytes())?;
        Ok(())
    }

    /// Write the end-of-stream marker.
    pub fn encode_terminator<W: Write>(w: &mut W) -> std::io::Result<()> {
        w.write_all(&[0])
    }

    /// Read the next window header.
    ///
    /// Returns `None` at the terminator. End of input before the terminator
    /// is a truncated stream.
    pub fn decode<R: Read>(r: &mut R) -> Result<Option<Self>, DecodeError> {
        let target_len = varint::stream_read_u64(r)?;
        if target_len == 0 {
            return Ok(None);
        }
        if target_len > HARD_MAX_WINDOW {
            return Err(DecodeError::malformed(format!(
                "target window of {target_len} bytes exceeds {HARD_MAX_WINDOW}"
            )));
        }

        let raw_flags = read_byte(r)?;
        let flags = WindowFlags::from_bits(raw_flags).ok_or_else(|| {
            DecodeError::malformed(format!("unknown window flag bits {raw_flags:#04X}"))
        })?;

        let (source_offset, source_len) = if flags.contains(WindowFlags::SOURCE) {
            let off = varint::stream_read_u64(r)?;
            let len = varint::stream_read_u64(r)?;
            if off.checked_add(len).is_none() {
                return Err(DecodeError::malformed("source range overflows"));
            }
            (off, len)
        } else {
            (0, 0)
        };

        let payload_len = varint::stream_read_u64(r)?;
        if payload_len == 0 || payload_len > max_payload_len(target_len) {
            return Err(DecodeError::malformed(format!(
                "payload of {payload_len} bytes is implausible for a {target_len}-byte window"
            )));
        }

        let payload_checksum = read_be_u32(r)?;
        let target_checksum = read_be_u32(r)?;

        Ok(Some(Self {
            flags,
            target_len,
            source_offset,
            source_len,
            payload_len,
            payload_checksum,
            target_checksum,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn stream_header_roundtrip_minimal() {
        let hdr = StreamHeader::new(1234);
        let mut buf = Vec::new();
        hdr.encode(&mut buf).unwrap();
        assert_eq!(&buf[..4], &MAGIC);
        assert_eq!(buf[4], FORMAT_VERSION);
        assert_eq!(buf[5], 0);
        assert_eq!(buf.len(), hdr.encoded_len());

        let decoded = StreamHeader::decode(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, hdr);
    }

    #[test]
    fn stream_header_roundtrip_all_fields() {
        let hdr = StreamHeader {
            secondary_id: Some(SECONDARY_ZLIB_ID),
            target_len: Some(1 << 40),
            app_header: Some(b"release 2.1".to_vec()),
            ..StreamHeader::new(77)
        };
        assert_eq!(
            hdr.flags(),
            HeaderFlags::SECONDARY | HeaderFlags::TARGET_LEN | HeaderFlags::APP_HEADER
        );
        let mut buf = Vec::new();
        hdr.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), hdr.encoded_len());
        let decoded = StreamHeader::decode(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, hdr);
    }

    #[test]
    fn description_normalizes_newlines() {
        let hdr = StreamHeader {
            app_header: Some(b"line one\r\nline two\rline three\n".to_vec()),
            ..StreamHeader::new(0)
        };
        assert_eq!(
            hdr.description().as_deref(),
            Some("line one\nline two\nline three\n")
        );
        assert_eq!(StreamHeader::new(0).description(), None);
    }

    #[test]
    fn rejects_bad_magic() {
        let data = [0xD6, 0xC3, 0xC4, 0x00, 0x00, 0x00];
        let err = StreamHeader::decode(&mut Cursor::new(&data)).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidHeader(_)));
    }

    #[test]
    fn rejects_newer_version() {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(&[FORMAT_VERSION + 1, 0, 0]);
        let err = StreamHeader::decode(&mut Cursor::new(&data)).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnsupportedVersion {
                found,
                supported: FORMAT_VERSION
            } if found == FORMAT_VERSION + 1
        ));
    }

    #[test]
    fn rejects_unknown_flags() {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(&[FORMAT_VERSION, 0x80, 0]);
        let err = StreamHeader::decode(&mut Cursor::new(&data)).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidHeader(_)));
    }

    #[test]
    fn truncated_header_is_malformed() {
        let mut buf = Vec::new();
        StreamHeader {
            app_header: Some(b"desc".to_vec()),
            ..StreamHeader::new(500)
        }
        .encode(&mut buf)
        .unwrap();
        for cut in 0..buf.len() {
            let err = StreamHeader::decode(&mut Cursor::new(&buf[..cut])).unwrap_err();
            assert!(
                matches!(err, DecodeError::MalformedInstruction(_)),
                "cut {cut}: {err:?}"
            );
        }
    }

    #[test]
    fn window_header_roundtrip() {
        let wh = WindowHeader {
            flags: WindowFlags::SOURCE | WindowFlags::SECONDARY,
            target_len: 4096,
            source_offset: 1024,
            source_len: 65536,
            payload_len: 300,
            payload_checksum: 0xDEAD_BEEF,
            target_checksum: 0x1234_5678,
        };
        let mut buf = Vec::new();
        wh.encode(&mut buf).unwrap();
        // Checksums are the last eight header bytes, big-endian.
        assert_eq!(
            &buf[buf.len() - 8..],
            &[0xDE, 0xAD, 0xBE, 0xEF, 0x12, 0x34, 0x56, 0x78]
        );
        let decoded = WindowHeader::decode(&mut Cursor::new(&buf)).unwrap().unwrap();
        assert_eq!(decoded, wh);
    }

    #[test]
    fn terminator_and_eof() {
        let mut buf = Vec::new();
        WindowHeader::encode_terminator(&mut buf).unwrap();
        assert!(WindowHeader::decode(&mut Cursor::new(&buf)).unwrap().is_none());

        let empty: &[u8] = &[];
        let err = WindowHeader::decode(&mut Cursor::new(empty)).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedInstruction(_)));
    }

    #[test]
    fn oversized_window_rejected() {
        let mut buf = Vec::new();
        varint::write_u64(&mut buf, HARD_MAX_WINDOW + 1).unwrap();
        buf.push(0);
        assert!(WindowHeader::decode(&mut Cursor::new(&buf)).is_err());
    }
}

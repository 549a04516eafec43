// Window framing and stream assembly.
//
// This module turns a window's instruction list into a framed window record
// and writes records behind a stream header. Match finding lives in the hash
// module; secondary compression of payloads is applied by the compress module
// between `WindowSections::new` and `assemble`.

use std::io::Write;

use super::checksum::adler32;
use super::header::{StreamHeader, WindowFlags, WindowHeader};
use super::instruction::{self, Instruction};

// ---------------------------------------------------------------------------
// Source range
// ---------------------------------------------------------------------------

/// Source bytes a window may copy from: `[offset, offset + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRange {
    pub offset: u64,
    pub len: u64,
}

impl SourceRange {
    /// Smallest range covering every copy in `instructions`, if any.
    pub fn covering(instructions: &[Instruction<'_>]) -> Option<Self> {
        let mut lo = u64::MAX;
        let mut hi = 0u64;
        for inst in instructions {
            if let Instruction::Copy { offset, len } = *inst
                && len > 0
            {
                lo = lo.min(offset);
                hi = hi.max(offset + len);
            }
        }
        (lo < hi).then(|| Self {
            offset: lo,
            len: hi - lo,
        })
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

// ---------------------------------------------------------------------------
// Window sections
// ---------------------------------------------------------------------------

/// A window's serialized instructions and metadata, before framing.
///
/// The compress module may replace `payload` with a secondary-compressed
/// form before calling `assemble`.
#[derive(Debug, Clone)]
pub struct WindowSections {
    pub source: Option<SourceRange>,
    pub target_len: u64,
    pub target_checksum: u32,
    pub payload: Vec<u8>,
}

impl WindowSections {
    /// Serialize `instructions`, which must reconstruct exactly `target`.
    pub fn new(instructions: &[Instruction<'_>], target: &[u8]) -> Self {
        debug_assert_eq!(
            instructions.iter().map(Instruction::target_len).sum::<u64>(),
            target.len() as u64,
            "instructions do not cover the window"
        );
        let source = SourceRange::covering(instructions);
        let base = source.map_or(0, |s| s.offset);

        let mut payload = Vec::with_capacity(target.len() / 4 + 16);
        instruction::serialize(instructions, base, &mut payload);

        Self {
            source,
            target_len: target.len() as u64,
            target_checksum: adler32(target),
            payload,
        }
    }

    /// Window header for the current payload.
    pub fn header(&self, secondary: bool) -> WindowHeader {
        let mut flags = WindowFlags::empty();
        flags.set(WindowFlags::SOURCE, self.source.is_some());
        flags.set(WindowFlags::SECONDARY, secondary);
        WindowHeader {
            flags,
            target_len: self.target_len,
            source_offset: self.source.map_or(0, |s| s.offset),
            source_len: self.source.map_or(0, |s| s.len),
            payload_len: self.payload.len() as u64,
            payload_checksum: adler32(&self.payload),
            target_checksum: self.target_checksum,
        }
    }

    /// Frame the window into record bytes.
    ///
    /// `secondary` marks `payload` as secondary-compressed.
    pub fn assemble(&self, secondary: bool) -> Vec<u8> {
        let wh = self.header(secondary);
        let mut out = Vec::with_capacity(self.payload.len() + 32);
        wh.encode(&mut out).unwrap();
        out.extend_from_slice(&self.payload);
        out
    }
}

// ---------------------------------------------------------------------------
// Full-stream encoder
// ---------------------------------------------------------------------------

/// Writes a stream header, framed windows, and the terminator.
///
/// The header is written lazily before the first window (or at `finish`).
pub struct StreamEncoder<W: Write> {
    writer: W,
    header: StreamHeader,
    header_written: bool,
    windows: u64,
    bytes_out: u64,
}

impl<W: Write> StreamEncoder<W> {
    pub fn new(writer: W, header: StreamHeader) -> Self {
        Self {
            writer,
            header,
            header_written: false,
            windows: 0,
            bytes_out: 0,
        }
    }

    fn ensure_header(&mut self) -> std::io::Result<()> {
        if !self.header_written {
            self.header.encode(&mut self.writer)?;
            self.bytes_out += self.header.encoded_len() as u64;
            self.header_written = true;
        }
        Ok(())
    }

    /// Write an assembled window record.
    pub fn write_window(&mut self, record: &[u8]) -> std::io::Result<()> {
        self.ensure_header()?;
        self.writer.write_all(record)?;
        self.windows += 1;
        self.bytes_out += record.len() as u64;
        Ok(())
    }

    /// Number of window records written so far.
    pub fn windows_written(&self) -> u64 {
        self.windows
    }

    /// Bytes written so far, header included.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Write the terminator, flush, and return the inner writer.
    pub fn finish(mut self) -> std::io::Result<W> {
        self.ensure_header()?;
        WindowHeader::encode_terminator(&mut self.writer)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

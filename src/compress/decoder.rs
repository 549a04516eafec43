// Streaming delta decoder.
//
// DeltaDecoder wraps StreamDecoder with:
//   - streaming output via the Write trait (the full target is never held)
//   - progress tracking (bytes decoded, windows decoded)
//   - window-by-window decoding for constant memory use
//
// A window reaches the writer only after its target checksum verified, but
// a stream that fails part-way leaves the earlier windows written. Callers
// that must not expose partial output write to a temporary sink and commit
// it after `decode_to` returns.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::format::decoder::{self, StreamDecoder};
use crate::format::error::DecodeError;
use crate::format::header::StreamHeader;

use super::secondary::CompressBackend;

// ---------------------------------------------------------------------------
// DeltaDecoder
// ---------------------------------------------------------------------------

/// Streaming delta decoder with progress tracking.
pub struct DeltaDecoder<R: Read> {
    inner: StreamDecoder<R>,
    bytes_decoded: u64,
    windows_decoded: u64,
    /// Decoded window staging buffer, reused between windows.
    window_buf: Vec<u8>,
}

impl<R: Read> DeltaDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_checksum(reader, true)
    }

    /// Create a decoder that optionally skips checksum verification.
    pub fn with_checksum(reader: R, verify: bool) -> Self {
        Self {
            inner: StreamDecoder::new(reader, verify),
            bytes_decoded: 0,
            windows_decoded: 0,
            window_buf: Vec::new(),
        }
    }

    /// Decompress payloads with `backend` when the stream names its id.
    pub fn with_backend(mut self, backend: Arc<dyn CompressBackend>) -> Self {
        self.inner = self.inner.with_backend(backend);
        self
    }

    /// Read the stream header if it has not been read yet.
    pub fn read_header(&mut self) -> Result<&StreamHeader, DecodeError> {
        self.inner.read_header()
    }

    /// Decode all windows, writing output to `writer`.
    ///
    /// Returns the total number of bytes decoded.
    pub fn decode_to<W: Write>(
        &mut self,
        source: &[u8],
        writer: &mut W,
    ) -> Result<u64, DecodeError> {
        while self.decode_window_to(source, writer)?.is_some() {}
        Ok(self.bytes_decoded)
    }

    /// Decode the next window, writing its output to `writer`.
    ///
    /// Returns `Some(window_size)` if a window was decoded, or `None` after
    /// the terminator.
    pub fn decode_window_to<W: Write>(
        &mut self,
        source: &[u8],
        writer: &mut W,
    ) -> Result<Option<u64>, DecodeError> {
        self.window_buf.clear();
        if !self.inner.decode_window(source, &mut self.window_buf)? {
            return Ok(None);
        }

        let window_size = self.window_buf.len() as u64;
        if let Err(e) = writer.write_all(&self.window_buf) {
            self.inner.mark_failed();
            return Err(DecodeError::Io(e));
        }

        self.bytes_decoded += window_size;
        self.windows_decoded += 1;
        Ok(Some(window_size))
    }

    /// Total bytes decoded so far.
    pub fn bytes_decoded(&self) -> u64 {
        self.bytes_decoded
    }

    /// Number of windows decoded so far.
    pub fn windows_decoded(&self) -> u64 {
        self.windows_decoded
    }

    /// The stream header, once read.
    pub fn stream_header(&self) -> Option<&StreamHeader> {
        self.inner.stream_header()
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

// ---------------------------------------------------------------------------
// Convenience function
// ---------------------------------------------------------------------------

/// Decode a delta held in memory.
pub fn decode_all(source: &[u8], delta: &[u8]) -> Result<Vec<u8>, DecodeError> {
    // Windows are appended straight into the result, skipping the staging
    // copy `decode_to` makes.
    decoder::decode_memory(delta, source)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

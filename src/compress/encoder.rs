// Streaming delta encoder.
//
// DeltaEncoder provides a streaming API for delta encoding:
//   - the source is indexed once up front and the index reused across windows
//   - target data is fed in chunks via write_target()
//   - each full window is matched, framed and written immediately
//   - constant memory: only one target window is buffered at a time
//
// Windows are independent of each other, so the parallel path produces the
// same bytes as the sequential one.

use std::io::Write;
use std::sync::Arc;

use crate::format::encoder::{StreamEncoder, WindowSections};
use crate::format::error::EncodeError;
use crate::format::header::{HARD_MAX_WINDOW, StreamHeader};
use crate::hash::config::{
    self, DEFAULT_BLOCK_SIZE, DEFAULT_MIN_MATCH, DEFAULT_WINDOW_SIZE, MAX_BLOCK_SIZE,
};
use crate::hash::matching::Matcher;

use super::pipeline;
use super::secondary::{self, CompressBackend, SecondaryCompression};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for the delta encoder.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Compression level (0-9). Level 0 = store only (no matching).
    pub level: u32,
    /// Fingerprint block size in bytes.
    pub block_size: usize,
    /// Shortest match emitted as a copy.
    pub min_match: usize,
    /// Maximum target window size in bytes.
    pub window_size: usize,
    /// Secondary compression for window payloads.
    pub secondary: SecondaryCompression,
    /// Application header (patch description) stored in the stream header.
    pub app_header: Option<Vec<u8>>,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            level: 6,
            block_size: DEFAULT_BLOCK_SIZE,
            min_match: DEFAULT_MIN_MATCH,
            window_size: DEFAULT_WINDOW_SIZE,
            secondary: SecondaryCompression::None,
            app_header: None,
        }
    }
}

impl CompressOptions {
    /// Reject option values the encoder cannot honour.
    pub fn validate(&self) -> Result<(), EncodeError> {
        if self.level > 9 {
            return Err(EncodeError::InvalidOptions(format!(
                "level {} is outside 0-9",
                self.level
            )));
        }
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(EncodeError::InvalidOptions(format!(
                "block size {} is outside 1-{MAX_BLOCK_SIZE}",
                self.block_size
            )));
        }
        if self.min_match == 0 {
            return Err(EncodeError::InvalidOptions(
                "minimum match length must be at least 1".into(),
            ));
        }
        if self.window_size == 0 || self.window_size as u64 > HARD_MAX_WINDOW {
            return Err(EncodeError::InvalidOptions(format!(
                "window size {} is outside 1-{HARD_MAX_WINDOW}",
                self.window_size
            )));
        }
        if let Some(app) = &self.app_header
            && app.len() as u64 > HARD_MAX_WINDOW
        {
            return Err(EncodeError::InvalidOptions(format!(
                "application header of {} bytes exceeds {HARD_MAX_WINDOW}",
                app.len()
            )));
        }
        Ok(())
    }

    fn stream_header(
        &self,
        source_len: u64,
        backend: Option<&Arc<dyn CompressBackend>>,
        target_len: Option<u64>,
    ) -> StreamHeader {
        StreamHeader {
            secondary_id: backend.map(|b| b.id()),
            target_len,
            app_header: self.app_header.clone(),
            ..StreamHeader::new(source_len)
        }
    }

    /// Matcher over `source`, or `None` when every window is stored literally.
    fn matcher<'s>(&self, source: &'s [u8]) -> Option<Matcher<'s>> {
        (self.level > 0 && !source.is_empty()).then(|| {
            Matcher::new(
                source,
                self.block_size,
                self.min_match,
                config::config_for_level(self.level),
            )
        })
    }
}

// ---------------------------------------------------------------------------
// DeltaEncoder
// ---------------------------------------------------------------------------

/// Streaming delta encoder.
///
/// Indexes the source once up front, then processes target data in windows.
/// Each completed window is immediately encoded and written to the output.
///
/// # Example
/// ```no_run
/// use oxipatch::compress::encoder::{CompressOptions, DeltaEncoder};
/// let source = b"original data";
/// let target = b"modified data";
/// let mut output = Vec::new();
/// let mut enc = DeltaEncoder::new(&mut output, source, CompressOptions::default()).unwrap();
/// enc.write_target(target).unwrap();
/// enc.finish().unwrap();
/// ```
pub struct DeltaEncoder<'s, W: Write> {
    stream: StreamEncoder<W>,
    window_size: usize,
    matcher: Option<Matcher<'s>>,
    backend: Option<Arc<dyn CompressBackend>>,
    buffer: Vec<u8>,
    bytes_in: u64,
}

impl<'s, W: Write> DeltaEncoder<'s, W> {
    /// Create a streaming encoder. The source is indexed immediately (not at
    /// level 0).
    pub fn new(writer: W, source: &'s [u8], opts: CompressOptions) -> Result<Self, EncodeError> {
        Self::build(writer, source, opts, None)
    }

    /// Like `new`, but records the total target length in the stream header
    /// so decoders can check it. Writing a different number of bytes yields
    /// a patch that fails to decode.
    pub fn with_target_len(
        writer: W,
        source: &'s [u8],
        opts: CompressOptions,
        target_len: u64,
    ) -> Result<Self, EncodeError> {
        Self::build(writer, source, opts, Some(target_len))
    }

    fn build(
        writer: W,
        source: &'s [u8],
        opts: CompressOptions,
        target_len: Option<u64>,
    ) -> Result<Self, EncodeError> {
        opts.validate()?;
        let backend = opts.secondary.backend();
        let header = opts.stream_header(source.len() as u64, backend.as_ref(), target_len);
        let matcher = opts.matcher(source);

        log::debug!(
            "encoder: level {} ({}), block {} min match {} window {}, source {} bytes",
            opts.level,
            config::config_for_level(opts.level).name,
            opts.block_size,
            opts.min_match,
            opts.window_size,
            source.len()
        );

        Ok(Self {
            stream: StreamEncoder::new(writer, header),
            window_size: opts.window_size,
            matcher,
            backend,
            buffer: Vec::new(),
            bytes_in: 0,
        })
    }

    /// Feed target data to the encoder.
    ///
    /// Data is buffered internally. Whenever the buffer reaches `window_size`,
    /// a complete window is encoded and written to the output.
    pub fn write_target(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        self.bytes_in += data.len() as u64;
        let mut offset = 0usize;

        // Complete a partially buffered window first.
        if !self.buffer.is_empty() {
            let need = self.window_size - self.buffer.len();
            let take = need.min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            offset += take;

            if self.buffer.len() == self.window_size {
                let mut window = std::mem::take(&mut self.buffer);
                self.encode_window(&window)?;
                window.clear();
                self.buffer = window;
            }
        }

        // Full windows straight from the caller's slice.
        while offset + self.window_size <= data.len() {
            let end = offset + self.window_size;
            self.encode_window(&data[offset..end])?;
            offset = end;
        }

        if offset < data.len() {
            self.buffer.extend_from_slice(&data[offset..]);
        }
        Ok(())
    }

    /// Encode buffered data as a (short) window now rather than waiting for
    /// a full one. Does nothing when the buffer is empty.
    pub fn flush_window(&mut self) -> Result<(), EncodeError> {
        if !self.buffer.is_empty() {
            let mut window = std::mem::take(&mut self.buffer);
            self.encode_window(&window)?;
            window.clear();
            self.buffer = window;
        }
        Ok(())
    }

    /// Flush any buffered data and write the terminator.
    ///
    /// Returns the underlying writer and the number of windows written.
    pub fn finish(mut self) -> Result<(W, u64), EncodeError> {
        self.flush_window()?;
        let windows = self.stream.windows_written();
        Ok((self.stream.finish()?, windows))
    }

    /// Number of target bytes received so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Number of delta bytes written so far.
    pub fn bytes_out(&self) -> u64 {
        self.stream.bytes_out()
    }

    /// Number of windows written so far.
    pub fn windows_written(&self) -> u64 {
        self.stream.windows_written()
    }

    /// The window size target data is cut into.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    fn encode_window(&mut self, window: &[u8]) -> Result<(), EncodeError> {
        let record = encode_window(self.matcher.as_ref(), self.backend.as_deref(), window)?;
        log::debug!(
            "window {}: {} target bytes -> {} record bytes",
            self.stream.windows_written(),
            window.len(),
            record.len()
        );
        self.stream.write_window(&record)?;
        Ok(())
    }
}

/// Match, optimize, serialize and frame one target window.
fn encode_window(
    matcher: Option<&Matcher<'_>>,
    backend: Option<&dyn CompressBackend>,
    window: &[u8],
) -> std::io::Result<Vec<u8>> {
    let matches = matcher.map(|m| m.find_matches(window)).unwrap_or_default();
    let instructions = pipeline::optimize(&matches, window);
    let mut sections = WindowSections::new(&instructions, window);

    let mut compressed = false;
    if let Some(backend) = backend
        && let Some(packed) = secondary::compress_payload(backend, &sections.payload)?
    {
        sections.payload = packed;
        compressed = true;
    }
    Ok(sections.assemble(compressed))
}

/// Convenience: encode an entire target at once.
///
/// The stream header records the target length.
pub fn encode_all<W: Write>(
    writer: W,
    source: &[u8],
    target: &[u8],
    opts: CompressOptions,
) -> Result<W, EncodeError> {
    let mut enc = DeltaEncoder::with_target_len(writer, source, opts, target.len() as u64)?;
    enc.write_target(target)?;
    let (w, _) = enc.finish()?;
    Ok(w)
}

/// Convenience: encode an entire target with windows matched in parallel.
///
/// Each rayon job indexes the source itself. Output is byte-identical to
/// `encode_all` with the same options.
#[cfg(feature = "parallel")]
pub fn encode_all_parallel<W: Write>(
    writer: W,
    source: &[u8],
    target: &[u8],
    opts: CompressOptions,
) -> Result<W, EncodeError> {
    opts.validate()?;
    let backend = opts.secondary.backend();
    let header = opts.stream_header(
        source.len() as u64,
        backend.as_ref(),
        Some(target.len() as u64),
    );

    let records: std::io::Result<Vec<Vec<u8>>> = target
        .par_chunks(opts.window_size)
        .map_init(
            || opts.matcher(source),
            |matcher, chunk| encode_window(matcher.as_ref(), backend.as_deref(), chunk),
        )
        .collect();

    let mut stream = StreamEncoder::new(writer, header);
    for record in records? {
        stream.write_window(&record)?;
    }
    Ok(stream.finish()?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// File-level encode/decode helpers.
//
// `encode_file()` and `decode_file()` wrap the streaming front ends with
// buffered file I/O. The source is read fully into memory; the target (or
// delta) is streamed one window at a time. Both outputs are written to a
// temporary file next to the destination and renamed into place only once
// the whole stream has been produced and verified, so a failed or cancelled
// call never leaves a partial file behind. SHA-256 digests are computed
// on the fly when the `file-io` feature is enabled.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::compress::decoder::DeltaDecoder;
use crate::compress::encoder::{CompressOptions, DeltaEncoder};
use crate::format::error::{DecodeError, EncodeError};
use crate::hooks::Hooks;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `encode_file()`.
#[derive(Debug, Clone)]
pub struct EncodeStats {
    pub source_size: u64,
    pub target_size: u64,
    /// Size of the written patch.
    pub delta_size: u64,
    pub windows: u64,
    /// SHA-256 of the source file (`file-io` feature).
    pub source_sha256: Option<[u8; 32]>,
    /// SHA-256 of the target file (`file-io` feature).
    pub target_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `decode_file()`.
#[derive(Debug, Clone)]
pub struct DecodeStats {
    pub source_size: u64,
    pub delta_size: u64,
    /// Size of the reconstructed target.
    pub output_size: u64,
    pub windows: u64,
    /// SHA-256 of the reconstructed target (`file-io` feature).
    pub output_sha256: Option<[u8; 32]>,
}

/// Lower-case hex rendering of a digest.
pub fn hex_digest(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file operations.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

/// A temporary file in the same directory as `dest`, so the final rename
/// stays on one filesystem.
pub(crate) fn temp_sibling(dest: &Path) -> io::Result<NamedTempFile> {
    match dest.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => NamedTempFile::new_in(dir),
        _ => NamedTempFile::new_in("."),
    }
}

/// Flush `writer` and atomically move its temporary file to `dest`.
pub(crate) fn commit(writer: BufWriter<NamedTempFile>, dest: &Path) -> io::Result<u64> {
    let tmp = writer.into_inner().map_err(|e| e.into_error())?;
    tmp.as_file().sync_all()?;
    let len = tmp.as_file().metadata()?.len();
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(len)
}

// ---------------------------------------------------------------------------
// Streaming helpers
// ---------------------------------------------------------------------------

/// Encode everything `target` yields into `writer`, one window at a time.
///
/// `target_len`, when given, is recorded in the stream header and checked
/// against the bytes actually read. Returns the writer and the stats (with
/// `delta_size` counting every byte written).
pub fn encode_stream<R: Read, W: Write>(
    source: &[u8],
    mut target: R,
    writer: W,
    opts: CompressOptions,
    target_len: Option<u64>,
    hooks: &mut Hooks<'_>,
) -> Result<(W, EncodeStats), IoError> {
    let counter = CountingWriter {
        inner: writer,
        count: 0,
    };
    let mut encoder = match target_len {
        Some(len) => DeltaEncoder::with_target_len(counter, source, opts, len)?,
        None => DeltaEncoder::new(counter, source, opts)?,
    };

    #[cfg(feature = "file-io")]
    let source_sha256 = Some(sha2::Sha256::digest(source).into());
    #[cfg(not(feature = "file-io"))]
    let source_sha256: Option<[u8; 32]> = None;
    #[cfg(feature = "file-io")]
    let mut target_hasher = sha2::Sha256::new();

    let window_size = encoder.window_size() as u64;
    let mut window = Vec::with_capacity(encoder.window_size().min(BUF_SIZE));
    loop {
        hooks.checkpoint_encode()?;
        window.clear();
        (&mut target).take(window_size).read_to_end(&mut window)?;
        if window.is_empty() {
            break;
        }
        #[cfg(feature = "file-io")]
        target_hasher.update(&window);
        encoder.write_target(&window)?;
        encoder.flush_window()?;
        hooks.message(&format!(
            "encoded window {}: {} target bytes, {} delta bytes so far",
            encoder.windows_written() - 1,
            window.len(),
            encoder.bytes_out()
        ));
    }

    let target_size = encoder.bytes_in();
    if let Some(expected) = target_len
        && expected != target_size
    {
        return Err(IoError::Io(io::Error::other(format!(
            "target changed while reading: expected {expected} bytes, read {target_size}"
        ))));
    }

    let (counter, windows) = encoder.finish()?;
    let delta_size = counter.count;
    hooks.message(&format!(
        "encoded {target_size} bytes in {windows} windows into {delta_size} delta bytes"
    ));

    #[cfg(feature = "file-io")]
    let target_sha256 = Some(target_hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let target_sha256: Option<[u8; 32]> = None;

    let stats = EncodeStats {
        source_size: source.len() as u64,
        target_size,
        delta_size,
        windows,
        source_sha256,
        target_sha256,
    };
    Ok((counter.inner, stats))
}

/// Decode the patch read from `delta` against `source`, writing each
/// verified window to `writer`.
///
/// Windows reach `writer` as they verify; a later failure leaves the
/// earlier ones written. Callers that must not expose partial output pass a
/// temporary sink.
pub fn decode_stream<R: Read, W: Write>(
    source: &[u8],
    delta: R,
    writer: &mut W,
    verify_checksum: bool,
    hooks: &mut Hooks<'_>,
) -> Result<DecodeStats, IoError> {
    let counter = CountingReader {
        inner: delta,
        count: 0,
    };
    let mut decoder = DeltaDecoder::with_checksum(counter, verify_checksum);
    let hint = decoder.read_header()?.source_len;
    if hint != source.len() as u64 {
        hooks.message(&format!(
            "warning: patch was made against a {hint}-byte source, got {} bytes",
            source.len()
        ));
    }

    #[cfg(feature = "file-io")]
    let mut output_hasher = sha2::Sha256::new();
    {
        #[cfg(feature = "file-io")]
        let mut sink = HashingWriter {
            inner: &mut *writer,
            hasher: &mut output_hasher,
        };
        #[cfg(not(feature = "file-io"))]
        let mut sink = &mut *writer;

        loop {
            hooks.checkpoint_decode()?;
            let Some(len) = decoder.decode_window_to(source, &mut sink)? else {
                break;
            };
            hooks.message(&format!(
                "decoded window {}: {len} bytes",
                decoder.windows_decoded() - 1
            ));
        }
    }
    writer.flush()?;

    #[cfg(feature = "file-io")]
    let output_sha256 = Some(output_hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let output_sha256: Option<[u8; 32]> = None;

    let output_size = decoder.bytes_decoded();
    let windows = decoder.windows_decoded();
    Ok(DecodeStats {
        source_size: source.len() as u64,
        delta_size: decoder.into_inner().count,
        output_size,
        windows,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// encode_file
// ---------------------------------------------------------------------------

/// Encode a patch turning `source_path` into `target_path`, writing it to
/// `delta_path`.
pub fn encode_file(
    source_path: &Path,
    target_path: &Path,
    delta_path: &Path,
    opts: CompressOptions,
) -> Result<EncodeStats, IoError> {
    encode_file_with_hooks(
        source_path,
        target_path,
        delta_path,
        opts,
        &mut Hooks::default(),
    )
}

/// `encode_file` with per-window progress messages and cancellation.
pub fn encode_file_with_hooks(
    source_path: &Path,
    target_path: &Path,
    delta_path: &Path,
    opts: CompressOptions,
    hooks: &mut Hooks<'_>,
) -> Result<EncodeStats, IoError> {
    let source = std::fs::read(source_path)?;

    let target_file = File::open(target_path)?;
    let target_size = target_file.metadata()?.len();
    let target_reader = BufReader::with_capacity(BUF_SIZE, target_file);

    let delta_writer = BufWriter::with_capacity(BUF_SIZE, temp_sibling(delta_path)?);
    let (writer, stats) = encode_stream(
        &source,
        target_reader,
        delta_writer,
        opts,
        Some(target_size),
        hooks,
    )?;
    commit(writer, delta_path)?;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// decode_file
// ---------------------------------------------------------------------------

/// Apply the patch at `delta_path` to `source_path`, writing the target to
/// `output_path`.
///
/// `output_path` is only created (or replaced) after every window and the
/// terminator have been verified.
pub fn decode_file(
    source_path: &Path,
    delta_path: &Path,
    output_path: &Path,
) -> Result<DecodeStats, IoError> {
    decode_file_with_hooks(source_path, delta_path, output_path, &mut Hooks::default())
}

/// `decode_file` with per-window progress messages and cancellation.
pub fn decode_file_with_hooks(
    source_path: &Path,
    delta_path: &Path,
    output_path: &Path,
    hooks: &mut Hooks<'_>,
) -> Result<DecodeStats, IoError> {
    let source = std::fs::read(source_path)?;
    let delta_reader = BufReader::with_capacity(BUF_SIZE, File::open(delta_path)?);

    let mut output_writer = BufWriter::with_capacity(BUF_SIZE, temp_sibling(output_path)?);
    let stats = decode_stream(&source, delta_reader, &mut output_writer, true, hooks)?;
    commit(output_writer, output_path)?;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Counting adapters
// ---------------------------------------------------------------------------

struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Hashing writer
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

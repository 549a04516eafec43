// Secondary compression of window instruction payloads.
//
// A pluggable `CompressBackend` trait with built-in implementations:
//   - LZMA (via lzma-rs, feature `lzma-secondary`), id 2
//   - Zlib (via flate2, feature `zlib-secondary`), id 3
//   - NoCompression (passthrough)
//   - caller-supplied backends through the trait
//
// The stream header names one compressor id; each window flags whether its
// payload went through it. A payload is stored compressed only when that
// makes it smaller, so incompressible windows cost nothing extra.
//
// Decompression is bounded: a window's plain payload can never exceed
// `max_payload_len(target_len)`, and backends stop at that limit instead of
// inflating a hostile payload without end.

use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::format::error::DecodeError;
use crate::format::header::{SECONDARY_LZMA_ID, SECONDARY_ZLIB_ID};

/// Minimum payload size worth compressing.
const MIN_COMPRESS_SIZE: usize = 32;

// ---------------------------------------------------------------------------
// CompressBackend trait
// ---------------------------------------------------------------------------

/// A pluggable secondary compressor for window payloads.
///
/// # Implementing a custom backend
///
/// ```no_run
/// use oxipatch::compress::secondary::CompressBackend;
/// use oxipatch::format::DecodeError;
///
/// struct Reverse;
///
/// impl CompressBackend for Reverse {
///     fn id(&self) -> u8 { 42 }
///     fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
///         Ok(data.iter().rev().copied().collect())
///     }
///     fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
///         if data.len() > limit {
///             return Err(DecodeError::MalformedInstruction("too large".into()));
///         }
///         Ok(data.iter().rev().copied().collect())
///     }
/// }
/// ```
pub trait CompressBackend: Send + Sync {
    /// Compressor id stored in the stream header.
    ///
    /// Built-in ids: 2 (LZMA), 3 (Zlib). Custom backends should pick ids
    /// that do not collide with these.
    fn id(&self) -> u8;

    /// Compress a payload.
    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// Decompress a payload produced by `compress`, failing if the output
    /// would exceed `limit` bytes.
    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError>;

    /// Whether this payload is worth compressing. Default: skip if < 32 bytes.
    fn should_compress(&self, data: &[u8]) -> bool {
        data.len() >= MIN_COMPRESS_SIZE
    }
}

fn over_limit(limit: usize) -> DecodeError {
    DecodeError::malformed(format!(
        "secondary payload inflates past the {limit}-byte window limit"
    ))
}

// ---------------------------------------------------------------------------
// LZMA backend
// ---------------------------------------------------------------------------

/// LZMA secondary compressor (id 2).
#[cfg(feature = "lzma-secondary")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LzmaBackend;

/// `Write` sink that refuses to grow past `limit` bytes.
#[cfg(feature = "lzma-secondary")]
struct LimitedWriter {
    buf: Vec<u8>,
    limit: usize,
    exceeded: bool,
}

#[cfg(feature = "lzma-secondary")]
impl Write for LimitedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.limit {
            self.exceeded = true;
            return Err(io::Error::other("output limit exceeded"));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(feature = "lzma-secondary")]
impl CompressBackend for LzmaBackend {
    fn id(&self) -> u8 {
        SECONDARY_LZMA_ID
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut input = io::Cursor::new(data);
        let mut output = Vec::new();
        lzma_rs::lzma_compress(&mut input, &mut output)?;
        Ok(output)
    }

    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
        let mut input = io::BufReader::new(io::Cursor::new(data));
        let mut output = LimitedWriter {
            buf: Vec::new(),
            limit,
            exceeded: false,
        };
        match lzma_rs::lzma_decompress(&mut input, &mut output) {
            Ok(()) => Ok(output.buf),
            Err(_) if output.exceeded => Err(over_limit(limit)),
            Err(e) => Err(DecodeError::malformed(format!(
                "LZMA decompression failed: {e}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Zlib backend
// ---------------------------------------------------------------------------

/// Zlib secondary compressor (id 3).
///
/// Uses the zlib container rather than raw deflate, so each payload carries
/// its own checksum.
#[cfg(feature = "zlib-secondary")]
#[derive(Debug, Clone, Copy)]
pub struct ZlibBackend {
    level: flate2::Compression,
}

#[cfg(feature = "zlib-secondary")]
impl ZlibBackend {
    /// Zlib backend at `level` (0-9).
    pub fn new(level: u32) -> Self {
        Self {
            level: flate2::Compression::new(level.min(9)),
        }
    }
}

#[cfg(feature = "zlib-secondary")]
impl Default for ZlibBackend {
    fn default() -> Self {
        Self::new(6)
    }
}

#[cfg(feature = "zlib-secondary")]
impl CompressBackend for ZlibBackend {
    fn id(&self) -> u8 {
        SECONDARY_ZLIB_ID
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
        let mut output = Vec::new();
        flate2::read::ZlibDecoder::new(data)
            .take(limit as u64 + 1)
            .read_to_end(&mut output)
            .map_err(|e| DecodeError::malformed(format!("zlib decompression failed: {e}")))?;
        if output.len() > limit {
            return Err(over_limit(limit));
        }
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// No-compression backend
// ---------------------------------------------------------------------------

/// Passthrough backend; `compress_payload` never flags its output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl CompressBackend for NoCompression {
    fn id(&self) -> u8 {
        0
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
        if data.len() > limit {
            return Err(over_limit(limit));
        }
        Ok(data.to_vec())
    }

    fn should_compress(&self, _data: &[u8]) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

/// Compress `payload` with `backend` if that makes it smaller.
///
/// Returns `None` when the plain payload should be stored.
pub fn compress_payload(
    backend: &dyn CompressBackend,
    payload: &[u8],
) -> io::Result<Option<Vec<u8>>> {
    if !backend.should_compress(payload) {
        return Ok(None);
    }
    let compressed = backend.compress(payload)?;
    Ok((compressed.len() < payload.len()).then_some(compressed))
}

/// Built-in backend for a stream's compressor id.
pub fn backend_for_id(id: u8) -> Result<Box<dyn CompressBackend>, DecodeError> {
    match id {
        #[cfg(feature = "lzma-secondary")]
        SECONDARY_LZMA_ID => Ok(Box::new(LzmaBackend)),

        #[cfg(not(feature = "lzma-secondary"))]
        SECONDARY_LZMA_ID => Err(DecodeError::InvalidHeader(
            "LZMA secondary compression requires the 'lzma-secondary' feature".into(),
        )),

        #[cfg(feature = "zlib-secondary")]
        SECONDARY_ZLIB_ID => Ok(Box::new(ZlibBackend::default())),

        #[cfg(not(feature = "zlib-secondary"))]
        SECONDARY_ZLIB_ID => Err(DecodeError::InvalidHeader(
            "zlib secondary compression requires the 'zlib-secondary' feature".into(),
        )),

        id => Err(DecodeError::InvalidHeader(format!(
            "unknown secondary compressor id {id}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Encoder-side selection
// ---------------------------------------------------------------------------

/// Secondary compression applied to window payloads.
#[derive(Clone, Default)]
pub enum SecondaryCompression {
    #[default]
    None,
    /// LZMA (id 2).
    #[cfg(feature = "lzma-secondary")]
    Lzma,
    /// Zlib (id 3).
    #[cfg(feature = "zlib-secondary")]
    Zlib {
        /// Compression level (0-9). Default: 6.
        level: u32,
    },
    /// A caller-supplied backend. Decoders need the same backend registered
    /// unless its id is one of the built-ins.
    Custom(Arc<dyn CompressBackend>),
}

impl std::fmt::Debug for SecondaryCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            #[cfg(feature = "lzma-secondary")]
            Self::Lzma => write!(f, "Lzma"),
            #[cfg(feature = "zlib-secondary")]
            Self::Zlib { level } => write!(f, "Zlib {{ level: {level} }}"),
            Self::Custom(b) => write!(f, "Custom(id={})", b.id()),
        }
    }
}

impl SecondaryCompression {
    /// The backend, or `None` for no compression.
    pub fn backend(&self) -> Option<Arc<dyn CompressBackend>> {
        match self {
            Self::None => None,
            #[cfg(feature = "lzma-secondary")]
            Self::Lzma => Some(Arc::new(LzmaBackend)),
            #[cfg(feature = "zlib-secondary")]
            Self::Zlib { level } => Some(Arc::new(ZlibBackend::new(*level))),
            Self::Custom(b) => Some(Arc::clone(b)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

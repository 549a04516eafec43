// Error taxonomy for patch encoding and decoding.

use std::fmt;
use std::io;

use thiserror::Error;

use super::varint::VarIntError;

/// Which checksum of a window failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumScope {
    /// The stored instruction payload.
    Instructions,
    /// The reconstructed target window.
    Target,
}

impl fmt::Display for ChecksumScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instructions => f.write_str("instruction"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Failure while decoding or applying a patch.
///
/// `Cancelled` means the caller asked to stop; every other variant except
/// `Io` describes a problem with the patch data itself.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Bad, truncated or structurally inconsistent patch bytes.
    #[error("malformed instruction stream: {0}")]
    MalformedInstruction(String),

    /// A copy or window source range reaches outside the available source.
    #[error("copy out of range: offset {offset} length {len} exceeds source limit {limit}")]
    OutOfRangeCopy { offset: u64, len: u64, limit: u64 },

    /// A stored checksum did not match.
    #[error("corrupt delta: window {window} {scope} checksum mismatch (expected {expected:#010X}, got {actual:#010X})")]
    CorruptDelta {
        window: u64,
        scope: ChecksumScope,
        expected: u32,
        actual: u32,
    },

    /// The stream was written by a newer format revision.
    #[error("unsupported format version {found} (this build reads up to {supported})")]
    UnsupportedVersion { found: u8, supported: u8 },

    /// The stream header is not a patch header.
    #[error("invalid stream header: {0}")]
    InvalidHeader(String),

    #[error("decoding cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl DecodeError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInstruction(msg.into())
    }

    /// Whether the error describes bad patch data (as opposed to I/O or a
    /// cancellation request).
    pub fn is_data_error(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Io(_))
    }
}

impl From<VarIntError> for DecodeError {
    fn from(e: VarIntError) -> Self {
        Self::MalformedInstruction(e.to_string())
    }
}

impl From<io::Error> for DecodeError {
    /// End-of-stream inside a record means the patch was cut short, and
    /// invalid varints are bad patch data; both are malformed input rather
    /// than I/O failures.
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                Self::MalformedInstruction("truncated delta stream".into())
            }
            io::ErrorKind::InvalidData => Self::MalformedInstruction(e.to_string()),
            _ => Self::Io(e),
        }
    }
}

/// Failure while producing a patch.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("invalid encode options: {0}")]
    InvalidOptions(String),

    #[error("encoding cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// Patch stream format.
//
// - `varint`      : base-128 integers
// - `checksum`    : Adler-32 used for payload and target verification
// - `instruction` : Copy/Insert serialization
// - `header`      : stream and window headers
// - `encoder`     : window framing and stream writing
// - `decoder`     : stream reading and window replay
// - `error`       : decode/encode error types

pub mod checksum;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod header;
pub mod instruction;
pub mod varint;

pub use decoder::{DecodePhase, StreamDecoder, WindowRecord, decode_memory};
pub use encoder::{SourceRange, StreamEncoder, WindowSections};
pub use error::{ChecksumScope, DecodeError, EncodeError};
pub use header::{StreamHeader, WindowHeader};
pub use instruction::Instruction;

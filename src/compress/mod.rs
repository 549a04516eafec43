// Streaming encode/decode front ends over the patch format.
//
// - `encoder`   : DeltaEncoder, streaming encode with source index reuse
// - `decoder`   : DeltaDecoder, streaming decode with progress tracking
// - `pipeline`  : match list to instruction list
// - `secondary` : pluggable payload compression (LZMA, Zlib, custom)

pub mod decoder;
pub mod encoder;
pub mod pipeline;
pub mod secondary;

pub use decoder::DeltaDecoder;
pub use encoder::{CompressOptions, DeltaEncoder};
pub use secondary::{CompressBackend, SecondaryCompression};

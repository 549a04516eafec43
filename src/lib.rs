//! oxipatch: a streaming binary delta (patch) codec.
//!
//! A patch describes a target as copies from a source plus literal bytes.
//! The crate provides:
//! - The patch wire format: headers, instructions and framing (`format`)
//! - The fingerprint index and greedy matcher (`hash`)
//! - Streaming encoder/decoder front ends and secondary compression (`compress`)
//! - One-shot in-memory calls with progress and cancellation (`engine`, `hooks`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use oxipatch::engine::{self, EncodeOptions};
//!
//! let source = b"hello old world, hello old world";
//! let target = b"hello new world, hello old world";
//!
//! let delta = engine::encode(source, target, &EncodeOptions::default()).unwrap();
//! let decoded = engine::decode(source, &delta).unwrap();
//! assert_eq!(decoded, target);
//! ```
//!
//! Streaming, window by window:
//!
//! ```
//! use oxipatch::compress::{CompressOptions, DeltaDecoder, DeltaEncoder};
//!
//! let source = b"the source bytes";
//! let mut enc = DeltaEncoder::new(Vec::new(), source, CompressOptions::default()).unwrap();
//! enc.write_target(b"the target ").unwrap();
//! enc.write_target(b"bytes").unwrap();
//! let (delta, _windows) = enc.finish().unwrap();
//!
//! let mut out = Vec::new();
//! DeltaDecoder::new(delta.as_slice()).decode_to(source, &mut out).unwrap();
//! assert_eq!(out, b"the target bytes");
//! ```

pub mod compress;
pub mod engine;
pub mod format;
pub mod hash;
pub mod hooks;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;

// One-shot encode/decode API.
//
// These calls tie the streaming front ends to the per-call hooks: the target
// is fed one window at a time so cancellation is polled between windows and
// each finished window is reported through the message callback. Output is
// returned only on success.

use crate::compress::decoder::DeltaDecoder;
use crate::compress::encoder::DeltaEncoder;
use crate::format::header::HARD_MAX_WINDOW;
use crate::hooks::Hooks;

pub use crate::compress::encoder::CompressOptions as EncodeOptions;
pub use crate::format::error::{DecodeError, EncodeError};

// ---------------------------------------------------------------------------
// High-level encode
// ---------------------------------------------------------------------------

/// Encode a patch that turns `source` into `target`.
///
/// If `source` is empty, every window is stored as literals.
pub fn encode(
    source: &[u8],
    target: &[u8],
    opts: &EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    encode_with_hooks(source, target, opts, &mut Hooks::default())
}

/// `encode` with progress messages and cancellation between windows.
pub fn encode_with_hooks(
    source: &[u8],
    target: &[u8],
    opts: &EncodeOptions,
    hooks: &mut Hooks<'_>,
) -> Result<Vec<u8>, EncodeError> {
    let mut enc = DeltaEncoder::with_target_len(
        Vec::with_capacity(target.len() / 8 + 64),
        source,
        opts.clone(),
        target.len() as u64,
    )?;

    for window in target.chunks(enc.window_size()) {
        hooks.checkpoint_encode()?;
        enc.write_target(window)?;
        enc.flush_window()?;
        hooks.message(&format!(
            "encoded window {}: {} target bytes, {} delta bytes so far",
            enc.windows_written() - 1,
            window.len(),
            enc.bytes_out()
        ));
    }

    let (delta, windows) = enc.finish()?;
    hooks.message(&format!(
        "encoded {} bytes in {windows} windows into {} delta bytes",
        target.len(),
        delta.len()
    ));
    Ok(delta)
}

// ---------------------------------------------------------------------------
// High-level decode
// ---------------------------------------------------------------------------

/// Reconstruct the target from `source` and `delta`.
pub fn decode(source: &[u8], delta: &[u8]) -> Result<Vec<u8>, DecodeError> {
    decode_with_hooks(source, delta, &mut Hooks::default())
}

/// `decode` with progress messages and cancellation between windows.
pub fn decode_with_hooks(
    source: &[u8],
    delta: &[u8],
    hooks: &mut Hooks<'_>,
) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = DeltaDecoder::new(delta);
    let hdr = decoder.read_header()?;
    if hdr.source_len != source.len() as u64 {
        hooks.message(&format!(
            "warning: patch was made against a {}-byte source, got {} bytes",
            hdr.source_len,
            source.len()
        ));
    }
    let capacity = hdr.target_len.unwrap_or(0).min(HARD_MAX_WINDOW);
    let mut output = Vec::with_capacity(capacity as usize);

    loop {
        hooks.checkpoint_decode()?;
        let Some(len) = decoder.decode_window_to(source, &mut output)? else {
            break;
        };
        hooks.message(&format!(
            "decoded window {}: {len} bytes",
            decoder.windows_decoded() - 1
        ));
    }
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

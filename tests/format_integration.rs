// Integration tests for the patch wire format.
//
// Covers the exact byte layout of small streams, the instruction stream for
// a known edit, and how the decoder reacts to corrupted, truncated or
// inconsistent patches.

use oxipatch::compress::encoder::{CompressOptions, DeltaEncoder};
use oxipatch::engine::{self, EncodeOptions};
use oxipatch::format::decoder::{StreamDecoder, decode_memory};
use oxipatch::format::header::{FORMAT_VERSION, MAGIC, WindowFlags};
use oxipatch::format::instruction::Instruction;
use oxipatch::format::{ChecksumScope, DecodeError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn generate_data(size: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    let mut data = Vec::with_capacity(size);
    for _ in 0..size {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        data.push((state >> 33) as u8);
    }
    data
}

/// A source and a lightly edited target.
fn edited_pair() -> (Vec<u8>, Vec<u8>) {
    let source = generate_data(2048, 7);
    let mut target = source.clone();
    target[300] ^= 0x55;
    target[1500..1510].copy_from_slice(b"0123456789");
    target.extend_from_slice(b"appended tail");
    (source, target)
}

/// Position of the only window's payload: it sits right before the
/// one-byte terminator.
fn single_payload_range(delta: &[u8]) -> std::ops::Range<usize> {
    let mut dec = StreamDecoder::new(delta, true);
    let record = dec.read_window().unwrap().expect("one window");
    assert!(dec.read_window().unwrap().is_none(), "expected a single window");
    let end = delta.len() - 1;
    end - record.header.payload_len as usize..end
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[test]
fn empty_stream_layout() {
    let delta = engine::encode(b"", b"", &EncodeOptions::default()).unwrap();
    assert_eq!(
        delta,
        [
            MAGIC[0],
            MAGIC[1],
            MAGIC[2],
            MAGIC[3],
            FORMAT_VERSION,
            0x02, // target length present
            0x00, // source length
            0x00, // target length
            0x00, // terminator
        ]
    );
    assert!(engine::decode(b"", &delta).unwrap().is_empty());
}

#[test]
fn empty_target_with_source() {
    let delta = engine::encode(b"some source", b"", &EncodeOptions::default()).unwrap();
    // No windows, only header and terminator.
    let mut dec = StreamDecoder::new(delta.as_slice(), true);
    assert_eq!(dec.read_header().unwrap().source_len, 11);
    assert!(dec.read_window().unwrap().is_none());
    assert!(engine::decode(b"some source", &delta).unwrap().is_empty());
}

#[test]
fn appended_literal_instructions() {
    let source = vec![b'A'; 1000];
    let mut target = source.clone();
    target.extend_from_slice(b"BBBBBBBBBB");

    let delta = engine::encode(&source, &target, &EncodeOptions::default()).unwrap();

    let mut dec = StreamDecoder::new(delta.as_slice(), true);
    let record = dec.read_window().unwrap().unwrap();
    assert!(record.header.flags.contains(WindowFlags::SOURCE));
    assert_eq!(record.header.target_len, 1010);
    let insts: Vec<Instruction<'_>> = record.instructions().map(Result::unwrap).collect();
    assert_eq!(
        insts,
        [
            Instruction::Copy {
                offset: 0,
                len: 1000
            },
            Instruction::Insert {
                data: b"BBBBBBBBBB"
            },
        ]
    );

    let decoded = engine::decode(&source, &delta).unwrap();
    assert_eq!(decoded.len(), 1010);
    assert_eq!(decoded, target);
}

#[test]
fn identical_input_is_copy_dominated() {
    let data = generate_data(64 * 1024, 3);
    let delta = engine::encode(&data, &data, &EncodeOptions::default()).unwrap();
    assert!(delta.len() < 64, "delta is {} bytes", delta.len());

    let mut dec = StreamDecoder::new(delta.as_slice(), true);
    let record = dec.read_window().unwrap().unwrap();
    let insts: Vec<_> = record.instructions().map(Result::unwrap).collect();
    assert_eq!(
        insts,
        [Instruction::Copy {
            offset: 0,
            len: 64 * 1024
        }]
    );
}

#[test]
fn level_zero_windows_have_no_source() {
    let (source, target) = edited_pair();
    let opts = EncodeOptions {
        level: 0,
        ..Default::default()
    };
    let delta = engine::encode(&source, &target, &opts).unwrap();

    let mut dec = StreamDecoder::new(delta.as_slice(), true);
    let record = dec.read_window().unwrap().unwrap();
    assert!(!record.header.has_source());
    let insts: Vec<_> = record.instructions().map(Result::unwrap).collect();
    assert_eq!(insts, [Instruction::Insert { data: &target[..] }]);
    assert_eq!(engine::decode(&source, &delta).unwrap(), target);
}

#[test]
fn description_is_normalized() {
    let opts = EncodeOptions {
        app_header: Some(b"line one\r\nline two\rline three".to_vec()),
        ..Default::default()
    };
    let delta = engine::encode(b"abc", b"abcd", &opts).unwrap();
    let mut dec = StreamDecoder::new(delta.as_slice(), true);
    let hdr = dec.read_header().unwrap();
    assert_eq!(
        hdr.description().as_deref(),
        Some("line one\nline two\nline three")
    );
    assert_eq!(engine::decode(b"abc", &delta).unwrap(), b"abcd");
}

// ---------------------------------------------------------------------------
// Corruption
// ---------------------------------------------------------------------------

#[test]
fn payload_byte_flips_fail_checksum() {
    let (source, target) = edited_pair();
    let delta = engine::encode(&source, &target, &EncodeOptions::default()).unwrap();
    let payload = single_payload_range(&delta);
    assert!(!payload.is_empty());

    for i in payload {
        let mut bad = delta.clone();
        bad[i] ^= 0x01;
        match decode_memory(&bad, &source) {
            Err(DecodeError::CorruptDelta {
                window: 0,
                scope: ChecksumScope::Instructions,
                ..
            }) => {}
            other => panic!("flip at {i}: unexpected {other:?}"),
        }
    }
}

#[test]
fn unverified_payload_flips_are_still_caught_or_harmless() {
    let (source, target) = edited_pair();
    let delta = engine::encode(&source, &target, &EncodeOptions::default()).unwrap();

    for i in single_payload_range(&delta) {
        let mut bad = delta.clone();
        bad[i] ^= 0x80;
        let mut dec = StreamDecoder::new(bad.as_slice(), false);
        let mut out = Vec::new();
        // Without checksums a flip may decode to different bytes, but it must
        // never panic or overrun the source.
        match dec.decode_all(&source, &mut out) {
            Ok(()) => assert_eq!(out.len(), target.len()),
            Err(e) => assert!(e.is_data_error(), "flip at {i}: {e}"),
        }
    }
}

#[test]
fn any_byte_flip_never_yields_wrong_output() {
    let (source, target) = edited_pair();
    let delta = engine::encode(&source, &target, &EncodeOptions::default()).unwrap();

    for i in 0..delta.len() {
        for mask in [0x01u8, 0xFF] {
            let mut bad = delta.clone();
            bad[i] ^= mask;
            match decode_memory(&bad, &source) {
                // The source-length hint is advisory, so some flips decode.
                Ok(out) => assert_eq!(out, target, "flip {mask:#04X} at {i}"),
                Err(e) => assert!(e.is_data_error(), "flip {mask:#04X} at {i}: {e}"),
            }
        }
    }
}

#[test]
fn target_checksum_mismatch_names_window() {
    let opts = EncodeOptions {
        window_size: 100,
        ..Default::default()
    };
    let target = generate_data(250, 11);
    let delta = engine::encode(b"", &target, &opts).unwrap();

    // Three store-only windows: 100, 100 and 50 bytes. Each record is an
    // 11-byte header (one-byte varints, flags, two checksums) followed by the
    // payload, and the target checksum is the last header field.
    let mut dec = StreamDecoder::new(delta.as_slice(), true);
    let header_len = dec.read_header().unwrap().encoded_len();
    let w0 = dec.read_window().unwrap().unwrap();
    assert_eq!(w0.header.payload_len, 102);
    let w1_payload_start = header_len + 11 + 102 + 11;

    let mut bad = delta.clone();
    bad[w1_payload_start - 1] ^= 0xFF;

    match decode_memory(&bad, b"") {
        Err(DecodeError::CorruptDelta {
            window: 1,
            scope: ChecksumScope::Target,
            ..
        }) => {}
        other => panic!("unexpected {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Truncation and framing
// ---------------------------------------------------------------------------

#[test]
fn every_strict_prefix_is_malformed() {
    let (source, target) = edited_pair();
    let opts = EncodeOptions {
        window_size: 512,
        app_header: Some(b"prefix test".to_vec()),
        ..Default::default()
    };
    let delta = engine::encode(&source, &target, &opts).unwrap();

    for n in 0..delta.len() {
        match decode_memory(&delta[..n], &source) {
            Err(DecodeError::MalformedInstruction(_)) => {}
            other => panic!("prefix of {n} bytes: unexpected {other:?}"),
        }
    }
    assert_eq!(decode_memory(&delta, &source).unwrap(), target);
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut delta = engine::encode(b"abc", b"abcabc", &EncodeOptions::default()).unwrap();
    delta.push(0);
    assert!(matches!(
        engine::decode(b"abc", &delta),
        Err(DecodeError::MalformedInstruction(_))
    ));
}

#[test]
fn declared_target_length_must_match() {
    let mut enc =
        DeltaEncoder::with_target_len(Vec::new(), b"source", CompressOptions::default(), 5)
            .unwrap();
    enc.write_target(b"ten bytes!").unwrap();
    let (delta, _) = enc.finish().unwrap();

    match engine::decode(b"source", &delta) {
        Err(DecodeError::MalformedInstruction(msg)) => assert!(msg.contains("declares"), "{msg}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn short_source_is_out_of_range() {
    let source = generate_data(4096, 5);
    let delta = engine::encode(&source, &source, &EncodeOptions::default()).unwrap();
    match engine::decode(&source[..100], &delta) {
        Err(DecodeError::OutOfRangeCopy { limit: 100, .. }) => {}
        other => panic!("unexpected {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Header validation
// ---------------------------------------------------------------------------

#[test]
fn bad_magic_is_invalid_header() {
    let mut delta = engine::encode(b"a", b"b", &EncodeOptions::default()).unwrap();
    delta[1] = b'Z';
    assert!(matches!(
        engine::decode(b"a", &delta),
        Err(DecodeError::InvalidHeader(_))
    ));
}

#[test]
fn newer_version_is_unsupported() {
    let mut delta = engine::encode(b"a", b"b", &EncodeOptions::default()).unwrap();
    delta[4] = FORMAT_VERSION + 1;
    match engine::decode(b"a", &delta) {
        Err(DecodeError::UnsupportedVersion { found, supported }) => {
            assert_eq!(found, FORMAT_VERSION + 1);
            assert_eq!(supported, FORMAT_VERSION);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unknown_header_flags_are_invalid() {
    let mut delta = engine::encode(b"a", b"b", &EncodeOptions::default()).unwrap();
    delta[5] |= 0x80;
    assert!(matches!(
        engine::decode(b"a", &delta),
        Err(DecodeError::InvalidHeader(_))
    ));
}

#[test]
fn decoder_is_unusable_after_failure() {
    let mut delta = engine::encode(b"abc", b"abcd", &EncodeOptions::default()).unwrap();
    let last = delta.len() - 2;
    delta[last] ^= 0x01;
    let mut dec = StreamDecoder::new(delta.as_slice(), true);
    let mut out = Vec::new();
    assert!(dec.decode_window(b"abc", &mut out).is_err());
    assert!(out.is_empty());
    assert!(matches!(
        dec.decode_window(b"abc", &mut out),
        Err(DecodeError::MalformedInstruction(_))
    ));
}

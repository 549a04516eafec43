#![no_main]
use libfuzzer_sys::fuzz_target;
use oxipatch::compress::decoder::DeltaDecoder;
use oxipatch::compress::encoder::{CompressOptions, DeltaEncoder};
use oxipatch::compress::secondary::SecondaryCompression;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let level = (data[0] % 10) as u32;
    let chunk = 1 + data[1] as usize;
    let split = 3 + (data[2] as usize % (data.len() - 3));
    let source = &data[3..split];
    let target = &data[split..];

    let secondary = match data[0] / 10 % 3 {
        1 => SecondaryCompression::Zlib { level: 1 },
        2 => SecondaryCompression::Lzma,
        _ => SecondaryCompression::None,
    };
    let opts = CompressOptions {
        level,
        window_size: 512,
        secondary,
        ..Default::default()
    };

    // Feed the target in uneven pieces so writes straddle window edges.
    let mut enc = DeltaEncoder::new(Vec::new(), source, opts).unwrap();
    for piece in target.chunks(chunk) {
        enc.write_target(piece).unwrap();
    }
    let (delta, _) = enc.finish().unwrap();

    let mut out = Vec::new();
    let mut dec = DeltaDecoder::new(delta.as_slice());
    dec.decode_to(source, &mut out).unwrap();
    assert_eq!(out, target);
});

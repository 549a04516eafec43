#![no_main]
use libfuzzer_sys::fuzz_target;
use oxipatch::engine::{self, EncodeOptions};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    // Control bytes pick the options; the rest splits into source and target.
    let level = (data[0] % 10) as u32;
    let block_size = 1 + (data[1] % 32) as usize;
    let window_size = 1 + (data[2] as usize) * 16;
    let payload = &data[3..];
    let split = payload.len() / 2;
    let (source, target) = payload.split_at(split);

    let opts = EncodeOptions {
        level,
        block_size,
        min_match: block_size.min(4),
        window_size,
        ..Default::default()
    };
    let delta = engine::encode(source, target, &opts).unwrap();
    let decoded = engine::decode(source, &delta).unwrap();
    assert_eq!(decoded, target);
});

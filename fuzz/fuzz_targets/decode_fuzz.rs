#![no_main]
use libfuzzer_sys::fuzz_target;
use oxipatch::format::StreamDecoder;
use oxipatch::format::decoder;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    let _ = decoder::decode_memory(data, &[]);

    if data.len() >= 2 {
        let split = data.len() / 2;
        let (source, delta) = data.split_at(split);
        let _ = decoder::decode_memory(delta, source);
    }

    // Walk the instruction stream without applying it.
    let mut stream = StreamDecoder::new(data, false);
    if stream.read_header().is_err() {
        return;
    }
    while let Ok(Some(record)) = stream.read_window() {
        for inst in record.instructions() {
            if inst.is_err() {
                break;
            }
        }
    }
});

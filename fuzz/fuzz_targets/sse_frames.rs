#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((split, body)) = data.split_first() else {
        return;
    };
    let whole = linkpulse::fuzzing::decode_sse_split(body, body.len());
    let split = linkpulse::fuzzing::decode_sse_split(body, usize::from(*split));
    debug_assert_eq!(whole, split);
    for payload in &split {
        let _ = linkpulse::stream::parse_sample_json(payload);
    }
});

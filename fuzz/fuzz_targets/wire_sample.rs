#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(sample) = linkpulse::stream::parse_sample_json(input) {
            if let Some(latency) = sample.latency_ms {
                debug_assert!(latency.is_finite() && latency >= 0.0);
            }
        }
        if let Ok(serde_json::Value::Array(values)) = serde_json::from_str(input) {
            let count = values.len();
            debug_assert!(linkpulse::stream::decode_samples(values).len() <= count);
        }
    }
});

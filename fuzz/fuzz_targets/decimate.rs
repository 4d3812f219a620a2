#![no_main]

use libfuzzer_sys::fuzz_target;
use linkpulse::pipeline::{CentroidFallback, MIN_DECIMATION_TARGET};

fuzz_target!(|data: &[u8]| {
    for fallback in [CentroidFallback::PreviousPoint, CentroidFallback::NextBucketTime] {
        let (len, target, decimated) = linkpulse::fuzzing::decimate_bytes(data, fallback);
        let target = target.max(MIN_DECIMATION_TARGET);
        if len <= target {
            debug_assert_eq!(decimated.len(), len);
        } else {
            debug_assert_eq!(decimated.len(), target);
        }
        debug_assert!(decimated.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp));
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use linkpulse::args::Command;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(args) = linkpulse::fuzzing::apply_config_from_toml(input) {
            if let Command::Watch(watch) = args.command {
                debug_assert!(watch.decimation_target.get() >= 1);
                debug_assert!(watch.capacity.get() >= 1);
                debug_assert!(watch.reconnect_growth >= 1.0);
                debug_assert!(!(watch.no_persist && watch.snapshot_db.is_some()));
            }
        }
    }
});

#![no_main]

use cotejo::timing::{aggregate, parse_timings};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Malformed input must come back as an error, never a panic
        if let Ok(samples) = parse_timings(input) {
            let _ = aggregate(&[samples]);
        }
    }
});

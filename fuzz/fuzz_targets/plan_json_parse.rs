//! Fuzz target for import plan JSON parsing.
//!
//! This fuzzer feeds arbitrary byte sequences to the plan parser,
//! checking for panics, crashes, or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use labelport::plan::from_json_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(mut plan) = from_json_slice(data) {
        let labels: Vec<u64> = plan.mapping.iter().map(|(label, _)| label).collect();
        let _ = plan.mapping.clone().normalize(&labels);
        let _ = plan.offset.get(labelport::volume::Axis::Z);
        let _ = plan.offset.set(labelport::volume::Axis::X, 0);
    }
});

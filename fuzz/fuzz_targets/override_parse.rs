//! Fuzz target for `--offset` and `--map` override parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use labelport::plan::{LabelMapping, MappingOverride, OffsetOverride};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = text.parse::<OffsetOverride>();
    if let Ok(change) = text.parse::<MappingOverride>() {
        let mut mapping: LabelMapping = [(change.label, change.label)].into_iter().collect();
        mapping.apply_override(&change, 255);
        assert!(mapping.get(change.label) <= 255);
    }
});

//! Fuzz target for axis order parsing.
//!
//! Any string that parses must print back to a string that parses to the
//! same axis order.

#![no_main]

use libfuzzer_sys::fuzz_target;
use labelport::volume::AxisOrder;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(axes) = text.parse::<AxisOrder>() {
        let printed = axes.to_string();
        let reparsed: AxisOrder = printed.parse().expect("printed axis order parses");
        assert_eq!(reparsed, axes);
        let _ = AxisOrder::default_for_rank(axes.len());
    }
});

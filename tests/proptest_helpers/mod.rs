#![allow(dead_code)]

use labelport::volume::{Label, LabelHistogram};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Labels spread over small and huge values, so value-indexed lookups would
/// be infeasible.
pub fn arb_label() -> impl Strategy<Value = Label> {
    prop_oneof![
        3 => 0u64..16,
        2 => 16u64..100_000,
        1 => 1_000_000_000u64..=u64::MAX,
    ]
}

/// A histogram with 1..24 distinct labels, background included or not.
pub fn arb_histogram() -> impl Strategy<Value = LabelHistogram> {
    btree_map(arb_label(), 1u64..1000, 1..24)
        .prop_map(|counts| LabelHistogram::from_counts(counts))
}

/// A histogram together with flat data drawn only from its labels.
pub fn arb_histogram_and_data() -> impl Strategy<Value = (LabelHistogram, Vec<Label>)> {
    arb_histogram().prop_flat_map(|histogram| {
        let labels = histogram.labels();
        let data = vec(proptest::sample::select(labels), 1..200);
        (Just(histogram), data)
    })
}

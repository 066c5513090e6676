//! Distinct label values and their occurrence counts.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::ArrayViewD;
use serde::{Deserialize, Serialize};

use super::{Label, BACKGROUND};

/// Occurrence count of one label value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: Label,
    pub count: u64,
}

/// Distinct labels observed in a volume, sorted by label value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelHistogram {
    entries: Vec<LabelCount>,
}

impl LabelHistogram {
    /// Counts every value of `data` in a single pass.
    pub fn from_array(data: ArrayViewD<'_, Label>) -> Self {
        let mut counts: BTreeMap<Label, u64> = BTreeMap::new();
        for &value in data.iter() {
            *counts.entry(value).or_insert(0) += 1;
        }
        Self::from_counts(counts)
    }

    /// Builds a histogram from `(label, count)` pairs. Counts for repeated
    /// labels are summed.
    pub fn from_counts(counts: impl IntoIterator<Item = (Label, u64)>) -> Self {
        let mut merged: BTreeMap<Label, u64> = BTreeMap::new();
        for (label, count) in counts {
            *merged.entry(label).or_insert(0) += count;
        }
        Self {
            entries: merged
                .into_iter()
                .map(|(label, count)| LabelCount { label, count })
                .collect(),
        }
    }

    /// Entries in ascending label order.
    pub fn entries(&self) -> &[LabelCount] {
        &self.entries
    }

    /// The distinct labels in ascending order.
    pub fn labels(&self) -> Vec<Label> {
        self.entries.iter().map(|e| e.label).collect()
    }

    /// Number of distinct labels, background included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no value was observed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct labels other than background.
    pub fn nonzero_len(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.label != BACKGROUND)
            .count()
    }

    /// True if `label` was observed.
    pub fn contains(&self, label: Label) -> bool {
        self.entries
            .binary_search_by_key(&label, |e| e.label)
            .is_ok()
    }

    /// Occurrence count of `label` (0 if never observed).
    pub fn count(&self, label: Label) -> u64 {
        self.entries
            .binary_search_by_key(&label, |e| e.label)
            .map(|i| self.entries[i].count)
            .unwrap_or(0)
    }

    /// Total number of counted elements.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }
}

impl fmt::Display for LabelHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>20}  {:>12}", "label", "px count")?;
        for entry in &self.entries {
            writeln!(f, "{:>20}  {:>12}", entry.label, entry.count)?;
        }
        Ok(())
    }
}

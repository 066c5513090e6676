//! Label remap planning: the default observed → destination mapping, caller
//! overrides, and the identity short-circuit.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LabelportError;
use crate::volume::{Label, LabelHistogram, BACKGROUND};

/// What to do when the source has more nonzero labels than the destination
/// can hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Collapse the lowest labels onto background.
    #[default]
    Clamp,
    /// Refuse with [`LabelportError::LabelCapacityExceeded`].
    Strict,
}

/// Observed source label → destination label.
///
/// A label without an entry maps to [`BACKGROUND`]. Looking a label up never
/// inserts it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMapping {
    entries: BTreeMap<Label, Label>,
}

impl LabelMapping {
    /// An empty mapping: every label maps to background.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default mapping for a destination holding `capacity` labels.
    ///
    /// Observed labels are visited in descending order and given destination
    /// ids counting down from `capacity`. Background always maps to
    /// background. Once ids run out the count stays at 0, so the lowest
    /// labels collapse onto background.
    pub fn default_for(capacity: Label, histogram: &LabelHistogram) -> Self {
        let mut entries = BTreeMap::new();
        let mut next = capacity;
        for entry in histogram.entries().iter().rev() {
            let target = if entry.label == BACKGROUND {
                BACKGROUND
            } else {
                next
            };
            entries.insert(entry.label, target);
            next = next.saturating_sub(1);
        }
        Self { entries }
    }

    /// [`LabelMapping::default_for`] under a [`CapacityPolicy`].
    pub fn default_with_policy(
        capacity: Label,
        histogram: &LabelHistogram,
        policy: CapacityPolicy,
    ) -> Result<Self, LabelportError> {
        let distinct = histogram.nonzero_len();
        if policy == CapacityPolicy::Strict && distinct as u64 > capacity {
            return Err(LabelportError::LabelCapacityExceeded { distinct, capacity });
        }

        let mapping = Self::default_for(capacity, histogram);
        let collapsed = mapping.collapsed_to_background();
        if !collapsed.is_empty() {
            log::warn!(
                "{} label(s) exceed the destination capacity of {} and collapse onto background",
                collapsed.len(),
                capacity
            );
        }
        Ok(mapping)
    }

    /// Maps every label of `histogram` onto itself.
    pub fn identity(histogram: &LabelHistogram) -> Self {
        histogram
            .entries()
            .iter()
            .map(|e| (e.label, e.label))
            .collect()
    }

    /// Destination label for `label`.
    pub fn get(&self, label: Label) -> Label {
        self.entries.get(&label).copied().unwrap_or(BACKGROUND)
    }

    /// The explicit entry for `label`, if any.
    pub fn entry(&self, label: Label) -> Option<Label> {
        self.entries.get(&label).copied()
    }

    pub fn set(&mut self, label: Label, target: Label) {
        self.entries.insert(label, target);
    }

    /// Maps `label` to background.
    pub fn disable(&mut self, label: Label) {
        self.entries.insert(label, BACKGROUND);
    }

    /// Applies a caller override.
    ///
    /// A disabled label maps to background. An enabled label maps to its
    /// target, or to itself when the target is 0, clamped into `[1, capacity]`.
    pub fn apply_override(&mut self, change: &MappingOverride, capacity: Label) {
        match change.target {
            None => self.disable(change.label),
            Some(target) => {
                let wanted = if target == BACKGROUND {
                    change.label
                } else {
                    target
                };
                self.set(change.label, wanted.max(1).min(capacity));
            }
        }
    }

    /// Iterates entries in ascending source label order.
    pub fn iter(&self) -> impl Iterator<Item = (Label, Label)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when every label in `labels` keeps its value.
    ///
    /// A nonzero label without an entry goes to background, so it breaks the
    /// identity even though no entry says so.
    pub fn is_identity_over(&self, labels: &[Label]) -> bool {
        labels.iter().all(|l| self.get(*l) == *l)
    }

    /// Labels of `labels` that have no entry.
    pub fn missing<'a>(&'a self, labels: &'a [Label]) -> impl Iterator<Item = Label> + 'a {
        labels
            .iter()
            .copied()
            .filter(|l| !self.entries.contains_key(l))
    }

    /// True when the keys are exactly the labels of `histogram`.
    pub fn keys_match(&self, histogram: &LabelHistogram) -> bool {
        self.entries.len() == histogram.len() && self.missing(&histogram.labels()).next().is_none()
    }

    /// Nonzero source labels that end up as background.
    pub fn collapsed_to_background(&self) -> Vec<Label> {
        self.entries
            .iter()
            .filter(|(k, v)| **k != BACKGROUND && **v == BACKGROUND)
            .map(|(k, _)| *k)
            .collect()
    }

    /// True when at least one label lands on a nonzero destination id.
    pub fn has_foreground(&self) -> bool {
        self.entries.values().any(|v| *v != BACKGROUND)
    }

    /// Resolves the mapping into what the commit has to do for data made of
    /// `labels`.
    pub fn normalize(self, labels: &[Label]) -> NormalizedMapping {
        if self.is_identity_over(labels) {
            NormalizedMapping::Identity
        } else {
            NormalizedMapping::Relabel(self)
        }
    }
}

impl FromIterator<(Label, Label)> for LabelMapping {
    fn from_iter<I: IntoIterator<Item = (Label, Label)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for LabelMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, target) in self.iter() {
            if target == BACKGROUND && label != BACKGROUND {
                writeln!(f, "  {:>12} -> {:<12} (off)", label, target)?;
            } else {
                writeln!(f, "  {:>12} -> {}", label, target)?;
            }
        }
        Ok(())
    }
}

/// A mapping after [`LabelMapping::normalize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NormalizedMapping {
    /// Every label keeps its value; no relabel pass is needed.
    Identity,
    Relabel(LabelMapping),
}

/// One caller change to the default mapping.
///
/// Parses from `LABEL=TARGET` or `LABEL=off`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingOverride {
    pub label: Label,
    /// `None` disables the label.
    pub target: Option<Label>,
}

impl FromStr for MappingOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, target) = s
            .split_once('=')
            .ok_or_else(|| format!("expected LABEL=TARGET or LABEL=off, got '{}'", s))?;
        let label = label
            .trim()
            .parse::<Label>()
            .map_err(|e| format!("invalid label '{}': {}", label.trim(), e))?;
        let target = match target.trim() {
            "off" | "none" => None,
            t => Some(
                t.parse::<Label>()
                    .map_err(|e| format!("invalid target '{}': {}", t, e))?,
            ),
        };
        Ok(Self { label, target })
    }
}

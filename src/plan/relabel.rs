//! Rank-based relabeling.
//!
//! Label values can be arbitrarily large while the number of distinct labels
//! stays small, so nothing here is indexed by label value. Each element is
//! located among the sorted distinct labels by binary search and replaced by
//! the target stored at that rank.

use ndarray::ArrayViewD;

use super::LabelMapping;
use crate::error::LabelportError;
use crate::volume::{Label, LabelArray, LabelHistogram};

/// Applies a [`LabelMapping`] to label arrays.
#[derive(Clone, Debug)]
pub struct Relabeler {
    keys: Vec<Label>,
    targets: Vec<Label>,
}

impl Relabeler {
    /// Builds the lookup for `labels` under `mapping`.
    ///
    /// `labels` is sorted and deduplicated here, so any order is accepted.
    pub fn new(labels: impl IntoIterator<Item = Label>, mapping: &LabelMapping) -> Self {
        let mut keys: Vec<Label> = labels.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();
        let targets = keys.iter().map(|k| mapping.get(*k)).collect();
        Self { keys, targets }
    }

    /// Lookup over the labels of `histogram`.
    pub fn for_histogram(histogram: &LabelHistogram, mapping: &LabelMapping) -> Self {
        Self::new(histogram.labels(), mapping)
    }

    /// Number of distinct labels known to the lookup.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Destination label for one value.
    pub fn lookup(&self, value: Label) -> Result<Label, LabelportError> {
        self.keys
            .binary_search(&value)
            .map(|rank| self.targets[rank])
            .map_err(|_| LabelportError::UnknownLabel(value))
    }

    /// Relabels `data` into a new array of the same shape.
    pub fn relabel(&self, data: ArrayViewD<'_, Label>) -> Result<LabelArray, LabelportError> {
        let mut out = data.to_owned();
        self.relabel_in_place(&mut out)?;
        Ok(out)
    }

    /// Relabels `data` in place.
    ///
    /// On error `data` may be partially relabeled.
    pub fn relabel_in_place(&self, data: &mut LabelArray) -> Result<(), LabelportError> {
        for value in data.iter_mut() {
            *value = self.lookup(*value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn test_relabel_huge_labels_by_rank() {
        let data = ArrayD::from_shape_vec(
            IxDyn(&[2, 3]),
            vec![0, 1, 5, 9_000_000_000, 5, 0],
        )
        .unwrap();
        let mapping: LabelMapping = [(0, 0), (1, 0), (5, 1), (9_000_000_000, 2)]
            .into_iter()
            .collect();
        let relabeler = Relabeler::new([9_000_000_000, 5, 1, 0], &mapping);

        let out = relabeler.relabel(data.view()).unwrap();
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![0, 0, 1, 2, 1, 0]);
    }

    #[test]
    fn test_unknown_value_is_an_error() {
        let mapping: LabelMapping = [(0, 0), (1, 1)].into_iter().collect();
        let relabeler = Relabeler::new([0, 1], &mapping);
        let data = ArrayD::from_shape_vec(IxDyn(&[3]), vec![0, 1, 2]).unwrap();
        assert!(matches!(
            relabeler.relabel(data.view()),
            Err(LabelportError::UnknownLabel(2))
        ));
    }

    #[test]
    fn test_labels_missing_from_mapping_become_background() {
        let mapping: LabelMapping = [(4, 2)].into_iter().collect();
        let relabeler = Relabeler::new([3, 4], &mapping);
        assert_eq!(relabeler.lookup(3).unwrap(), 0);
        assert_eq!(relabeler.lookup(4).unwrap(), 2);
    }
}

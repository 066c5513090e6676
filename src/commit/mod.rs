//! Committing a resolved plan into the destination volume.
//!
//! The committer re-checks every geometric and mapping invariant before the
//! destination is touched, relabels if the mapping is not the identity, and
//! performs exactly one bounded write.

use serde::Serialize;

use crate::error::LabelportError;
use crate::plan::{geometry, ImportPlan, NormalizedMapping, Relabeler};
use crate::volume::{Axis, DestinationVolume, Label, LabelArray, LabelHistogram, Roi};

/// What a commit wrote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    /// Destination region that was overwritten.
    pub start: Vec<usize>,
    pub stop: Vec<usize>,
    /// False when the identity mapping let the relabel pass be skipped.
    pub relabeled: bool,
    /// Number of elements written.
    pub elements: usize,
}

/// Applies an [`ImportPlan`] to materialized source data.
#[derive(Clone, Debug)]
pub struct ImportCommitter {
    labels: Vec<Label>,
}

impl ImportCommitter {
    /// A committer for data whose distinct labels are those of `histogram`.
    pub fn new(histogram: &LabelHistogram) -> Self {
        Self {
            labels: histogram.labels(),
        }
    }

    /// Writes `data`, already reordered into `plan.target_axes`, into
    /// `destination` at `plan.offset`.
    ///
    /// Any violated invariant fails with
    /// [`LabelportError::WriteOutOfBounds`] and leaves the destination
    /// untouched.
    pub fn commit(
        &self,
        plan: &ImportPlan,
        data: &LabelArray,
        destination: &mut dyn DestinationVolume,
    ) -> Result<CommitSummary, LabelportError> {
        let roi = self.check(plan, data.shape(), destination)?;

        let relabeled = match plan.mapping.clone().normalize(&self.labels) {
            NormalizedMapping::Identity => {
                log::debug!("identity mapping, skipping relabel");
                destination.write(&roi, data.view())?;
                false
            }
            NormalizedMapping::Relabel(mapping) => {
                let relabeler = Relabeler::new(self.labels.iter().copied(), &mapping);
                let relabeled = relabeler.relabel(data.view())?;
                destination.write(&roi, relabeled.view())?;
                true
            }
        };

        let summary = CommitSummary {
            start: roi.start.clone(),
            stop: roi.stop(),
            relabeled,
            elements: roi.len(),
        };
        log::info!(
            "committed {} element(s) into {:?}..{:?}{}",
            summary.elements,
            summary.start,
            summary.stop,
            if relabeled { " (relabeled)" } else { "" }
        );
        Ok(summary)
    }

    /// Re-validates the plan and returns the destination region to write.
    fn check(
        &self,
        plan: &ImportPlan,
        shape: &[usize],
        destination: &dyn DestinationVolume,
    ) -> Result<Roi, LabelportError> {
        if destination.axis_order() != &plan.target_axes {
            return Err(LabelportError::out_of_bounds(format!(
                "plan targets axes '{}' but the destination has '{}'",
                plan.target_axes,
                destination.axis_order()
            )));
        }
        if plan.offset.axes != plan.target_axes
            || plan.offset.values.len() != plan.target_axes.len()
        {
            return Err(LabelportError::out_of_bounds(format!(
                "offset axes '{}' do not match target axes '{}'",
                plan.offset.axes, plan.target_axes
            )));
        }

        geometry::validate(&plan.target_axes, shape, destination.shape())
            .map_err(|e| LabelportError::out_of_bounds(e.to_string()))?;

        if plan.offset.get(Axis::C) != 0 {
            return Err(LabelportError::out_of_bounds("channel offset must be 0"));
        }

        let roi = Roi::from_shape(shape).offset_by(&plan.offset.values);
        if !roi.fits_within(destination.shape()) {
            return Err(LabelportError::out_of_bounds(format!(
                "offset {:?} places shape {:?} outside destination shape {:?}",
                plan.offset.values,
                shape,
                destination.shape()
            )));
        }

        if let Some(label) = plan.mapping.missing(&self.labels).next() {
            return Err(LabelportError::out_of_bounds(format!(
                "source label {} has no mapping entry",
                label
            )));
        }
        if let Some((label, _)) = plan
            .mapping
            .iter()
            .find(|(label, _)| self.labels.binary_search(label).is_err())
        {
            return Err(LabelportError::out_of_bounds(format!(
                "mapping names label {}, which does not occur in the source",
                label
            )));
        }

        if let Some((label, target)) = plan
            .mapping
            .iter()
            .find(|(_, target)| *target > plan.label_capacity)
        {
            return Err(LabelportError::out_of_bounds(format!(
                "label {} maps to {}, above the label capacity {}",
                label, target, plan.label_capacity
            )));
        }

        Ok(roi)
    }
}

//! End-to-end import sessions.
//!
//! A session is strictly sequential:
//!
//! ```text
//!   load -> statistics -> plan -> (overrides) -> commit
//! ```
//!
//! The session owns its [`VolumePipeline`]; whether it ends in a commit, an
//! error or a plain drop, every pipeline stage is released and the
//! destination is written at most once.

mod report;

pub use report::InspectReport;

use std::path::{Path, PathBuf};

use crate::commit::{CommitSummary, ImportCommitter};
use crate::error::LabelportError;
use crate::pipeline::{StageGraph, VolumePipeline};
use crate::plan::{
    geometry, CapacityPolicy, ImportPlan, LabelMapping, MappingOverride, OffsetOverride,
};
use crate::reader::ReaderRegistry;
use crate::validation::{self, PlanSubject, ValidateOptions, ValidationReport};
use crate::volume::{AxisOrder, DestinationVolume, Label, LabelHistogram};

/// Options for one import.
#[derive(Clone, Debug)]
pub struct ImportOptions {
    /// Largest label id the destination can hold.
    pub label_capacity: Label,
    pub capacity_policy: CapacityPolicy,
    /// How to interpret the source axes; the reader's default if unset.
    pub source_axes: Option<AxisOrder>,
    /// Base for relative source paths.
    pub working_directory: Option<PathBuf>,
    /// A previously exported plan used instead of the computed defaults.
    pub plan: Option<ImportPlan>,
    pub offset_overrides: Vec<OffsetOverride>,
    pub mapping_overrides: Vec<MappingOverride>,
    /// If true, plan warnings block the commit.
    pub strict: bool,
    /// Width of histogram bars in the inspect report.
    pub bar_width: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            label_capacity: 255,
            capacity_policy: CapacityPolicy::default(),
            source_axes: None,
            working_directory: None,
            plan: None,
            offset_overrides: Vec::new(),
            mapping_overrides: Vec::new(),
            strict: false,
            bar_width: 20,
        }
    }
}

/// One import from loaded source to commit.
pub struct ImportSession {
    pipeline: VolumePipeline,
    histogram: LabelHistogram,
    source_shape: Vec<usize>,
    reordered_shape: Vec<usize>,
    plan: ImportPlan,
    options: ImportOptions,
}

impl ImportSession {
    /// Loads `sources`, computes their label statistics and resolves the
    /// plan against `destination`.
    ///
    /// The plan starts from `options.plan` if given, otherwise from the
    /// computed defaults, and the overrides in `options` are applied on top.
    pub fn open(
        graph: &StageGraph,
        registry: &ReaderRegistry,
        sources: &[PathBuf],
        destination: &dyn DestinationVolume,
        options: ImportOptions,
    ) -> Result<Self, LabelportError> {
        let mut pipeline = VolumePipeline::load(
            graph,
            registry,
            sources,
            options.working_directory.as_deref(),
        )?;
        let source_shape = pipeline.source_shape()?;

        // Only the histogram is kept; the raw data stays in the cache stage.
        let histogram = pipeline.materialize_all()?.histogram;

        let source_axes = match (&options.source_axes, &options.plan) {
            (Some(axes), _) => axes.clone(),
            (None, Some(plan)) => plan.source_axes.clone(),
            (None, None) => pipeline.source_axis_order()?,
        };
        let target_axes = destination.axis_order().clone();
        pipeline.retag(source_axes.clone())?;
        let reordered_shape = pipeline.reorder_to(&target_axes)?;
        log::info!(
            "source {:?} ({}) reorders to {:?} ({})",
            source_shape,
            source_axes,
            reordered_shape,
            target_axes
        );

        let mut plan = match &options.plan {
            Some(plan) => ImportPlan {
                source_axes,
                label_capacity: options.label_capacity,
                ..plan.clone()
            },
            None => ImportPlan {
                offset: geometry::default_offset(
                    &target_axes,
                    &reordered_shape,
                    destination.shape(),
                    Some(pipeline.file_names()),
                ),
                mapping: LabelMapping::default_with_policy(
                    options.label_capacity,
                    &histogram,
                    options.capacity_policy,
                )?,
                source_axes,
                target_axes,
                label_capacity: options.label_capacity,
            },
        };
        plan.apply_offset_overrides(&options.offset_overrides)?;
        plan.apply_mapping_overrides(&options.mapping_overrides)?;

        Ok(Self {
            pipeline,
            histogram,
            source_shape,
            reordered_shape,
            plan,
            options,
        })
    }

    /// Distinct source labels and their counts.
    pub fn histogram(&self) -> &LabelHistogram {
        &self.histogram
    }

    /// The resolved plan.
    pub fn plan(&self) -> &ImportPlan {
        &self.plan
    }

    /// Source shape as read.
    pub fn source_shape(&self) -> &[usize] {
        &self.source_shape
    }

    /// Source shape in the destination's axis order.
    pub fn reordered_shape(&self) -> &[usize] {
        &self.reordered_shape
    }

    /// Checks the plan against the source and `destination`.
    pub fn validate(&self, destination: &dyn DestinationVolume) -> ValidationReport {
        validation::validate_plan(
            &self.plan,
            &PlanSubject {
                source_shape: &self.reordered_shape,
                destination_shape: destination.shape(),
                destination_axes: destination.axis_order(),
                histogram: &self.histogram,
            },
        )
    }

    /// Everything the commit would do, without doing it.
    pub fn inspect(&self, destination: &dyn DestinationVolume) -> InspectReport {
        InspectReport {
            files: self.pipeline.file_names().to_vec(),
            source_shape: self.source_shape.clone(),
            source_axes: self.plan.source_axes.clone(),
            reordered_shape: self.reordered_shape.clone(),
            destination_shape: destination.shape().to_vec(),
            destination_axes: destination.axis_order().clone(),
            histogram: self.histogram.clone(),
            plan: self.plan.clone(),
            validation: self.validate(destination),
            bar_width: self.options.bar_width,
        }
    }

    /// Validates the plan, materializes the reordered source and writes it
    /// into `destination`.
    ///
    /// Geometry failures surface as `ShapeTooLarge` / `ShapeMismatch`, other
    /// plan problems as `PlanRejected`. On any failure the destination is
    /// untouched. The pipeline is released before returning either way.
    pub fn commit(
        mut self,
        destination: &mut dyn DestinationVolume,
    ) -> Result<CommitSummary, LabelportError> {
        geometry::validate(
            &self.plan.target_axes,
            &self.reordered_shape,
            destination.shape(),
        )?;
        validation::ensure_committable(
            self.validate(destination),
            &ValidateOptions {
                strict: self.options.strict,
            },
        )?;

        let data = self.pipeline.materialize_reordered(&self.plan.target_axes)?;
        let summary = ImportCommitter::new(&self.histogram).commit(&self.plan, &data, destination)?;
        self.pipeline.close();
        Ok(summary)
    }
}

/// Inspects an import of `sources` into `destination` with a fresh stage
/// graph and the built-in readers.
pub fn inspect(
    sources: &[PathBuf],
    destination: &dyn DestinationVolume,
    options: ImportOptions,
) -> Result<InspectReport, LabelportError> {
    let graph = StageGraph::new();
    let session = ImportSession::open(
        &graph,
        &ReaderRegistry::new(),
        sources,
        destination,
        options,
    )?;
    Ok(session.inspect(destination))
}

/// Imports `sources` into `destination` with a fresh stage graph and the
/// built-in readers.
pub fn import(
    sources: &[PathBuf],
    destination: &mut dyn DestinationVolume,
    options: ImportOptions,
) -> Result<CommitSummary, LabelportError> {
    let graph = StageGraph::new();
    let session = ImportSession::open(
        &graph,
        &ReaderRegistry::new(),
        sources,
        destination,
        options,
    )?;
    session.commit(destination)
}

/// Resolves `path` against `working_directory` when it is relative.
pub fn resolve_path(path: &Path, working_directory: Option<&Path>) -> PathBuf {
    match working_directory {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

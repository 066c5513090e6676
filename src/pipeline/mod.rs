//! The lazy read → cache → retag → reorder chain for one import.
//!
//! ```text
//!   read --> cache --> retag (caller axis order) --> reorder (destination axis order)
//! ```
//!
//! A [`VolumePipeline`] owns all four stages for the lifetime of one import.
//! Dropping it releases them in reverse construction order, on every exit
//! path, so an aborted import leaves no live stage behind in the
//! [`StageGraph`].

mod stage;

pub use stage::{
    reorder_view, CacheStage, ReadStage, ReorderStage, RetagStage, Stage, StageGraph, StageGuard,
    StageKind,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::LabelportError;
use crate::reader::ReaderRegistry;
use crate::volume::{AxisOrder, LabelArray, LabelHistogram, Roi};

/// The fully materialized raw source and its label statistics.
#[derive(Clone, Debug)]
pub struct Materialized {
    /// The raw, pre-remap data held by the cache stage. Shared, not copied.
    pub raw: Arc<LabelArray>,
    /// Distinct labels of `raw` with their counts.
    pub histogram: LabelHistogram,
}

/// Stage chain for importing one external label volume.
pub struct VolumePipeline {
    read: Option<StageGuard<ReadStage>>,
    cache: Option<StageGuard<CacheStage>>,
    retag: Option<StageGuard<RetagStage>>,
    reorder: Option<StageGuard<ReorderStage>>,
    histogram: Option<LabelHistogram>,
    file_names: Vec<String>,
}

impl VolumePipeline {
    /// Builds the stage chain and opens `paths` as the source volume.
    ///
    /// All four stages are acquired up front; if opening the source fails
    /// they are released before the error is returned.
    pub fn load(
        graph: &StageGraph,
        registry: &ReaderRegistry,
        paths: &[PathBuf],
        working_directory: Option<&Path>,
    ) -> Result<Self, LabelportError> {
        let mut pipeline = Self {
            read: Some(StageGuard::acquire(graph, ReadStage::default())),
            cache: Some(StageGuard::acquire(graph, CacheStage::default())),
            retag: Some(StageGuard::acquire(graph, RetagStage::default())),
            reorder: Some(StageGuard::acquire(graph, ReorderStage::default())),
            histogram: None,
            file_names: Vec::new(),
        };

        let (read, cache) = pipeline.read_and_cache()?;
        read.open(registry, paths, working_directory)?;
        cache.connect(read)?;
        pipeline.file_names = pipeline.read_stage()?.source()?.file_names();

        Ok(pipeline)
    }

    /// Shape of the source as read.
    pub fn source_shape(&self) -> Result<Vec<usize>, LabelportError> {
        Ok(self.read_stage()?.source()?.shape().to_vec())
    }

    /// The reader's default axis interpretation of the source.
    pub fn source_axis_order(&self) -> Result<AxisOrder, LabelportError> {
        Ok(self.read_stage()?.source()?.axis_order().clone())
    }

    /// Base names of the source files, in stack order.
    pub fn file_names(&self) -> &[String] {
        &self.file_names
    }

    /// The histogram computed by [`VolumePipeline::materialize_all`], if run.
    pub fn histogram(&self) -> Option<&LabelHistogram> {
        self.histogram.as_ref()
    }

    /// Forces the cache to hold the whole source, then performs one full
    /// read of it and computes the label histogram.
    ///
    /// The histogram is retained by the pipeline. The returned raw data
    /// shares the cache's buffer.
    pub fn materialize_all(&mut self) -> Result<Materialized, LabelportError> {
        let (read, cache) = self.read_and_cache()?;
        cache.fill(read)?;

        let raw = Arc::clone(cache.output()?);
        let histogram = LabelHistogram::from_array(raw.view());
        log::info!(
            "source holds {} distinct label(s) over {} element(s)",
            histogram.len(),
            histogram.total()
        );

        self.histogram = Some(histogram.clone());
        Ok(Materialized { raw, histogram })
    }

    /// Reinterprets the cached source under `axes` without copying it.
    ///
    /// Requires [`VolumePipeline::materialize_all`] to have filled the cache.
    pub fn retag(&mut self, axes: AxisOrder) -> Result<(), LabelportError> {
        let cache = self.cache.as_deref().ok_or(LabelportError::PipelineNotReady {
            stage: StageKind::Cache.name(),
        })?;
        let retag = self.retag.as_deref_mut().ok_or(LabelportError::PipelineNotReady {
            stage: StageKind::Retag.name(),
        })?;
        retag.connect(cache)?;
        retag.set_axis_order(axes)?;
        log::debug!("source retagged as '{}'", retag.output()?.1);
        Ok(())
    }

    /// The current axis interpretation of the cached source.
    pub fn retagged_axis_order(&self) -> Result<AxisOrder, LabelportError> {
        let retag = self.retag.as_deref().ok_or(LabelportError::PipelineNotReady {
            stage: StageKind::Retag.name(),
        })?;
        Ok(retag.output()?.1.clone())
    }

    /// Points the reorder stage at `target` and returns the resulting shape.
    ///
    /// Requires [`VolumePipeline::retag`].
    pub fn reorder_to(&mut self, target: &AxisOrder) -> Result<Vec<usize>, LabelportError> {
        let retag = self.retag.as_deref().ok_or(LabelportError::PipelineNotReady {
            stage: StageKind::Retag.name(),
        })?;
        retag.ensure_ready()?;
        let reorder = self
            .reorder
            .as_deref_mut()
            .ok_or(LabelportError::PipelineNotReady {
                stage: StageKind::Reorder.name(),
            })?;
        reorder.connect(retag)?;
        reorder.set_axis_order(target.clone())
    }

    /// Computes the whole source permuted into `target`.
    pub fn materialize_reordered(
        &mut self,
        target: &AxisOrder,
    ) -> Result<LabelArray, LabelportError> {
        let shape = self.reorder_to(target)?;
        let reorder = self
            .reorder
            .as_deref()
            .ok_or(LabelportError::PipelineNotReady {
                stage: StageKind::Reorder.name(),
            })?;
        reorder.compute(&Roi::from_shape(&shape))
    }

    /// Releases every stage now rather than at drop.
    pub fn close(mut self) {
        self.teardown();
    }

    fn read_stage(&self) -> Result<&ReadStage, LabelportError> {
        self.read.as_deref().ok_or(LabelportError::PipelineNotReady {
            stage: StageKind::Read.name(),
        })
    }

    fn read_and_cache(&mut self) -> Result<(&mut ReadStage, &mut CacheStage), LabelportError> {
        match (self.read.as_deref_mut(), self.cache.as_deref_mut()) {
            (Some(read), Some(cache)) => Ok((read, cache)),
            (None, _) => Err(LabelportError::PipelineNotReady {
                stage: StageKind::Read.name(),
            }),
            (_, None) => Err(LabelportError::PipelineNotReady {
                stage: StageKind::Cache.name(),
            }),
        }
    }

    /// Releases stages in reverse construction order.
    fn teardown(&mut self) {
        drop(self.reorder.take());
        drop(self.retag.take());
        drop(self.cache.take());
        drop(self.read.take());
    }
}

impl Drop for VolumePipeline {
    fn drop(&mut self) {
        self.teardown();
    }
}

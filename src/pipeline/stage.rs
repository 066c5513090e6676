//! Pipeline stages and the graph that tracks which of them are alive.
//!
//! Every stage is acquired through a [`StageGuard`], which registers it with a
//! [`StageGraph`] and releases it when dropped. Whatever path a caller takes
//! out of an import, `StageGraph::live` is empty once the guards are gone.

use std::cell::RefCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use ndarray::{ArrayViewD, Axis as NdAxis};

use crate::error::LabelportError;
use crate::reader::{ReaderRegistry, SourceFiles};
use crate::volume::{AxisOrder, LabelArray, Roi};

/// The fixed set of stages an import pipeline is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Read,
    Cache,
    Retag,
    Reorder,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Read => "read",
            StageKind::Cache => "cache",
            StageKind::Retag => "retag",
            StageKind::Reorder => "reorder",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Default)]
struct GraphState {
    next_id: u64,
    live: Vec<(u64, StageKind)>,
    released: Vec<StageKind>,
}

/// Book-keeping shared by all stages of one or more pipelines.
///
/// Cloning yields another handle to the same graph.
#[derive(Clone, Debug, Default)]
pub struct StageGraph {
    state: Rc<RefCell<GraphState>>,
}

impl StageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self, kind: StageKind) -> u64 {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.live.push((id, kind));
        log::debug!("acquired {} stage #{}", kind, id);
        id
    }

    fn release(&self, id: u64) {
        let mut state = self.state.borrow_mut();
        if let Some(pos) = state.live.iter().position(|(live_id, _)| *live_id == id) {
            let (_, kind) = state.live.remove(pos);
            state.released.push(kind);
            log::debug!("released {} stage #{}", kind, id);
        }
    }

    /// Stages that are currently alive, in acquisition order.
    pub fn live(&self) -> Vec<StageKind> {
        self.state.borrow().live.iter().map(|(_, k)| *k).collect()
    }

    /// Every stage released so far, in release order.
    pub fn released(&self) -> Vec<StageKind> {
        self.state.borrow().released.clone()
    }
}

/// Lifecycle shared by every stage.
pub trait Stage {
    /// Which stage this is.
    const KIND: StageKind;

    /// True once the stage can serve requests.
    fn ready(&self) -> bool;

    /// Drop upstream connections and any held data.
    fn clean_up(&mut self);

    /// Fails with `PipelineNotReady` unless [`Stage::ready`].
    fn ensure_ready(&self) -> Result<(), LabelportError> {
        if self.ready() {
            Ok(())
        } else {
            Err(LabelportError::PipelineNotReady {
                stage: Self::KIND.name(),
            })
        }
    }
}

/// Scoped ownership of one stage registered with a [`StageGraph`].
pub struct StageGuard<S: Stage> {
    stage: S,
    graph: StageGraph,
    id: u64,
}

impl<S: Stage> StageGuard<S> {
    pub fn acquire(graph: &StageGraph, stage: S) -> Self {
        let id = graph.acquire(S::KIND);
        Self {
            stage,
            graph: graph.clone(),
            id,
        }
    }
}

impl<S: Stage> Deref for StageGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.stage
    }
}

impl<S: Stage> DerefMut for StageGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.stage
    }
}

impl<S: Stage> Drop for StageGuard<S> {
    fn drop(&mut self) {
        self.stage.clean_up();
        self.graph.release(self.id);
    }
}

/// Opens one file or a virtual stack of files.
#[derive(Default)]
pub struct ReadStage {
    source: Option<SourceFiles>,
}

impl ReadStage {
    pub fn open(
        &mut self,
        registry: &ReaderRegistry,
        paths: &[PathBuf],
        working_directory: Option<&Path>,
    ) -> Result<(), LabelportError> {
        self.source = Some(registry.open(paths, working_directory)?);
        Ok(())
    }

    pub fn source(&self) -> Result<&SourceFiles, LabelportError> {
        self.ensure_ready()?;
        self.source.as_ref().ok_or(LabelportError::PipelineNotReady {
            stage: Self::KIND.name(),
        })
    }

    pub fn compute(&self, roi: &Roi) -> Result<LabelArray, LabelportError> {
        self.source()?.read_region(roi)
    }
}

impl Stage for ReadStage {
    const KIND: StageKind = StageKind::Read;

    fn ready(&self) -> bool {
        self.source.is_some()
    }

    fn clean_up(&mut self) {
        self.source = None;
    }
}

/// Holds the whole upstream volume in memory.
///
/// The block shape is always the full upstream shape; downstream statistics
/// need every element, so partial caching is never useful here.
#[derive(Default)]
pub struct CacheStage {
    block_shape: Option<Vec<usize>>,
    data: Option<Arc<LabelArray>>,
}

impl CacheStage {
    pub fn connect(&mut self, upstream: &ReadStage) -> Result<(), LabelportError> {
        self.block_shape = Some(upstream.source()?.shape().to_vec());
        self.data = None;
        Ok(())
    }

    /// Materializes the whole upstream volume unless already cached.
    pub fn fill(&mut self, upstream: &ReadStage) -> Result<(), LabelportError> {
        if self.data.is_some() {
            return Ok(());
        }
        let block_shape = self.block_shape.as_ref().ok_or(LabelportError::PipelineNotReady {
            stage: Self::KIND.name(),
        })?;
        let data = upstream.compute(&Roi::from_shape(block_shape))?;
        log::debug!("cached volume of shape {:?}", data.shape());
        self.data = Some(Arc::new(data));
        Ok(())
    }

    pub fn output(&self) -> Result<&Arc<LabelArray>, LabelportError> {
        self.ensure_ready()?;
        self.data.as_ref().ok_or(LabelportError::PipelineNotReady {
            stage: Self::KIND.name(),
        })
    }
}

impl Stage for CacheStage {
    const KIND: StageKind = StageKind::Cache;

    fn ready(&self) -> bool {
        self.data.is_some()
    }

    fn clean_up(&mut self) {
        self.data = None;
        self.block_shape = None;
    }
}

/// Reinterprets the cached array under a different axis order, without
/// copying data.
#[derive(Default)]
pub struct RetagStage {
    data: Option<Arc<LabelArray>>,
    axes: Option<AxisOrder>,
}

impl RetagStage {
    pub fn connect(&mut self, upstream: &CacheStage) -> Result<(), LabelportError> {
        self.data = Some(Arc::clone(upstream.output()?));
        Ok(())
    }

    pub fn set_axis_order(&mut self, axes: AxisOrder) -> Result<(), LabelportError> {
        let data = self.data.as_ref().ok_or(LabelportError::PipelineNotReady {
            stage: Self::KIND.name(),
        })?;
        axes.check_rank(data.shape())?;
        self.axes = Some(axes);
        Ok(())
    }

    pub fn output(&self) -> Result<(&Arc<LabelArray>, &AxisOrder), LabelportError> {
        match (&self.data, &self.axes) {
            (Some(data), Some(axes)) => Ok((data, axes)),
            _ => Err(LabelportError::PipelineNotReady {
                stage: Self::KIND.name(),
            }),
        }
    }
}

impl Stage for RetagStage {
    const KIND: StageKind = StageKind::Retag;

    fn ready(&self) -> bool {
        self.data.is_some() && self.axes.is_some()
    }

    fn clean_up(&mut self) {
        self.data = None;
        self.axes = None;
    }
}

/// Presents the retagged array permuted into a target axis order.
#[derive(Default)]
pub struct ReorderStage {
    data: Option<Arc<LabelArray>>,
    source_axes: Option<AxisOrder>,
    target: Option<AxisOrder>,
}

impl ReorderStage {
    pub fn connect(&mut self, upstream: &RetagStage) -> Result<(), LabelportError> {
        let (data, axes) = upstream.output()?;
        self.data = Some(Arc::clone(data));
        self.source_axes = Some(axes.clone());
        Ok(())
    }

    pub fn set_axis_order(&mut self, target: AxisOrder) -> Result<Vec<usize>, LabelportError> {
        let (data, source_axes) = match (&self.data, &self.source_axes) {
            (Some(data), Some(axes)) => (data, axes),
            _ => {
                return Err(LabelportError::PipelineNotReady {
                    stage: Self::KIND.name(),
                })
            }
        };
        let shape = reorder_view(data.view(), source_axes, &target)?
            .shape()
            .to_vec();
        self.target = Some(target);
        Ok(shape)
    }

    pub fn output_shape(&self) -> Result<Vec<usize>, LabelportError> {
        let (data, source_axes, target) = self.parts()?;
        Ok(reorder_view(data.view(), source_axes, target)?
            .shape()
            .to_vec())
    }

    pub fn compute(&self, roi: &Roi) -> Result<LabelArray, LabelportError> {
        let (data, source_axes, target) = self.parts()?;
        let view = reorder_view(data.view(), source_axes, target)?;
        if !roi.fits_within(view.shape()) {
            return Err(LabelportError::out_of_bounds(format!(
                "region {:?}..{:?} exceeds reordered shape {:?}",
                roi.start,
                roi.stop(),
                view.shape()
            )));
        }
        Ok(view.slice(roi.slice_info().as_slice()).to_owned())
    }

    fn parts(&self) -> Result<(&Arc<LabelArray>, &AxisOrder, &AxisOrder), LabelportError> {
        match (&self.data, &self.source_axes, &self.target) {
            (Some(data), Some(source), Some(target)) => Ok((data, source, target)),
            _ => Err(LabelportError::PipelineNotReady {
                stage: Self::KIND.name(),
            }),
        }
    }
}

impl Stage for ReorderStage {
    const KIND: StageKind = StageKind::Reorder;

    fn ready(&self) -> bool {
        self.data.is_some() && self.source_axes.is_some() && self.target.is_some()
    }

    fn clean_up(&mut self) {
        self.data = None;
        self.source_axes = None;
        self.target = None;
    }
}

/// Views `data` (tagged `from`) in the axis order `to`.
///
/// Axes of `to` missing from `from` become singleton axes. Axes of `from`
/// missing from `to` are dropped if they are singletons; otherwise the
/// reorder is impossible and fails with `ShapeMismatch`.
pub fn reorder_view<'a, A>(
    data: ArrayViewD<'a, A>,
    from: &AxisOrder,
    to: &AxisOrder,
) -> Result<ArrayViewD<'a, A>, LabelportError> {
    from.check_rank(data.shape())?;

    let mut view = data;
    let mut axes: Vec<_> = from.axes().to_vec();

    for index in (0..axes.len()).rev() {
        let axis = axes[index];
        if to.contains(axis) {
            continue;
        }
        let extent = view.shape()[index];
        if extent != 1 {
            return Err(LabelportError::ShapeMismatch {
                axis: axis.key(),
                source_extent: extent,
                destination_extent: 1,
            });
        }
        view = view.index_axis_move(NdAxis(index), 0);
        axes.remove(index);
    }

    for axis in to.axes() {
        if !axes.contains(axis) {
            view = view.insert_axis(NdAxis(axes.len()));
            axes.push(*axis);
        }
    }

    let permutation: Vec<usize> = to
        .axes()
        .iter()
        .filter_map(|axis| axes.iter().position(|a| a == axis))
        .collect();
    Ok(view.permuted_axes(permutation))
}

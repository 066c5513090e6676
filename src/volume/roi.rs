//! Regions of interest: a start vector and a shape.

use ndarray::{Slice, SliceInfoElem};

/// A bounded sub-region of an array's coordinate space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roi {
    /// Inclusive start coordinate per axis.
    pub start: Vec<usize>,
    /// Extent per axis.
    pub shape: Vec<usize>,
}

impl Roi {
    /// The region covering a whole array of `shape`.
    pub fn from_shape(shape: &[usize]) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape: shape.to_vec(),
        }
    }

    /// Moves the region by `offset`. Missing offset components count as 0.
    pub fn offset_by(mut self, offset: &[usize]) -> Self {
        for (start, delta) in self.start.iter_mut().zip(offset) {
            *start += delta;
        }
        self
    }

    /// Rank of the region.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Exclusive stop coordinate per axis.
    pub fn stop(&self) -> Vec<usize> {
        self.start
            .iter()
            .zip(&self.shape)
            .map(|(s, n)| s + n)
            .collect()
    }

    /// Total number of elements covered.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// True if the region covers no element.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the region lies entirely inside an array of `shape`.
    pub fn fits_within(&self, shape: &[usize]) -> bool {
        self.rank() == shape.len()
            && self
                .start
                .iter()
                .zip(&self.shape)
                .zip(shape)
                .all(|((s, n), extent)| s.checked_add(*n).is_some_and(|stop| stop <= *extent))
    }

    /// Slice descriptors suitable for `ArrayBase::slice_each_axis` style use.
    pub fn slices(&self) -> Vec<Slice> {
        self.start
            .iter()
            .zip(&self.shape)
            .map(|(&s, &n)| Slice::from(s..s + n))
            .collect()
    }

    /// Slice info elements for `ArrayBase::slice` on dynamic-rank arrays.
    pub fn slice_info(&self) -> Vec<SliceInfoElem> {
        self.slices().into_iter().map(SliceInfoElem::from).collect()
    }
}

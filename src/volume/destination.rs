//! Writable annotation stores that receive imported label sub-volumes.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use ndarray::{ArrayD, ArrayViewD};
use ndarray_npy::WriteNpyExt;

use super::{AxisOrder, Label, Roi};
use crate::error::LabelportError;

/// The annotation volume being edited.
///
/// Implementations own their locking discipline; callers perform a single
/// bounded write per import.
pub trait DestinationVolume {
    /// Shape of the whole volume.
    fn shape(&self) -> &[usize];

    /// Axis interpretation of [`DestinationVolume::shape`].
    fn axis_order(&self) -> &AxisOrder;

    /// Writes `data` into `roi`. `data` must have the shape of `roi`.
    fn write(&mut self, roi: &Roi, data: ArrayViewD<'_, Label>) -> Result<(), LabelportError>;
}

/// A destination volume held entirely in memory.
#[derive(Clone, Debug, PartialEq)]
pub struct InMemoryVolume {
    data: ArrayD<Label>,
    axes: AxisOrder,
}

impl InMemoryVolume {
    /// Wraps `data`, checking that `axes` matches its rank.
    pub fn new(data: ArrayD<Label>, axes: AxisOrder) -> Result<Self, LabelportError> {
        axes.check_rank(data.shape())?;
        Ok(Self { data, axes })
    }

    /// A zero-filled volume.
    pub fn zeros(shape: &[usize], axes: AxisOrder) -> Result<Self, LabelportError> {
        Self::new(ArrayD::zeros(shape), axes)
    }

    /// Read access to the stored labels.
    pub fn data(&self) -> &ArrayD<Label> {
        &self.data
    }

    /// Consumes the volume, returning its labels.
    pub fn into_data(self) -> ArrayD<Label> {
        self.data
    }

    /// Saves the labels as a `.npy` file of unsigned 64-bit integers.
    pub fn save_npy(&self, path: &Path) -> Result<(), LabelportError> {
        let file = File::create(path)?;
        self.data
            .write_npy(BufWriter::new(file))
            .map_err(|e| LabelportError::NpyWrite {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }
}

impl DestinationVolume for InMemoryVolume {
    fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    fn axis_order(&self) -> &AxisOrder {
        &self.axes
    }

    fn write(&mut self, roi: &Roi, data: ArrayViewD<'_, Label>) -> Result<(), LabelportError> {
        if !roi.fits_within(self.data.shape()) {
            return Err(LabelportError::out_of_bounds(format!(
                "region {:?}..{:?} exceeds destination shape {:?}",
                roi.start,
                roi.stop(),
                self.data.shape()
            )));
        }
        if data.shape() != roi.shape.as_slice() {
            return Err(LabelportError::out_of_bounds(format!(
                "data shape {:?} does not match region shape {:?}",
                data.shape(),
                roi.shape
            )));
        }

        let info = roi.slice_info();
        self.data.slice_mut(info.as_slice()).assign(&data);
        log::debug!(
            "wrote {} label(s) into region {:?}..{:?}",
            roi.len(),
            roi.start,
            roi.stop()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn volume(shape: &[usize], axes: &str) -> InMemoryVolume {
        InMemoryVolume::zeros(shape, axes.parse().unwrap()).unwrap()
    }

    #[test]
    fn test_rank_must_match_axes() {
        let err = InMemoryVolume::zeros(&[2, 2], "zyx".parse().unwrap()).unwrap_err();
        assert!(matches!(err, LabelportError::InvalidAxisOrder(_)));
    }

    #[test]
    fn test_write_region() {
        let mut vol = volume(&[4, 3], "yx");
        let patch = ArrayD::from_elem(IxDyn(&[2, 3]), 7u64);
        let roi = Roi::from_shape(&[2, 3]).offset_by(&[1, 0]);

        vol.write(&roi, patch.view()).unwrap();

        assert_eq!(vol.data()[[0, 0]], 0);
        assert_eq!(vol.data()[[1, 2]], 7);
        assert_eq!(vol.data()[[2, 0]], 7);
        assert_eq!(vol.data()[[3, 1]], 0);
    }

    #[test]
    fn test_write_out_of_bounds_leaves_volume_untouched() {
        let mut vol = volume(&[4, 3], "yx");
        let patch = ArrayD::from_elem(IxDyn(&[2, 3]), 7u64);
        let roi = Roi::from_shape(&[2, 3]).offset_by(&[3, 0]);

        let err = vol.write(&roi, patch.view()).unwrap_err();
        assert!(matches!(err, LabelportError::WriteOutOfBounds { .. }));
        assert!(vol.data().iter().all(|&v| v == 0));
    }
}

//! Insertion offsets and shape compatibility between source and destination.
//!
//! Both functions work on shapes that already share one axis order: the
//! source after it has been reordered into the destination's axes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LabelportError;
use crate::volume::{Axis, AxisOrder};

/// Where the source origin lands inside the destination, per axis.
///
/// The channel component is always 0. Deserializing rejects a value count
/// that differs from the number of axes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOffset")]
pub struct InsertionOffset {
    pub axes: AxisOrder,
    pub values: Vec<usize>,
}

#[derive(Deserialize)]
struct RawOffset {
    axes: AxisOrder,
    values: Vec<usize>,
}

impl TryFrom<RawOffset> for InsertionOffset {
    type Error = String;

    fn try_from(raw: RawOffset) -> Result<Self, Self::Error> {
        if raw.values.len() != raw.axes.len() {
            return Err(format!(
                "offset has {} value(s) for the {} axes of '{}'",
                raw.values.len(),
                raw.axes.len(),
                raw.axes
            ));
        }
        Ok(Self {
            axes: raw.axes,
            values: raw.values,
        })
    }
}

impl InsertionOffset {
    /// The all-zero offset.
    pub fn zeros(axes: &AxisOrder) -> Self {
        Self {
            axes: axes.clone(),
            values: vec![0; axes.len()],
        }
    }

    /// Offset along `axis` (0 if the axis is absent).
    pub fn get(&self, axis: Axis) -> usize {
        self.axes
            .index_of(axis)
            .and_then(|i| self.values.get(i).copied())
            .unwrap_or(0)
    }

    /// Sets the offset along `axis`.
    pub fn set(&mut self, axis: Axis, value: usize) -> Result<(), LabelportError> {
        let index = self.axes.index_of(axis).ok_or_else(|| {
            LabelportError::InvalidAxisOrder(format!(
                "cannot offset axis '{}': not part of '{}'",
                axis, self.axes
            ))
        })?;
        let len = self.values.len();
        let slot = self.values.get_mut(index).ok_or_else(|| {
            LabelportError::InvalidAxisOrder(format!(
                "offset for '{}' holds only {} value(s)",
                self.axes,
                len
            ))
        })?;
        *slot = value;
        Ok(())
    }
}

/// Per-axis room for moving the source: `destination - source`, floored at 0.
pub fn axis_ranges(source_shape: &[usize], destination_shape: &[usize]) -> Vec<usize> {
    source_shape
        .iter()
        .zip(destination_shape)
        .map(|(s, d)| d.saturating_sub(*s))
        .collect()
}

/// The number in a slice file name: its first run of ASCII digits.
///
/// Only the base name is searched. Numbers too large for `u64` saturate.
pub fn filename_index(file_name: &str) -> Option<u64> {
    let base = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());

    let start = base.find(|c: char| c.is_ascii_digit())?;
    let digits: String = base[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    Some(digits.parse::<u64>().unwrap_or(u64::MAX))
}

/// The axis a numbered file sequence runs along.
///
/// `z` if the source can move along it, otherwise `t` if it can, otherwise
/// whichever of `z`/`t` exists.
pub fn sequence_axis(axes: &AxisOrder, ranges: &[usize]) -> Option<Axis> {
    let movable = |axis: Axis| {
        axes.index_of(axis)
            .and_then(|i| ranges.get(i))
            .is_some_and(|r| *r > 0)
    };
    [Axis::Z, Axis::T]
        .into_iter()
        .find(|a| movable(*a))
        .or_else(|| [Axis::Z, Axis::T].into_iter().find(|a| axes.contains(*a)))
}

/// Default insertion offset.
///
/// Every axis starts at 0, except that a number found in the first source
/// file name places the source along the sequence axis, clamped so the
/// source still fits.
pub fn default_offset(
    axes: &AxisOrder,
    source_shape: &[usize],
    destination_shape: &[usize],
    file_names: Option<&[String]>,
) -> InsertionOffset {
    let mut offset = InsertionOffset::zeros(axes);
    let ranges = axis_ranges(source_shape, destination_shape);

    let index = file_names
        .and_then(|names| names.first())
        .and_then(|name| filename_index(name));

    if let (Some(index), Some(axis)) = (index, sequence_axis(axes, &ranges)) {
        if let Some(i) = axes.index_of(axis) {
            let range = ranges.get(i).copied().unwrap_or(0);
            let clamped = index.min(range as u64) as usize;
            offset.values[i] = clamped;
            log::debug!(
                "file name index {} places source at {}={}",
                index,
                axis,
                clamped
            );
        }
    }

    offset
}

/// Checks that a reordered source fits the destination.
///
/// In order, first failure wins:
/// 1. every extent other than `x`/`y` is at most the destination extent
///    (`ShapeTooLarge`);
/// 2. the `x` and `y` extents are equal (`ShapeMismatch`), so an `x`/`y`
///    extent larger than the destination's is a mismatch too.
pub fn validate(
    axes: &AxisOrder,
    source_shape: &[usize],
    destination_shape: &[usize],
) -> Result<(), LabelportError> {
    axes.check_rank(source_shape)?;
    axes.check_rank(destination_shape)?;

    if axes
        .tagged(source_shape)
        .zip(destination_shape)
        .any(|((axis, s), d)| !is_plane_axis(axis) && s > *d)
    {
        return Err(LabelportError::ShapeTooLarge {
            source_shape: source_shape.to_vec(),
            destination_shape: destination_shape.to_vec(),
        });
    }

    for axis in [Axis::X, Axis::Y] {
        if let Some(i) = axes.index_of(axis) {
            if source_shape[i] != destination_shape[i] {
                return Err(LabelportError::ShapeMismatch {
                    axis: axis.key(),
                    source_extent: source_shape[i],
                    destination_extent: destination_shape[i],
                });
            }
        }
    }

    Ok(())
}

/// `x` and `y` must match the destination exactly.
pub fn is_plane_axis(axis: Axis) -> bool {
    matches!(axis, Axis::X | Axis::Y)
}

//! Axis keys and axis orders.
//!
//! Every volume carries exactly one [`AxisOrder`] whose length equals the
//! rank of its shape. Axis orders are written as compact key strings such as
//! `"txyzc"`, which is also their serialized form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LabelportError;

/// A single axis key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Axis {
    /// Time.
    T,
    /// Horizontal image axis.
    X,
    /// Vertical image axis.
    Y,
    /// Depth / slice axis.
    Z,
    /// Channel.
    C,
}

impl Axis {
    /// All axis keys in canonical order.
    pub const ALL: [Axis; 5] = [Axis::T, Axis::X, Axis::Y, Axis::Z, Axis::C];

    /// The single-character key for this axis.
    pub fn key(&self) -> char {
        match self {
            Axis::T => 't',
            Axis::X => 'x',
            Axis::Y => 'y',
            Axis::Z => 'z',
            Axis::C => 'c',
        }
    }

    /// Parses an axis key (case-insensitive).
    pub fn from_key(key: char) -> Option<Axis> {
        match key.to_ascii_lowercase() {
            't' => Some(Axis::T),
            'x' => Some(Axis::X),
            'y' => Some(Axis::Y),
            'z' => Some(Axis::Z),
            'c' => Some(Axis::C),
            _ => None,
        }
    }

    /// True for x, y and z.
    pub fn is_spatial(&self) -> bool {
        matches!(self, Axis::X | Axis::Y | Axis::Z)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// An ordered sequence of distinct axis keys.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AxisOrder(Vec<Axis>);

impl AxisOrder {
    /// Builds an axis order, rejecting repeated axes.
    pub fn new(axes: Vec<Axis>) -> Result<Self, LabelportError> {
        for (i, axis) in axes.iter().enumerate() {
            if axes[..i].contains(axis) {
                return Err(LabelportError::InvalidAxisOrder(format!(
                    "axis '{}' appears more than once",
                    axis
                )));
            }
        }
        Ok(Self(axes))
    }

    /// The default interpretation of an untagged array of the given rank.
    pub fn default_for_rank(rank: usize) -> Result<Self, LabelportError> {
        let keys = match rank {
            1 => "x",
            2 => "yx",
            3 => "zyx",
            4 => "zyxc",
            5 => "tzyxc",
            _ => {
                return Err(LabelportError::InvalidAxisOrder(format!(
                    "no default axis order for rank {}",
                    rank
                )))
            }
        };
        keys.parse()
    }

    /// Number of axes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no axes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The axes in order.
    pub fn axes(&self) -> &[Axis] {
        &self.0
    }

    /// Position of `axis`, if present.
    pub fn index_of(&self, axis: Axis) -> Option<usize> {
        self.0.iter().position(|a| *a == axis)
    }

    /// True if `axis` is part of this order.
    pub fn contains(&self, axis: Axis) -> bool {
        self.0.contains(&axis)
    }

    /// Pairs each axis with the matching extent of `shape`.
    pub fn tagged<'a>(&'a self, shape: &'a [usize]) -> impl Iterator<Item = (Axis, usize)> + 'a {
        self.0.iter().copied().zip(shape.iter().copied())
    }

    /// Extent of `axis` in `shape`, if the axis is present.
    pub fn extent(&self, shape: &[usize], axis: Axis) -> Option<usize> {
        self.index_of(axis).and_then(|i| shape.get(i).copied())
    }

    /// Checks that `shape` has one extent per axis.
    pub fn check_rank(&self, shape: &[usize]) -> Result<(), LabelportError> {
        if shape.len() != self.len() {
            return Err(LabelportError::InvalidAxisOrder(format!(
                "axis order '{}' has {} axes but the shape {:?} has rank {}",
                self,
                self.len(),
                shape,
                shape.len()
            )));
        }
        Ok(())
    }
}

impl FromStr for AxisOrder {
    type Err = LabelportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let axes = s
            .trim()
            .chars()
            .map(|key| {
                Axis::from_key(key).ok_or_else(|| {
                    LabelportError::InvalidAxisOrder(format!(
                        "unknown axis key '{}' in '{}' (expected t, x, y, z or c)",
                        key, s
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if axes.is_empty() {
            return Err(LabelportError::InvalidAxisOrder(
                "axis order is empty".to_string(),
            ));
        }
        Self::new(axes)
    }
}

impl fmt::Display for AxisOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in &self.0 {
            write!(f, "{}", axis.key())?;
        }
        Ok(())
    }
}

impl fmt::Debug for AxisOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AxisOrder({})", self)
    }
}

impl Serialize for AxisOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AxisOrder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let keys = String::deserialize(deserializer)?;
        keys.parse().map_err(serde::de::Error::custom)
    }
}

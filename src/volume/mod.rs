//! Volume model shared by the import pipeline.
//!
//! Label volumes are dynamic-rank `ndarray` arrays of [`Label`] values, each
//! interpreted through an [`AxisOrder`]. Regions are addressed with [`Roi`].

mod axes;
mod destination;
mod histogram;
mod roi;

pub use axes::{Axis, AxisOrder};
pub use destination::{DestinationVolume, InMemoryVolume};
pub use histogram::{LabelCount, LabelHistogram};
pub use roi::Roi;

use ndarray::ArrayD;

/// An integer label identity. Values may range into the billions.
pub type Label = u64;

/// A dynamic-rank array of labels.
pub type LabelArray = ArrayD<Label>;

/// The conventional background / unlabeled value.
pub const BACKGROUND: Label = 0;

//! Import planning: geometry defaults, label remapping and the plan itself.
//!
//! An [`ImportPlan`] is the resolved target axis order, insertion offset and
//! label mapping for one import. Plans serialize to JSON so a caller can
//! inspect the computed defaults, edit them and feed them back:
//!
//! ```json
//! {
//!   "source_axes": "tyx",
//!   "target_axes": "txyzc",
//!   "offset": { "axes": "txyzc", "values": [3, 0, 0, 0, 0] },
//!   "label_capacity": 2,
//!   "mapping": { "0": 0, "1": 1, "2": 2 }
//! }
//! ```

pub mod geometry;
mod mapping;
mod relabel;

pub use geometry::InsertionOffset;
pub use mapping::{CapacityPolicy, LabelMapping, MappingOverride, NormalizedMapping};
pub use relabel::Relabeler;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LabelportError;
use crate::volume::{Axis, AxisOrder, Label};

/// Everything needed to commit one source into a destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPlan {
    /// How the cached source's axes are interpreted.
    pub source_axes: AxisOrder,
    /// Axis order the source is reordered into; the destination's.
    pub target_axes: AxisOrder,
    pub offset: InsertionOffset,
    /// Largest destination label id.
    pub label_capacity: Label,
    pub mapping: LabelMapping,
}

impl ImportPlan {
    /// Applies caller offset overrides on top of the current offset.
    pub fn apply_offset_overrides(
        &mut self,
        overrides: &[OffsetOverride],
    ) -> Result<(), LabelportError> {
        for change in overrides {
            self.offset.set(change.axis, change.value)?;
            log::debug!("offset override {}={}", change.axis, change.value);
        }
        Ok(())
    }

    /// Applies caller mapping overrides on top of the current mapping.
    ///
    /// Labels without an entry in the mapping are rejected.
    pub fn apply_mapping_overrides(
        &mut self,
        overrides: &[MappingOverride],
    ) -> Result<(), LabelportError> {
        for change in overrides {
            if self.mapping.entry(change.label).is_none() {
                return Err(LabelportError::UnknownLabel(change.label));
            }
            self.mapping.apply_override(change, self.label_capacity);
            log::debug!(
                "mapping override {} -> {}",
                change.label,
                self.mapping.get(change.label)
            );
        }
        Ok(())
    }
}

/// One caller change to the default offset. Parses from `AXIS=VALUE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffsetOverride {
    pub axis: Axis,
    pub value: usize,
}

impl FromStr for OffsetOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected AXIS=VALUE, got '{}'", s))?;
        let mut chars = key.trim().chars();
        let axis = match (chars.next(), chars.next()) {
            (Some(c), None) => Axis::from_key(c),
            _ => None,
        }
        .ok_or_else(|| format!("unknown axis '{}' (expected one of t, x, y, z, c)", key.trim()))?;
        let value = value
            .trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid offset '{}': {}", value.trim(), e))?;
        Ok(Self { axis, value })
    }
}

/// Reads an import plan from a JSON file.
pub fn read_plan_json(path: &Path) -> Result<ImportPlan, LabelportError> {
    let file = File::open(path).map_err(LabelportError::Io)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| LabelportError::PlanJsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes an import plan to a JSON file.
pub fn write_plan_json(path: &Path, plan: &ImportPlan) -> Result<(), LabelportError> {
    let file = File::create(path).map_err(LabelportError::Io)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, plan).map_err(|source| LabelportError::PlanJsonWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads an import plan from a JSON string.
pub fn from_json_str(json: &str) -> Result<ImportPlan, serde_json::Error> {
    serde_json::from_str(json)
}

/// Reads an import plan from JSON bytes.
pub fn from_json_slice(bytes: &[u8]) -> Result<ImportPlan, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Writes an import plan to a JSON string.
pub fn to_json_string(plan: &ImportPlan) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(plan)
}

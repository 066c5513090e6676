use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationReport;

/// The main error type for labelport operations.
#[derive(Debug, Error)]
pub enum LabelportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read source volume {path}: {message}")]
    SourceRead { path: PathBuf, message: String },

    #[error("Pipeline stage '{stage}' was queried before it was ready")]
    PipelineNotReady { stage: &'static str },

    #[error("Import shape {source_shape:?} is not a subset of the destination shape {destination_shape:?}")]
    ShapeTooLarge {
        source_shape: Vec<usize>,
        destination_shape: Vec<usize>,
    },

    #[error("Extent of axis '{axis}' must match the destination: source has {source_extent}, destination has {destination_extent}")]
    ShapeMismatch {
        axis: char,
        source_extent: usize,
        destination_extent: usize,
    },

    #[error("Write out of bounds: {message}")]
    WriteOutOfBounds { message: String },

    #[error("Invalid axis order: {0}")]
    InvalidAxisOrder(String),

    #[error("{distinct} distinct nonzero label(s) do not fit into {capacity} destination label(s)")]
    LabelCapacityExceeded { distinct: usize, capacity: u64 },

    #[error("Label {0} is not present in the source histogram")]
    UnknownLabel(u64),

    #[error("Failed to parse import plan from {path}: {source}")]
    PlanJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write import plan to {path}: {source}")]
    PlanJsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write volume to {path}: {message}")]
    NpyWrite { path: PathBuf, message: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Import plan rejected with {error_count} error(s) and {warning_count} warning(s)")]
    PlanRejected {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },
}

impl LabelportError {
    /// Create a source read error for a path.
    pub fn source_read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SourceRead {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a write-out-of-bounds error with a message.
    pub fn out_of_bounds(message: impl Into<String>) -> Self {
        Self::WriteOutOfBounds {
            message: message.into(),
        }
    }
}

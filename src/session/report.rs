//! Inspect report: everything an import would do, before it does it.

use std::fmt;

use serde::Serialize;

use crate::plan::ImportPlan;
use crate::validation::ValidationReport;
use crate::volume::{AxisOrder, LabelHistogram, BACKGROUND};

/// Source facts, computed defaults and the plan check for one import.
#[derive(Clone, Debug, Serialize)]
pub struct InspectReport {
    /// Base names of the source files, in stack order.
    pub files: Vec<String>,
    pub source_shape: Vec<usize>,
    pub source_axes: AxisOrder,
    /// Source shape after reordering into the destination axes.
    pub reordered_shape: Vec<usize>,
    pub destination_shape: Vec<usize>,
    pub destination_axes: AxisOrder,
    pub histogram: LabelHistogram,
    pub plan: ImportPlan,
    pub validation: ValidationReport,
    /// Width of histogram bars (in characters).
    #[serde(skip)]
    pub(crate) bar_width: usize,
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        self.fmt_source(f)?;
        writeln!(f)?;
        self.fmt_labels(f)?;
        writeln!(f)?;
        self.fmt_plan(f)?;
        writeln!(f)?;
        write!(f, "{}", self.validation)
    }
}

impl InspectReport {
    fn fmt_source(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "┌─ Source ──────────────────────────────────────────────────")?;
        match self.files.as_slice() {
            [] => {}
            [only] => writeln!(f, "│   File:          {}", only)?,
            [first, .., last] => writeln!(
                f,
                "│   Files:         {} ({} .. {})",
                self.files.len(),
                first,
                last
            )?,
        }
        writeln!(
            f,
            "│   Shape:         {:?} ({})",
            self.source_shape, self.source_axes
        )?;
        writeln!(
            f,
            "│   Reordered:     {:?} ({})",
            self.reordered_shape, self.destination_axes
        )?;
        writeln!(
            f,
            "│   Destination:   {:?} ({})",
            self.destination_shape, self.destination_axes
        )?;
        writeln!(f, "└───────────────────────────────────────────────────────────")
    }

    fn fmt_labels(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.histogram;
        writeln!(
            f,
            "┌─ Labels ({} distinct, {} nonzero) ─────────────────────────",
            h.len(),
            h.nonzero_len()
        )?;

        let total = h.total();
        let max_count = h.entries().iter().map(|e| e.count).max().unwrap_or(1);
        for entry in h.entries() {
            let pct = if total > 0 {
                entry.count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            let target = self.plan.mapping.get(entry.label);
            let arrow = if target == BACKGROUND && entry.label != BACKGROUND {
                "off".to_string()
            } else {
                target.to_string()
            };
            writeln!(
                f,
                "│   {:>12} -> {:<12} {:>10} {:>5.1}%  {}",
                entry.label,
                arrow,
                entry.count,
                pct,
                render_bar(entry.count, max_count, self.bar_width)
            )?;
        }
        writeln!(f, "└───────────────────────────────────────────────────────────")
    }

    fn fmt_plan(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "┌─ Plan ────────────────────────────────────────────────────")?;
        let offset: Vec<String> = self
            .plan
            .offset
            .axes
            .axes()
            .iter()
            .zip(&self.plan.offset.values)
            .map(|(axis, value)| format!("{}={}", axis, value))
            .collect();
        writeln!(f, "│   Offset:        {}", offset.join(" "))?;
        writeln!(f, "│   Capacity:      {}", self.plan.label_capacity)?;
        writeln!(
            f,
            "│   Relabel:       {}",
            if self.plan.mapping.is_identity_over(&self.histogram.labels()) {
                "no (identity)"
            } else {
                "yes"
            }
        )?;
        writeln!(f, "└───────────────────────────────────────────────────────────")
    }
}

fn render_bar(count: u64, max_count: u64, width: usize) -> String {
    if max_count == 0 || width == 0 {
        return String::new();
    }
    let filled = ((count as f64 / max_count as f64) * width as f64).round() as usize;
    "█".repeat(filled.clamp(usize::from(count > 0), width))
}

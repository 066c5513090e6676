//! Import plan validation.
//!
//! Checks a resolved [`ImportPlan`] against the source it came from and the
//! destination it targets:
//! - Axis orders agree (plan, offset, destination)
//! - Geometry fits (extents, `x`/`y` equality, offset range, channel offset)
//! - The label mapping is well-formed and imports something

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use crate::error::LabelportError;
use crate::plan::geometry::{axis_ranges, is_plane_axis};
use crate::plan::ImportPlan;
use crate::volume::{Axis, AxisOrder, LabelHistogram, BACKGROUND};

/// Options for validation behavior.
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// If true, treat warnings as errors.
    pub strict: bool,
}

/// What a plan is checked against.
#[derive(Clone, Copy, Debug)]
pub struct PlanSubject<'a> {
    /// Source shape after reordering into the plan's target axes.
    pub source_shape: &'a [usize],
    pub destination_shape: &'a [usize],
    pub destination_axes: &'a AxisOrder,
    /// Labels observed in the source.
    pub histogram: &'a LabelHistogram,
}

/// Validates a plan and returns a report of all issues found.
pub fn validate_plan(plan: &ImportPlan, subject: &PlanSubject<'_>) -> ValidationReport {
    let mut report = ValidationReport::new();

    // Geometry checks are meaningless once the axes disagree.
    if validate_axes(plan, subject, &mut report) {
        validate_geometry(plan, subject, &mut report);
    }
    validate_mapping(plan, subject.histogram, &mut report);

    report
}

/// Turns a report into a commit decision.
pub fn ensure_committable(
    report: ValidationReport,
    opts: &ValidateOptions,
) -> Result<(), LabelportError> {
    let passed = if opts.strict {
        report.is_ok_strict()
    } else {
        report.is_ok()
    };
    if passed {
        Ok(())
    } else {
        Err(LabelportError::PlanRejected {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        })
    }
}

/// Returns true if the axis orders and ranks are consistent.
fn validate_axes(plan: &ImportPlan, subject: &PlanSubject<'_>, report: &mut ValidationReport) -> bool {
    let mut consistent = true;
    let mut mismatch = |message: String| {
        report.add(ValidationIssue::error(
            IssueCode::AxisOrderMismatch,
            message,
            IssueContext::Plan,
        ));
        consistent = false;
    };

    if &plan.target_axes != subject.destination_axes {
        mismatch(format!(
            "target axes '{}' differ from destination axes '{}'",
            plan.target_axes, subject.destination_axes
        ));
    }
    if plan.offset.axes != plan.target_axes || plan.offset.values.len() != plan.target_axes.len() {
        mismatch(format!(
            "offset is given for '{}' ({} value(s)) but the target axes are '{}'",
            plan.offset.axes,
            plan.offset.values.len(),
            plan.target_axes
        ));
    }
    if subject.source_shape.len() != plan.target_axes.len() {
        mismatch(format!(
            "reordered source has rank {} but the target axes '{}' have rank {}",
            subject.source_shape.len(),
            plan.target_axes,
            plan.target_axes.len()
        ));
    }
    if subject.destination_shape.len() != subject.destination_axes.len() {
        mismatch(format!(
            "destination shape {:?} does not match its axes '{}'",
            subject.destination_shape, subject.destination_axes
        ));
    }

    consistent
}

fn validate_geometry(plan: &ImportPlan, subject: &PlanSubject<'_>, report: &mut ValidationReport) {
    let source = subject.source_shape;
    let destination = subject.destination_shape;
    let ranges = axis_ranges(source, destination);

    for (i, axis) in plan.target_axes.axes().iter().enumerate() {
        let context = IssueContext::Axis { key: axis.key() };
        let offset = plan.offset.values[i];

        if is_plane_axis(*axis) && source[i] != destination[i] {
            report.add(ValidationIssue::error(
                IssueCode::ShapeMismatch,
                format!(
                    "source extent {} must equal destination extent {}",
                    source[i], destination[i]
                ),
                context.clone(),
            ));
        } else if source[i] > destination[i] {
            report.add(ValidationIssue::error(
                IssueCode::ShapeTooLarge,
                format!(
                    "source extent {} exceeds destination extent {}",
                    source[i], destination[i]
                ),
                context.clone(),
            ));
        } else if offset > ranges[i] {
            report.add(ValidationIssue::error(
                IssueCode::OffsetOutOfRange,
                format!(
                    "offset {} places the source past the edge (allowed 0..={})",
                    offset, ranges[i]
                ),
                context.clone(),
            ));
        }

        if *axis == Axis::C && offset != 0 {
            report.add(ValidationIssue::error(
                IssueCode::ChannelOffsetNonZero,
                format!("channel offset must be 0, got {}", offset),
                context,
            ));
        }
    }
}

fn validate_mapping(plan: &ImportPlan, histogram: &LabelHistogram, report: &mut ValidationReport) {
    let labels = histogram.labels();
    for label in plan.mapping.missing(&labels) {
        report.add(ValidationIssue::error(
            IssueCode::MissingMappingKey,
            "source label has no mapping entry",
            IssueContext::Label { label },
        ));
    }

    for (label, target) in plan.mapping.iter() {
        if !histogram.contains(label) {
            report.add(ValidationIssue::error(
                IssueCode::UnknownMappingKey,
                "label does not occur in the source",
                IssueContext::Label { label },
            ));
        }
        if target > plan.label_capacity {
            report.add(ValidationIssue::error(
                IssueCode::MappingTargetOutOfRange,
                format!(
                    "target {} exceeds the label capacity {}",
                    target, plan.label_capacity
                ),
                IssueContext::Label { label },
            ));
        }
    }

    let collapsed: Vec<_> = labels
        .iter()
        .copied()
        .filter(|l| *l != BACKGROUND && plan.mapping.get(*l) == BACKGROUND)
        .collect();

    if labels.iter().all(|l| plan.mapping.get(*l) == BACKGROUND) {
        report.add(ValidationIssue::error(
            IssueCode::NothingToImport,
            "every source label maps to background",
            IssueContext::Plan,
        ));
    } else if !collapsed.is_empty() {
        let preview: Vec<String> = collapsed.iter().take(8).map(|l| l.to_string()).collect();
        let more = if collapsed.len() > preview.len() { ", ..." } else { "" };
        report.add(ValidationIssue::warning(
            IssueCode::LabelsCollapsedToBackground,
            format!(
                "{} nonzero label(s) map to background: {}{}",
                collapsed.len(),
                preview.join(", "),
                more
            ),
            IssueContext::Plan,
        ));
    }
}

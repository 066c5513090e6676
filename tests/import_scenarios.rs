mod common;

use std::path::PathBuf;

use labelport::pipeline::StageGraph;
use labelport::plan::{self, CapacityPolicy};
use labelport::reader::ReaderRegistry;
use labelport::session::{ImportOptions, ImportSession};
use labelport::validation::IssueCode;
use labelport::volume::{Axis, DestinationVolume, LabelHistogram};
use labelport::LabelportError;
use ndarray::{Axis as NdAxis, Slice};

fn txyzc_options(capacity: u64) -> ImportOptions {
    ImportOptions {
        label_capacity: capacity,
        source_axes: Some("txyzc".parse().expect("valid axes")),
        ..Default::default()
    }
}

fn stripes(shape: &[usize], labels: &[u64]) -> Vec<u64> {
    let len: usize = shape.iter().product();
    (0..len).map(|i| labels[i % labels.len()]).collect()
}

#[test]
fn sequence_number_places_source_along_t() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shape = [5, 100, 100, 1, 1];
    let source = common::write_npy(
        &dir.path().join("slice_003.npy"),
        &shape,
        stripes(&shape, &[0, 1, 2]),
    );
    let mut dest = common::zeros_volume(&[10, 100, 100, 1, 1], "txyzc");
    let graph = StageGraph::new();

    let session = ImportSession::open(
        &graph,
        &ReaderRegistry::new(),
        &[source.clone()],
        &dest,
        txyzc_options(2),
    )
    .expect("open session");
    assert_eq!(session.plan().offset.values, vec![3, 0, 0, 0, 0]);
    assert!(session
        .plan()
        .mapping
        .is_identity_over(&session.histogram().labels()));

    let summary = session.commit(&mut dest).expect("commit");
    assert!(!summary.relabeled);
    assert_eq!(summary.start, vec![3, 0, 0, 0, 0]);
    assert_eq!(summary.stop, vec![8, 100, 100, 1, 1]);
    assert!(graph.live().is_empty());

    let raw = common::read_npy(&source);
    let data = dest.data();
    assert_eq!(data.slice_axis(NdAxis(0), Slice::from(3..8)), raw.view());
    assert!(data.slice_axis(NdAxis(0), Slice::from(0..3)).iter().all(|v| *v == 0));
    assert!(data.slice_axis(NdAxis(0), Slice::from(8..)).iter().all(|v| *v == 0));
}

#[test]
fn huge_labels_compress_into_capacity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut values = vec![0u64; 500];
    values.extend([1u64; 10]);
    values.extend([5u64; 3]);
    values.push(9_000_000_000);
    let source = common::write_npy(&dir.path().join("labels.npy"), &[1, 2, 257], values);
    let mut dest = common::zeros_volume(&[4, 2, 257], "zyx");
    let graph = StageGraph::new();

    let session = ImportSession::open(
        &graph,
        &ReaderRegistry::new(),
        &[source],
        &dest,
        ImportOptions {
            label_capacity: 2,
            ..Default::default()
        },
    )
    .expect("open session");

    let mapping = &session.plan().mapping;
    assert_eq!(mapping.get(0), 0);
    assert_eq!(mapping.get(9_000_000_000), 2);
    assert_eq!(mapping.get(5), 1);
    assert_eq!(mapping.get(1), 0);
    assert_eq!(session.plan().offset.values, vec![0, 0, 0]);

    // Label 1 collapsing onto background is a warning, not an error.
    let report = session.validate(&dest);
    assert!(report.is_ok());
    assert!(report.has(IssueCode::LabelsCollapsedToBackground));

    let summary = session.commit(&mut dest).expect("commit");
    assert!(summary.relabeled);
    let written = LabelHistogram::from_array(dest.data().view());
    assert_eq!(written.labels(), vec![0, 1, 2]);
    assert_eq!(written.count(1), 3);
    assert_eq!(written.count(2), 1);
}

#[test]
fn mismatched_xy_is_rejected_without_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shape = [1, 200, 100, 1, 1];
    let source = common::write_npy(&dir.path().join("a.npy"), &shape, stripes(&shape, &[0, 1]));
    let mut dest = common::zeros_volume(&[10, 100, 100, 1, 1], "txyzc");
    let before = dest.clone();
    let graph = StageGraph::new();

    let session = ImportSession::open(
        &graph,
        &ReaderRegistry::new(),
        &[source],
        &dest,
        txyzc_options(255),
    )
    .expect("open session");
    let err = session.commit(&mut dest).unwrap_err();

    assert!(
        matches!(err, LabelportError::ShapeMismatch { axis: 'x', .. }),
        "unexpected error: {err}"
    );
    assert_eq!(dest, before);
    assert!(graph.live().is_empty());
}

#[test]
fn oversized_source_is_rejected_without_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shape = [20, 100, 100, 1, 1];
    let source = common::write_npy(&dir.path().join("a.npy"), &shape, stripes(&shape, &[0, 1]));
    let mut dest = common::zeros_volume(&[10, 100, 100, 1, 1], "txyzc");
    let before = dest.clone();
    let graph = StageGraph::new();

    let session = ImportSession::open(
        &graph,
        &ReaderRegistry::new(),
        &[source],
        &dest,
        txyzc_options(255),
    )
    .expect("open session");
    let err = session.commit(&mut dest).unwrap_err();

    assert!(matches!(err, LabelportError::ShapeTooLarge { .. }));
    assert_eq!(dest, before);
    assert!(graph.live().is_empty());
}

#[test]
fn failed_open_leaves_no_live_stages() {
    let dest = common::zeros_volume(&[4, 4], "yx");
    let graph = StageGraph::new();

    let result = ImportSession::open(
        &graph,
        &ReaderRegistry::new(),
        &[PathBuf::from("/nonexistent/labels.npy")],
        &dest,
        ImportOptions::default(),
    );

    assert!(matches!(result, Err(LabelportError::SourceRead { .. })));
    assert!(graph.live().is_empty());
}

#[test]
fn dropped_session_releases_stages_in_reverse_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = common::write_npy(&dir.path().join("a.npy"), &[2, 2], vec![0, 1, 1, 0]);
    let dest = common::zeros_volume(&[2, 2], "yx");
    let graph = StageGraph::new();

    let session = ImportSession::open(
        &graph,
        &ReaderRegistry::new(),
        &[source],
        &dest,
        ImportOptions::default(),
    )
    .expect("open session");
    assert_eq!(graph.live().len(), 4);
    drop(session);

    assert!(graph.live().is_empty());
    let kinds: Vec<&str> = graph.released().iter().map(|k| k.name()).collect();
    assert_eq!(kinds, vec!["reorder", "retag", "cache", "read"]);
}

#[test]
fn png_directory_stacks_along_z_and_reorders() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stack = dir.path().join("stack");
    for (i, n) in [5, 6, 7].into_iter().enumerate() {
        common::write_png(&stack.join(format!("slice_{:03}.png", n)), 4, 3, |x, y| {
            if x == y {
                (i + 1) as u16
            } else {
                0
            }
        });
    }
    let mut dest = common::zeros_volume(&[1, 10, 3, 4, 1], "tzyxc");

    let summary = labelport::session::import(
        &[stack],
        &mut dest,
        ImportOptions {
            label_capacity: 255,
            ..Default::default()
        },
    )
    .expect("import");

    assert_eq!(summary.start, vec![0, 5, 0, 0, 0]);
    assert_eq!(summary.stop, vec![1, 8, 3, 4, 1]);
    // Three labels against a capacity of 255 remap to the top ids.
    assert_eq!(dest.data()[[0, 5, 0, 0, 0]], 253);
    assert_eq!(dest.data()[[0, 6, 1, 1, 0]], 254);
    assert_eq!(dest.data()[[0, 7, 2, 2, 0]], 255);
    assert_eq!(dest.data()[[0, 7, 0, 1, 0]], 0);
    assert_eq!(dest.data()[[0, 4, 0, 0, 0]], 0);
}

#[test]
fn overrides_and_exported_plan_are_honoured() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = common::write_npy(&dir.path().join("a.npy"), &[1, 2, 2], vec![0, 3, 7, 7]);
    let dest = common::zeros_volume(&[5, 2, 2], "zyx");
    let graph = StageGraph::new();
    let registry = ReaderRegistry::new();

    let session = ImportSession::open(
        &graph,
        &registry,
        &[source.clone()],
        &dest,
        ImportOptions {
            label_capacity: 10,
            offset_overrides: vec!["z=2".parse().expect("offset")],
            mapping_overrides: vec!["3=off".parse().expect("map"), "7=4".parse().expect("map")],
            ..Default::default()
        },
    )
    .expect("open session");
    assert_eq!(session.plan().offset.get(Axis::Z), 2);
    assert_eq!(session.plan().mapping.get(3), 0);
    assert_eq!(session.plan().mapping.get(7), 4);

    let plan_path = dir.path().join("plan.json");
    plan::write_plan_json(&plan_path, session.plan()).expect("write plan");
    drop(session);

    let mut dest = dest;
    let session = ImportSession::open(
        &graph,
        &registry,
        &[source],
        &dest,
        ImportOptions {
            label_capacity: 10,
            plan: Some(plan::read_plan_json(&plan_path).expect("read plan")),
            ..Default::default()
        },
    )
    .expect("reopen with plan");
    session.commit(&mut dest).expect("commit");

    let written: Vec<u64> = dest.data().index_axis(NdAxis(0), 2).iter().copied().collect();
    assert_eq!(written, vec![0, 0, 4, 4]);
    assert_eq!(dest.shape(), &[5, 2, 2]);
}

#[test]
fn strict_capacity_refuses_overflow() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = common::write_npy(&dir.path().join("a.npy"), &[1, 2, 2], vec![0, 1, 2, 3]);
    let dest = common::zeros_volume(&[1, 2, 2], "zyx");
    let graph = StageGraph::new();

    let result = ImportSession::open(
        &graph,
        &ReaderRegistry::new(),
        &[source],
        &dest,
        ImportOptions {
            label_capacity: 2,
            capacity_policy: CapacityPolicy::Strict,
            ..Default::default()
        },
    );

    assert!(matches!(
        result,
        Err(LabelportError::LabelCapacityExceeded {
            distinct: 3,
            capacity: 2
        })
    ));
    assert!(graph.live().is_empty());
}

#[test]
fn strict_validation_blocks_collapsed_labels() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = common::write_npy(&dir.path().join("a.npy"), &[1, 2, 2], vec![0, 1, 2, 3]);
    let mut dest = common::zeros_volume(&[1, 2, 2], "zyx");
    let before = dest.clone();

    let err = labelport::session::import(
        &[source],
        &mut dest,
        ImportOptions {
            label_capacity: 2,
            strict: true,
            ..Default::default()
        },
    )
    .unwrap_err();

    match err {
        LabelportError::PlanRejected { report, .. } => {
            assert!(report.has(IssueCode::LabelsCollapsedToBackground));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(dest, before);
}

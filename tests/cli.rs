mod common;

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn runs() {
    let mut cmd = Command::cargo_bin("labelport").unwrap();
    cmd.assert().success();
}

#[test]
fn outputs_tool_name() {
    let mut cmd = Command::cargo_bin("labelport").unwrap();
    cmd.arg("-V");
    cmd.assert().success().stdout("labelport 0.1.0\n");
}

// Inspect subcommand tests

#[test]
fn inspect_prints_histogram_and_plan() {
    let dir = tempfile::tempdir().unwrap();
    common::write_npy(&dir.path().join("slice_002.npy"), &[1, 2, 2], vec![0, 4, 4, 9]);
    common::write_zeros_npy(&dir.path().join("dest.npy"), &[6, 2, 2]);

    let mut cmd = Command::cargo_bin("labelport").unwrap();
    cmd.current_dir(dir.path()).args([
        "inspect",
        "slice_002.npy",
        "--dest",
        "dest.npy",
        "--max-labels",
        "10",
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Labels (3 distinct, 2 nonzero)"))
        .stdout(predicate::str::contains("z=2 y=0 x=0"))
        .stdout(predicate::str::contains("Plan check passed"));
}

#[test]
fn inspect_json_output_format() {
    let dir = tempfile::tempdir().unwrap();
    common::write_npy(&dir.path().join("a.npy"), &[2, 2], vec![0, 1, 1, 0]);
    common::write_zeros_npy(&dir.path().join("dest.npy"), &[2, 2]);

    let mut cmd = Command::cargo_bin("labelport").unwrap();
    cmd.current_dir(dir.path()).args([
        "inspect",
        "a.npy",
        "--dest",
        "dest.npy",
        "--max-labels",
        "5",
        "--output",
        "json",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let json: serde_json::Value = serde_json::from_slice(&output).expect("valid json");

    assert_eq!(json["destination_axes"], "yx");
    assert_eq!(json["histogram"][1]["label"], 1);
    assert_eq!(json["histogram"][1]["count"], 2);
    assert_eq!(json["plan"]["mapping"]["1"], 5);
    assert_eq!(json["validation"]["issues"].as_array().unwrap().len(), 0);
}

#[test]
fn inspect_rejects_unknown_output_format() {
    let dir = tempfile::tempdir().unwrap();
    common::write_npy(&dir.path().join("a.npy"), &[2, 2], vec![0, 1, 1, 0]);
    common::write_zeros_npy(&dir.path().join("dest.npy"), &[2, 2]);

    let mut cmd = Command::cargo_bin("labelport").unwrap();
    cmd.current_dir(dir.path()).args([
        "inspect",
        "a.npy",
        "--dest",
        "dest.npy",
        "--max-labels",
        "5",
        "--output",
        "yaml",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported format"));
}

// Import subcommand tests

#[test]
fn import_writes_output_volume() {
    let dir = tempfile::tempdir().unwrap();
    common::write_npy(&dir.path().join("slice_001.npy"), &[1, 2, 2], vec![0, 7, 7, 3]);
    let dest = common::write_zeros_npy(&dir.path().join("dest.npy"), &[3, 2, 2]);

    let mut cmd = Command::cargo_bin("labelport").unwrap();
    cmd.current_dir(dir.path()).args([
        "import",
        "slice_001.npy",
        "--dest",
        "dest.npy",
        "--max-labels",
        "2",
        "--out",
        "result.npy",
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Imported 4 element(s)"))
        .stdout(predicate::str::contains("(relabeled)"));

    let result = common::read_npy(&dir.path().join("result.npy"));
    let written: Vec<u64> = result.iter().copied().collect();
    assert_eq!(written, vec![0, 0, 0, 0, 0, 2, 2, 1, 0, 0, 0, 0]);

    // Destination untouched when --out is given.
    assert!(common::read_npy(&dest).iter().all(|v| *v == 0));
}

#[test]
fn import_with_overrides_in_place() {
    let dir = tempfile::tempdir().unwrap();
    common::write_npy(&dir.path().join("a.npy"), &[1, 2, 2], vec![0, 7, 7, 3]);
    let dest = common::write_zeros_npy(&dir.path().join("dest.npy"), &[3, 2, 2]);

    let mut cmd = Command::cargo_bin("labelport").unwrap();
    cmd.current_dir(dir.path()).args([
        "import",
        "a.npy",
        "--dest",
        "dest.npy",
        "--max-labels",
        "10",
        "--offset",
        "z=2",
        "--map",
        "3=off",
        "--map",
        "7=0",
    ]);
    cmd.assert().success();

    let result = common::read_npy(&dest);
    let last: Vec<u64> = result.iter().skip(8).copied().collect();
    assert_eq!(last, vec![0, 7, 7, 0]);
}

#[test]
fn import_shape_mismatch_fails() {
    let dir = tempfile::tempdir().unwrap();
    common::write_npy(&dir.path().join("a.npy"), &[1, 3, 2], vec![0, 1, 1, 0, 1, 1]);
    let dest = common::write_zeros_npy(&dir.path().join("dest.npy"), &[3, 2, 2]);

    let mut cmd = Command::cargo_bin("labelport").unwrap();
    cmd.current_dir(dir.path()).args([
        "import",
        "a.npy",
        "--dest",
        "dest.npy",
        "--max-labels",
        "2",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("axis 'y'"));

    assert!(common::read_npy(&dest).iter().all(|v| *v == 0));
}

#[test]
fn import_strict_capacity_fails() {
    let dir = tempfile::tempdir().unwrap();
    common::write_npy(&dir.path().join("a.npy"), &[2, 2], vec![1, 2, 3, 4]);
    common::write_zeros_npy(&dir.path().join("dest.npy"), &[2, 2]);

    let mut cmd = Command::cargo_bin("labelport").unwrap();
    cmd.current_dir(dir.path()).args([
        "import",
        "a.npy",
        "--dest",
        "dest.npy",
        "--max-labels",
        "2",
        "--strict-capacity",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("do not fit into 2"));
}

#[test]
fn import_strict_prints_report() {
    let dir = tempfile::tempdir().unwrap();
    common::write_npy(&dir.path().join("a.npy"), &[2, 2], vec![1, 2, 3, 4]);
    common::write_zeros_npy(&dir.path().join("dest.npy"), &[2, 2]);

    let mut cmd = Command::cargo_bin("labelport").unwrap();
    cmd.current_dir(dir.path()).args([
        "import",
        "a.npy",
        "--dest",
        "dest.npy",
        "--max-labels",
        "2",
        "--strict",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("LabelsCollapsedToBackground"))
        .stderr(predicate::str::contains("Import plan rejected"));
}

#[test]
fn saved_plan_feeds_import() {
    let dir = tempfile::tempdir().unwrap();
    common::write_npy(&dir.path().join("a.npy"), &[1, 2, 2], vec![0, 5, 5, 0]);
    let dest = common::write_zeros_npy(&dir.path().join("dest.npy"), &[2, 2, 2]);

    let mut inspect = Command::cargo_bin("labelport").unwrap();
    inspect.current_dir(dir.path()).args([
        "inspect",
        "a.npy",
        "--dest",
        "dest.npy",
        "--max-labels",
        "9",
        "--offset",
        "z=1",
        "--save-plan",
        "plan.json",
    ]);
    inspect.assert().success();
    assert!(dir.path().join("plan.json").is_file());

    let mut import = Command::cargo_bin("labelport").unwrap();
    import.current_dir(dir.path()).args([
        "import",
        "a.npy",
        "--dest",
        "dest.npy",
        "--max-labels",
        "9",
        "--plan",
        "plan.json",
    ]);
    import.assert().success();

    let result: Vec<u64> = common::read_npy(&dest).iter().copied().collect();
    assert_eq!(result, vec![0, 0, 0, 0, 0, 9, 9, 0]);
}

#[test]
fn malformed_plan_offset_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    common::write_npy(&dir.path().join("a.npy"), &[1, 2, 2], vec![0, 1, 1, 0]);
    common::write_zeros_npy(&dir.path().join("dest.npy"), &[2, 2, 2]);
    std::fs::write(
        dir.path().join("plan.json"),
        r#"{"source_axes":"zyx","target_axes":"zyx",
            "offset":{"axes":"zyx","values":[0]},
            "label_capacity":2,"mapping":{"0":0,"1":1}}"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("labelport").unwrap();
    cmd.current_dir(dir.path()).args([
        "import",
        "a.npy",
        "--dest",
        "dest.npy",
        "--max-labels",
        "2",
        "--plan",
        "plan.json",
        "--offset",
        "x=0",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse import plan"))
        .stderr(predicate::str::contains("panicked").not());
}

#[test]
fn partial_plan_mapping_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    common::write_npy(&dir.path().join("a.npy"), &[1, 2, 2], vec![0, 1, 9_000_000_000, 1]);
    let dest = common::write_zeros_npy(&dir.path().join("dest.npy"), &[1, 2, 2]);
    std::fs::write(
        dir.path().join("plan.json"),
        r#"{"source_axes":"zyx","target_axes":"zyx",
            "offset":{"axes":"zyx","values":[0,0,0]},
            "label_capacity":2,"mapping":{"0":0,"1":1}}"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("labelport").unwrap();
    cmd.current_dir(dir.path()).args([
        "import",
        "a.npy",
        "--dest",
        "dest.npy",
        "--max-labels",
        "2",
        "--plan",
        "plan.json",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("MissingMappingKey"));

    assert!(common::read_npy(&dest).iter().all(|v| *v == 0));
}

#[test]
fn missing_source_fails() {
    let dir = tempfile::tempdir().unwrap();
    common::write_zeros_npy(&dir.path().join("dest.npy"), &[2, 2]);

    let mut cmd = Command::cargo_bin("labelport").unwrap();
    cmd.current_dir(dir.path()).args([
        "import",
        "missing.npy",
        "--dest",
        "dest.npy",
        "--max-labels",
        "2",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("file not found"));
}

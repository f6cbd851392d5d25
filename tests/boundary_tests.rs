mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_extreme_decimal_precision() {
    let dir = tempfile::tempdir().unwrap();
    let ops = dir.path().join("precision.csv");
    common::generate_ops_csv(
        &ops,
        &[("alice", "USD", "0.0003"), ("bob", "USD", "0")],
        &[(1, 2, "0.0001"), (1, 2, "0.0001")],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("corebank"));
    cmd.arg(&ops);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1,alice,0.0001,USD"))
        .stdout(predicate::str::contains("2,bob,0.0002,USD"));
}

#[test]
fn test_transfer_can_drain_an_account_to_zero() {
    let dir = tempfile::tempdir().unwrap();
    let ops = dir.path().join("drain.csv");
    common::generate_ops_csv(
        &ops,
        &[("alice", "CAD", "25.0"), ("bob", "CAD", "0")],
        &[(1, 2, "25.0")],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("corebank"));
    cmd.arg(&ops);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1,alice,0,CAD"))
        .stdout(predicate::str::contains("2,bob,25,CAD"));
}

#[test]
fn test_one_cent_over_balance_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let ops = dir.path().join("over.csv");
    common::generate_ops_csv(
        &ops,
        &[("alice", "USD", "25.0"), ("bob", "USD", "0")],
        &[(1, 2, "25.01")],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("corebank"));
    cmd.arg(&ops);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error applying operation"))
        .stdout(predicate::str::contains("1,alice,25,USD"))
        .stdout(predicate::str::contains("2,bob,0,USD"));
}

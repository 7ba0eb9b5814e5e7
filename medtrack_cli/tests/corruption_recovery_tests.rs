//! Corruption recovery tests for medtrack.
//!
//! These tests verify the system can handle:
//! - Corrupted session files
//! - Corrupted store lines
//! - Partial writes

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use std::path::Path;
use tempfile::TempDir;

fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("medtrack"));
    cmd.env("XDG_CONFIG_HOME", data_dir.join("config"))
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn login(data_dir: &Path) {
    cli(data_dir)
        .args(["register", "--username", "alice", "--email", "alice@example.com"])
        .assert()
        .success();
    cli(data_dir)
        .args(["login", "alice@example.com"])
        .assert()
        .success();
}

fn add_medicine(data_dir: &Path, name: &str) {
    cli(data_dir)
        .args(["add", "--name", name, "--start", "2023-05-20", "--duration", "2"])
        .assert()
        .success();
}

#[test]
fn test_corrupted_session_file() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    fs::write(data_dir.join("session.json"), "{ invalid json }}}}")
        .expect("Failed to write corrupted session");

    // Falls back to a logged-out session
    cli(data_dir)
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in."));

    // And can be recovered by registering again
    login(data_dir);
    cli(data_dir)
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"));
}

#[test]
fn test_corrupted_store_lines_skipped() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    login(data_dir);
    add_medicine(data_dir, "Aspirin");

    let store = data_dir.join("medicines.jsonl");
    let mut file = fs::OpenOptions::new().append(true).open(&store).unwrap();
    writeln!(file, "{{ invalid json }}").unwrap();
    writeln!(file, "{{\"op\":\"unknown\"}}").unwrap();
    drop(file);

    add_medicine(data_dir, "Ibuprofen");

    cli(data_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Aspirin"))
        .stdout(predicate::str::contains("Ibuprofen"));
}

#[test]
fn test_partial_write_in_store() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    login(data_dir);
    add_medicine(data_dir, "Aspirin");

    // Simulate a write cut off mid-record
    let store = data_dir.join("medicines.jsonl");
    let mut file = fs::OpenOptions::new().append(true).open(&store).unwrap();
    write!(file, "{{\"op\":\"put\",\"medicine\":{{\"id\":\"").unwrap();
    drop(file);

    cli(data_dir)
        .args(["agenda", "--date", "2023-05-20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Aspirin"));
}

#[test]
fn test_compact_drops_corrupted_lines() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    login(data_dir);
    add_medicine(data_dir, "Aspirin");

    let store = data_dir.join("medicines.jsonl");
    let mut file = fs::OpenOptions::new().append(true).open(&store).unwrap();
    writeln!(file, "not json at all").unwrap();
    drop(file);

    cli(data_dir)
        .arg("compact")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 medicines kept"));

    let content = fs::read_to_string(&store).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains("Aspirin"));
}

#[test]
fn test_missing_store_file() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    login(data_dir);

    cli(data_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No medicines found."));

    cli(data_dir)
        .args(["calendar", "--month", "2023-05"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 doses on 0 days"));
}

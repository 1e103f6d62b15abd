//! CLI contract tests
//!
//! Runs the binary against a throwaway repository with its own store file.

mod common;

use common::{lines, TestRepo, ALICE, BOB, DAY, EPOCH};
use std::path::Path;
use std::process::Command;

fn repominer(repo: &Path, db: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_repominer"))
        .arg(repo)
        .arg("--db")
        .arg(db)
        .args(["--log-level", "warn"])
        .args(args)
        .output()
        .expect("Failed to execute repominer binary");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

fn sample_repo() -> TestRepo {
    let repo = TestRepo::new();
    repo.commit(&[("src/a.rs", Some(&lines("a", 1..=6)))], ALICE, EPOCH, "add a");
    repo.commit(&[("src/b.rs", Some(&lines("b", 1..=3)))], BOB, EPOCH + DAY, "add b");
    repo
}

#[test]
fn test_ingest_then_developers_json() {
    let repo = sample_repo();
    let store = tempfile::tempdir().unwrap();
    let db = store.path().join("mining.redb");

    let (stdout, stderr, code) = repominer(repo.path(), &db, &["ingest"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stdout.contains("2 ingested"), "stdout: {}", stdout);

    let (stdout, stderr, code) = repominer(repo.path(), &db, &["developers", "--format", "json"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    let developers: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let developers = developers.as_array().unwrap();
    assert_eq!(developers.len(), 2);
    // sorted by owned lines
    assert_eq!(developers[0]["email"], "alice@example.com");
    assert_eq!(developers[0]["actual_lines_owned"], 6);
}

#[test]
fn test_second_ingest_skips_everything() {
    let repo = sample_repo();
    let store = tempfile::tempdir().unwrap();
    let db = store.path().join("mining.redb");

    repominer(repo.path(), &db, &["ingest"]);
    let (stdout, _, code) = repominer(repo.path(), &db, &["ingest"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("0 ingested, 2 already stored"), "stdout: {}", stdout);
}

#[test]
fn test_invalid_range_fails() {
    let repo = sample_repo();
    let store = tempfile::tempdir().unwrap();
    let db = store.path().join("mining.redb");

    let (_, stderr, code) = repominer(repo.path(), &db, &["ingest", "--range", "fortnight:2"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid commit range"), "stderr: {}", stderr);
}

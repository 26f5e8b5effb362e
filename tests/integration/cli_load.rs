#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

fn write_keys(dir: &Path, name: &str, keys: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, keys).expect("write keys");
    path
}

fn stdout_of(args: &[&str]) -> String {
    let output = cargo_bin_cmd!("pageindex")
        .arg("load")
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(output).expect("utf8 stdout")
}

#[test]
fn load_prints_levels_and_scan() {
    let dir = TempDir::new().expect("tempdir");
    let keys = write_keys(dir.path(), "insert.txt", "5 3 1\n4 2\n");
    let keys_arg = keys.to_str().expect("utf8 path");
    let out = stdout_of(
        &["--insert", keys_arg, "--leaf-max", "4", "--internal-max", "4", "--scan"],
    );
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "<3>");
    assert_eq!(lines[1], "[1 2] [3 4 5]");
    assert_eq!(lines[2], "1 0:1");
    assert_eq!(lines[6], "5 0:5");
    assert!(lines[7].starts_with("inserted 5, removed 0, entries 5, height 2"));
}

#[test]
fn load_applies_removals() {
    let dir = TempDir::new().expect("tempdir");
    let insert = write_keys(
        dir.path(),
        "insert.txt",
        &(1..=20).map(|k| k.to_string()).collect::<Vec<_>>().join(" "),
    );
    let remove = write_keys(
        dir.path(),
        "remove.txt",
        &(1..=19).map(|k| k.to_string()).collect::<Vec<_>>().join("\n"),
    );
    let out = stdout_of(
        &[
            "--insert",
            insert.to_str().expect("utf8 path"),
            "--remove",
            remove.to_str().expect("utf8 path"),
            "--leaf-max",
            "4",
            "--internal-max",
            "4",
        ],
    );
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "[20]");
    assert!(lines[1].starts_with("inserted 20, removed 19, entries 1, height 1"));
}

#[test]
fn load_persists_into_db_file() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("keys.idx");
    let first = write_keys(dir.path(), "first.txt", "10 20 30");
    let second = write_keys(dir.path(), "second.txt", "20 40");
    let db_arg = db.to_str().expect("utf8 path");

    stdout_of(
        &["--insert", first.to_str().expect("utf8 path"), "--db", db_arg],
    );
    assert!(fs::metadata(&db).expect("db file").len() > 0);

    let out = stdout_of(
        &[
            "--insert",
            second.to_str().expect("utf8 path"),
            "--db",
            db_arg,
            "--scan",
        ],
    );
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "[10 20 30 40]");
    assert!(lines.iter().any(|line| line.starts_with("inserted 1, removed 0, entries 4")));
}

#[test]
fn load_rejects_bad_tokens() {
    let dir = TempDir::new().expect("tempdir");
    let keys = write_keys(dir.path(), "bad.txt", "1 two 3");
    let stderr = cargo_bin_cmd!("pageindex")
        .arg("load")
        .arg("--insert")
        .arg(&keys)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(stderr).expect("utf8 stderr");
    assert!(stderr.contains("parse error"), "unexpected stderr: {stderr}");
}

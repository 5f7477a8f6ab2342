#[cfg(test)]
extern crate assert_cmd;
extern crate predicates;

use assert_cmd::prelude::*;
use predicates::prelude::*;

use std::fs;
use std::process::Command;

fn sidclean() -> Command {
    let mut cmd = Command::cargo_bin("sidclean").expect("Calling binary failed");
    // Keep reports out of the working tree.
    cmd.env("SIDCLEAN_REPORT__ENABLED", "false");
    cmd
}

#[test]
fn test_cli() {
    sidclean().assert().failure();
}

#[test]
fn test_version() {
    let expected_version = "sidclean 1.0.0\n";
    sidclean().arg("--version").assert().stdout(expected_version);
}

#[test]
fn test_missing_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    sidclean()
        .arg("count")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_count_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("one.txt"), "1").unwrap();
    fs::write(dir.path().join("nested/two.txt"), "2").unwrap();

    sidclean()
        .arg("count")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Number of files: 2"));
}

#[test]
fn test_purge_deletes_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Thumbs.db"), "x").unwrap();
    fs::write(dir.path().join("~$memo.docx"), "x").unwrap();
    fs::write(dir.path().join("memo.docx"), "x").unwrap();

    sidclean()
        .arg("purge")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Purge Statistics"));

    assert!(!dir.path().join("Thumbs.db").exists());
    assert!(!dir.path().join("~$memo.docx").exists());
    assert!(dir.path().join("memo.docx").exists());
}

#[test]
fn test_purge_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let reports = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("~wrl0001.tmp"), "x").unwrap();

    sidclean()
        .env("SIDCLEAN_REPORT__ENABLED", "true")
        .env("SIDCLEAN_REPORT__DIRECTORY", reports.path())
        .arg("purge")
        .arg(dir.path())
        .assert()
        .success();

    let report = fs::read_dir(reports.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with("tempfiles_cleanup_"))
                .unwrap_or(false)
        })
        .expect("purge report");
    let contents = fs::read_to_string(report).unwrap();
    assert!(contents.starts_with("Action,Path,Details"));
    assert!(contents.contains("DELETE,"));
    assert!(contents.contains("SUMMARY,"));
    assert!(contents.contains("Scanned: 1, Deleted: 1"));
}

#[test]
fn test_conflicting_flags() {
    sidclean()
        .args(["clean", "--acl-only", "--owner-only", "."])
        .assert()
        .failure();
}

#[cfg(not(windows))]
#[test]
fn test_clean_requires_windows() {
    let dir = tempfile::tempdir().unwrap();
    sidclean()
        .arg("clean")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("only supported on Windows"));
}

use std::fs;
use std::path::Path;

use predicates::prelude::*;
use smig::files::lock;

use crate::helpers::Project;

fn write_lock(path: &Path, pid: u32) {
    fs::write(
        lock::lock_path_for(path),
        format!(r#"{{"pid":{pid},"started":"2026-01-01T00:00:00Z"}}"#),
    )
    .unwrap();
}

#[test]
fn cli_refuses_to_migrate_under_a_live_lock() {
    let project = Project::new();
    project.run_ok(&["init"]);
    write_lock(&project.history_path(), std::process::id());

    project
        .smig()
        .arg("up")
        .assert()
        .failure()
        .stderr(predicate::str::contains("is locked by process"));
    assert_eq!(project.run_ok(&["version"]).trim(), "none");
}

#[test]
fn cli_reclaims_a_stale_lock() {
    let project = Project::new();
    project.run_ok(&["init"]);
    write_lock(&project.history_path(), 999_999_999);

    project.run_ok(&["up"]);
    assert!(!lock::lock_path_for(&project.history_path()).exists());
}

#[test]
fn cli_skips_locking_when_disabled() {
    let project = Project::new();
    project.write_config("[lock]\nenabled = false\n");
    project.run_ok(&["init"]);
    write_lock(&project.history_path(), std::process::id());

    project.run_ok(&["up"]);
    assert_eq!(project.run_ok(&["version"]).trim(), "002_add_index");
}

#[test]
fn cli_refuses_to_take_over_an_unreadable_lock() {
    let project = Project::new();
    project.run_ok(&["init"]);
    let lock_path = lock::lock_path_for(&project.history_path());
    fs::write(&lock_path, "{\"pid\":").unwrap();

    project
        .smig()
        .arg("up")
        .assert()
        .failure()
        .stderr(predicate::str::contains("is unreadable"));
    assert!(lock_path.exists());
    assert_eq!(project.run_ok(&["version"]).trim(), "none");
}
